use crate::core::metadata::RasterMetadata;
use crate::types::{
    ExtentBox, GeoTransform, PrepError, PrepResult, RasterData, RasterKind, RasterValue,
};
use gdal::{Dataset, Metadata};
use ndarray::{s, Array2};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Absolute tolerance under which an interferogram phase counts as zero
const ZERO_PHASE_TOL: f32 = 1e-6;

/// Grid, no-data and metadata of an opened single-band raster
#[derive(Debug, Clone)]
pub struct RasterHeader {
    pub path: PathBuf,
    pub kind: RasterKind,
    pub geotransform: GeoTransform,
    pub cols: usize,
    pub rows: usize,
    pub nodata: Option<f64>,
    /// WKT projection, empty when the file has none
    pub projection: String,
    /// Default-domain metadata items as stored in the file
    pub metadata: BTreeMap<String, String>,
}

impl RasterHeader {
    pub fn x_first(&self) -> f64 {
        self.geotransform.top_left_x
    }

    pub fn y_first(&self) -> f64 {
        self.geotransform.top_left_y
    }

    pub fn x_step(&self) -> f64 {
        self.geotransform.pixel_width
    }

    /// Negative for north-up grids
    pub fn y_step(&self) -> f64 {
        self.geotransform.pixel_height
    }

    pub fn x_last(&self) -> f64 {
        self.x_first() + self.cols as f64 * self.x_step()
    }

    pub fn y_last(&self) -> f64 {
        self.y_first() + self.rows as f64 * self.y_step()
    }

    /// Stage-tagged metadata snapshot of this raster
    pub fn stage_metadata(&self) -> PrepResult<RasterMetadata> {
        RasterMetadata::from_items(
            self.kind,
            self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())),
        )
    }

    /// Whether a sample read from the primary band is missing data
    pub fn is_missing(&self, value: RasterValue) -> bool {
        if value.is_nan() {
            return true;
        }
        if let Some(nodata) = self.nodata {
            if value as f64 == nodata {
                return true;
            }
        }
        self.kind.primary_band().zero_is_nodata && value.abs() <= ZERO_PHASE_TOL
    }
}

/// Pixel window of a source grid covering an extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: i64,
    pub row_off: i64,
    pub cols: usize,
    pub rows: usize,
}

impl PixelWindow {
    /// Map `extent` onto the grid of `geotransform`
    pub fn for_extent(geotransform: &GeoTransform, extent: &ExtentBox) -> PrepResult<Self> {
        let (col0, row0) = geotransform.world_to_pixel(extent.xmin, extent.ymax);
        let (col1, row1) = geotransform.world_to_pixel(extent.xmax, extent.ymin);

        if col1 <= col0 || row1 <= row0 {
            return Err(PrepError::Processing(format!(
                "extent {:?} covers no whole pixel of the source grid",
                extent
            )));
        }

        Ok(Self {
            col_off: col0,
            row_off: row0,
            cols: (col1 - col0) as usize,
            rows: (row1 - row0) as usize,
        })
    }
}

/// GDAL-backed reader for georeferenced single-band rasters
pub struct RasterReader;

impl RasterReader {
    /// Open a raster read-only; the dataset closes when the handle drops
    pub fn open<P: AsRef<Path>>(path: P) -> PrepResult<Dataset> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PrepError::InputNotFound(path.to_path_buf()));
        }
        Ok(Dataset::open(path)?)
    }

    /// Read grid, no-data value and metadata without touching pixel data
    pub fn read_header<P: AsRef<Path>>(path: P, kind: RasterKind) -> PrepResult<RasterHeader> {
        let path = path.as_ref();
        let dataset = Self::open(path)?;

        let geotransform = GeoTransform::from_gdal(dataset.geo_transform()?);
        let (cols, rows) = dataset.raster_size();
        let band = dataset.rasterband(kind.primary_band().index)?;
        let nodata = band.no_data_value();

        let metadata = dataset
            .metadata_domain("")
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                item.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
            })
            .collect();

        log::debug!(
            "Opened {} {} ({}x{}, step {} x {})",
            kind,
            path.display(),
            cols,
            rows,
            geotransform.pixel_width,
            geotransform.pixel_height
        );

        Ok(RasterHeader {
            path: path.to_path_buf(),
            kind,
            geotransform,
            cols,
            rows,
            nodata,
            projection: dataset.projection(),
            metadata,
        })
    }

    /// Read the whole primary band exactly as stored, without missing-data masking
    pub fn read_band(header: &RasterHeader) -> PrepResult<RasterData> {
        let dataset = Self::open(&header.path)?;
        let band = dataset.rasterband(header.kind.primary_band().index)?;
        let buffer = band.read_as::<f32>(
            (0, 0),
            (header.cols, header.rows),
            (header.cols, header.rows),
            None,
        )?;

        Array2::from_shape_vec((header.rows, header.cols), buffer.data)
            .map_err(|e| PrepError::Processing(format!("Failed to reshape raster data: {}", e)))
    }

    /// Read the primary band under `extent` with missing data as NaN.
    ///
    /// Window cells outside the source's coverage are NaN as well.
    pub fn read_window(header: &RasterHeader, extent: &ExtentBox) -> PrepResult<RasterData> {
        let window = PixelWindow::for_extent(&header.geotransform, extent)?;
        let mut data = Array2::<RasterValue>::from_elem((window.rows, window.cols), f32::NAN);

        // overlap of the window with the source in source pixel coordinates
        let src_col0 = window.col_off.max(0);
        let src_row0 = window.row_off.max(0);
        let src_col1 = (window.col_off + window.cols as i64).min(header.cols as i64);
        let src_row1 = (window.row_off + window.rows as i64).min(header.rows as i64);

        if src_col1 <= src_col0 || src_row1 <= src_row0 {
            log::warn!("{} has no coverage inside {:?}", header.path.display(), extent);
            return Ok(data);
        }

        let read_cols = (src_col1 - src_col0) as usize;
        let read_rows = (src_row1 - src_row0) as usize;

        let dataset = Self::open(&header.path)?;
        let band = dataset.rasterband(header.kind.primary_band().index)?;
        let buffer = band.read_as::<f32>(
            (src_col0 as isize, src_row0 as isize),
            (read_cols, read_rows),
            (read_cols, read_rows),
            None,
        )?;

        let block = Array2::from_shape_vec((read_rows, read_cols), buffer.data)
            .map_err(|e| PrepError::Processing(format!("Failed to reshape raster data: {}", e)))?;

        let dst_row0 = (src_row0 - window.row_off) as usize;
        let dst_col0 = (src_col0 - window.col_off) as usize;
        data.slice_mut(s![dst_row0..dst_row0 + read_rows, dst_col0..dst_col0 + read_cols])
            .assign(&block);

        data.mapv_inplace(|v| if header.is_missing(v) { f32::NAN } else { v });

        Ok(data)
    }
}
