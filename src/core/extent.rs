use crate::config::CustomBounds;
use crate::io::RasterHeader;
use crate::types::{CropPolicy, ExtentBox, PrepError, PrepResult};

/// Computes the common extent of a raster batch
pub struct ExtentResolver;

impl ExtentResolver {
    /// Resolve the target extent for `rasters` under `policy`
    pub fn resolve(
        rasters: &[RasterHeader],
        policy: CropPolicy,
        custom: &CustomBounds,
    ) -> PrepResult<ExtentBox> {
        if rasters.is_empty() {
            return Err(PrepError::Configuration(
                "cannot resolve an extent for an empty raster batch".to_string(),
            ));
        }

        Self::check_resolution(rasters)?;

        let extent = match policy {
            CropPolicy::Intersection => Self::min_bounds(rasters),
            CropPolicy::Union => Self::max_bounds(rasters),
            CropPolicy::Custom => {
                let (x_first, y_first, x_last, y_last) = custom.require()?;
                ExtentBox::new(x_first, y_last, x_last, y_first)
            }
            CropPolicy::Unchanged => Self::same_bounds(rasters),
        }?;

        log::info!(
            "Resolved {:?} extent: x [{}, {}], y [{}, {}]",
            policy,
            extent.xmin,
            extent.xmax,
            extent.ymin,
            extent.ymax
        );

        Ok(extent)
    }

    /// Every raster must share the pixel size of the first one
    pub fn check_resolution(rasters: &[RasterHeader]) -> PrepResult<()> {
        let Some(first) = rasters.first() else {
            return Ok(());
        };
        for raster in &rasters[1..] {
            if raster.x_step() != first.x_step() {
                return Err(PrepError::Configuration(format!(
                    "grid resolution does not match for x_step: {} has {}, expected {}",
                    raster.path.display(),
                    raster.x_step(),
                    first.x_step()
                )));
            }
            if raster.y_step() != first.y_step() {
                return Err(PrepError::Configuration(format!(
                    "grid resolution does not match for y_step: {} has {}, expected {}",
                    raster.path.display(),
                    raster.y_step(),
                    first.y_step()
                )));
            }
        }
        Ok(())
    }

    /// Overlapping area of all rasters
    fn min_bounds(rasters: &[RasterHeader]) -> PrepResult<ExtentBox> {
        let xmin = fold(rasters, RasterHeader::x_first, f64::max);
        let ymax = fold(rasters, RasterHeader::y_first, f64::min);
        let xmax = fold(rasters, RasterHeader::x_last, f64::min);
        let ymin = fold(rasters, RasterHeader::y_last, f64::max);
        ExtentBox::new(xmin, ymin, xmax, ymax)
    }

    /// Total area covered by any raster
    fn max_bounds(rasters: &[RasterHeader]) -> PrepResult<ExtentBox> {
        let xmin = fold(rasters, RasterHeader::x_first, f64::min);
        let ymax = fold(rasters, RasterHeader::y_first, f64::max);
        let xmax = fold(rasters, RasterHeader::x_last, f64::max);
        let ymin = fold(rasters, RasterHeader::y_last, f64::min);
        ExtentBox::new(xmin, ymin, xmax, ymax)
    }

    /// Shared extent of rasters that already sit on one grid
    fn same_bounds(rasters: &[RasterHeader]) -> PrepResult<ExtentBox> {
        let first = &rasters[0];
        for raster in &rasters[1..] {
            if raster.geotransform != first.geotransform
                || raster.cols != first.cols
                || raster.rows != first.rows
            {
                return Err(PrepError::Configuration(format!(
                    "{} does not share the bounding box of {} required by crop option {}",
                    raster.path.display(),
                    first.path.display(),
                    CropPolicy::Unchanged.option()
                )));
            }
        }

        let (xmin, xmax) = (first.x_first(), first.x_last());
        let (mut ymin, mut ymax) = (first.y_last(), first.y_first());
        // south-up grids store y_first below y_last
        if ymin > ymax {
            std::mem::swap(&mut ymin, &mut ymax);
        }
        ExtentBox::new(xmin, ymin, xmax, ymax)
    }
}

fn fold(
    rasters: &[RasterHeader],
    value: fn(&RasterHeader) -> f64,
    pick: fn(f64, f64) -> f64,
) -> f64 {
    rasters
        .iter()
        .map(value)
        .reduce(pick)
        .unwrap_or(f64::NAN)
}
