use crate::core::metadata::RasterMetadata;
use crate::types::{GeoTransform, PrepResult, RasterData};
use gdal::raster::{Buffer, RasterCreationOption};
use gdal::{Dataset, DriverManager, Metadata};
use std::path::Path;

/// Creation options for every prepared output
const CREATION_OPTIONS: [RasterCreationOption<'static>; 1] = [RasterCreationOption {
    key: "COMPRESS",
    value: "PACKBITS",
}];

/// Writer for compressed single-band GeoTIFF outputs
pub struct GeoTiffWriter;

impl GeoTiffWriter {
    /// Write `data` as a Float32 GeoTIFF with NaN no-data and the given metadata
    pub fn write<P: AsRef<Path>>(
        output_path: P,
        data: &RasterData,
        transform: &GeoTransform,
        projection: &str,
        metadata: &RasterMetadata,
    ) -> PrepResult<()> {
        let output_path = output_path.as_ref();
        log::debug!("Writing GeoTIFF: {}", output_path.display());

        Self::ensure_parent(output_path)?;

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (height, width) = data.dim();

        let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
            output_path,
            width as isize,
            height as isize,
            1,
            &CREATION_OPTIONS,
        )?;

        dataset.set_geo_transform(&transform.to_gdal())?;
        if !projection.is_empty() {
            dataset.set_projection(projection)?;
        }
        Self::write_metadata(&mut dataset, metadata)?;

        let mut rasterband = dataset.rasterband(1)?;
        rasterband.set_no_data_value(Some(f64::NAN))?;
        let flat_data: Vec<f32> = data.iter().cloned().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;

        Ok(())
    }

    /// Copy `source` unchanged except for its metadata
    pub fn copy_with_metadata<P: AsRef<Path>, Q: AsRef<Path>>(
        source: P,
        output_path: Q,
        metadata: &RasterMetadata,
    ) -> PrepResult<()> {
        let output_path = output_path.as_ref();
        log::debug!(
            "Copying {} -> {}",
            source.as_ref().display(),
            output_path.display()
        );

        Self::ensure_parent(output_path)?;

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let source = Dataset::open(source.as_ref())?;
        let mut copy = source.create_copy(&driver, output_path, &CREATION_OPTIONS)?;
        Self::write_metadata(&mut copy, metadata)?;

        Ok(())
    }

    fn write_metadata(dataset: &mut Dataset, metadata: &RasterMetadata) -> PrepResult<()> {
        for (key, value) in metadata.items() {
            dataset.set_metadata_item(key, value, "")?;
        }
        Ok(())
    }

    fn ensure_parent(path: &Path) -> PrepResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
