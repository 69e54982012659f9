//! Synthetic GeoTIFF fixtures shared by the integration tests

#![allow(dead_code)]

use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::path::{Path, PathBuf};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// North-up grid with 0.5 degree pixels
pub fn grid(x0: f64, y0: f64) -> [f64; 6] {
    [x0, 0.5, 0.0, y0, 0.0, -0.5]
}

/// Array whose cell (r, c) holds `r * 10 + c + 1`, never zero
pub fn ramp(rows: usize, cols: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| (r * 10 + c + 1) as f32)
}

/// Write a single-band Float32 GeoTIFF with the given metadata items
pub fn write_raster(
    dir: &Path,
    name: &str,
    data: &Array2<f32>,
    geotransform: [f64; 6],
    metadata: &[(&str, &str)],
    nodata: Option<f64>,
) -> PathBuf {
    let path = dir.join(name);
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver");
    let (rows, cols) = data.dim();

    let mut dataset = driver
        .create_with_band_type::<f32, _>(&path, cols as isize, rows as isize, 1)
        .expect("Failed to create fixture raster");
    dataset.set_geo_transform(&geotransform).expect("Failed to set geotransform");
    for (key, value) in metadata {
        dataset.set_metadata_item(key, value, "").expect("Failed to set metadata");
    }

    let mut band = dataset.rasterband(1).expect("Failed to get band");
    if nodata.is_some() {
        band.set_no_data_value(nodata).expect("Failed to set no-data");
    }
    let buffer = Buffer::new((cols, rows), data.iter().cloned().collect());
    band.write((0, 0), (cols, rows), &buffer).expect("Failed to write fixture data");

    path
}

/// Prepared output as read back from disk
pub struct Output {
    pub data: Array2<f32>,
    pub geotransform: [f64; 6],
    pub dataset: Dataset,
}

impl Output {
    pub fn item(&self, key: &str) -> Option<String> {
        self.dataset.metadata_item(key, "")
    }
}

pub fn read_raster(path: &Path) -> Output {
    let dataset = Dataset::open(path).expect("Failed to open output");
    let geotransform = dataset.geo_transform().expect("Failed to read geotransform");
    let (cols, rows) = dataset.raster_size();
    let buffer = dataset
        .rasterband(1)
        .expect("Failed to get band")
        .read_as::<f32>((0, 0), (cols, rows), (cols, rows), None)
        .expect("Failed to read output");
    let data = Array2::from_shape_vec((rows, cols), buffer.data).expect("Bad output shape");
    Output {
        data,
        geotransform,
        dataset,
    }
}
