//! I/O modules for reading source rasters and writing prepared outputs

pub mod raster;
pub mod geotiff;
pub mod coherence;
pub mod paths;

pub use raster::{RasterReader, RasterHeader, PixelWindow};
pub use geotiff::GeoTiffWriter;
pub use coherence::coherence_path_for;
pub use paths::prepared_path;
