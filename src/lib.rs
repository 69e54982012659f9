//! stackprep: raster preparation for InSAR time-series stacks
//!
//! Brings a batch of georeferenced interferograms, DEMs and incidence-angle maps
//! onto one common extent and resolution: crops to the resolved extent, masks
//! low-coherence interferogram pixels, block-averages with a NaN-aware mean and
//! writes compressed GeoTIFFs whose metadata records the processing stage.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    BatchFailure, CropPolicy, ExtentBox, GeoTransform, LookFactors, PrepError, PrepResult,
    ProcessingStage, RasterFailure, RasterKind,
};
pub use config::{CoherenceConfig, CustomBounds, PrepConfig};
pub use io::{GeoTiffWriter, RasterHeader, RasterReader};
pub use crate::core::{MetadataManager, PrepDriver, PreparedRaster, RasterInput, RasterMetadata};
