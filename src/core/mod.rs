//! Core raster preparation modules

pub mod extent;
pub mod grid;
pub mod coherence;
pub mod multilook;
pub mod alignment;
pub mod metadata;
pub mod pipeline;

// Re-export main types
pub use extent::ExtentResolver;
pub use grid::GridValidator;
pub use coherence::{CoherenceMasker, CoherenceSpec};
pub use multilook::{MultilookProcessor, MultilookParams, MultilookResult};
pub use alignment::LegacyAligner;
pub use metadata::{MetadataManager, RasterMetadata};
pub use pipeline::{PrepDriver, PreparedRaster, RasterInput};
