use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Real-valued raster sample
pub type RasterValue = f32;

/// 2D raster data array (rows x cols)
pub type RasterData = Array2<RasterValue>;

/// Per-cell fraction of missing source samples behind an averaged cell
pub type NanFraction = Array2<f32>;

/// Metadata key holding the processing-stage tag
pub const DATA_TYPE: &str = "DATA_TYPE";

/// Kind of input raster handed over by the format-conversion stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterKind {
    Interferogram,
    Dem,
    Incidence,
    Coherence,
}

impl std::fmt::Display for RasterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterKind::Interferogram => write!(f, "interferogram"),
            RasterKind::Dem => write!(f, "dem"),
            RasterKind::Incidence => write!(f, "incidence"),
            RasterKind::Coherence => write!(f, "coherence"),
        }
    }
}

/// Band carrying the value a raster kind is prepared on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryBand {
    /// 1-based GDAL band index
    pub index: isize,
    /// Exact zeros flag incoherent cells and are read as missing data
    pub zero_is_nodata: bool,
}

impl RasterKind {
    /// The band every kind is read, masked and averaged through
    pub fn primary_band(&self) -> PrimaryBand {
        match self {
            // phase band
            RasterKind::Interferogram => PrimaryBand { index: 1, zero_is_nodata: true },
            // height band
            RasterKind::Dem => PrimaryBand { index: 1, zero_is_nodata: false },
            // look angle band
            RasterKind::Incidence => PrimaryBand { index: 1, zero_is_nodata: false },
            RasterKind::Coherence => PrimaryBand { index: 1, zero_is_nodata: false },
        }
    }

    /// Stage assumed when the conversion stage left no tag behind
    pub fn initial_stage(&self) -> Option<ProcessingStage> {
        match self {
            RasterKind::Interferogram => Some(ProcessingStage::Orig),
            RasterKind::Dem => Some(ProcessingStage::Dem),
            RasterKind::Incidence => Some(ProcessingStage::Incidence),
            RasterKind::Coherence => None,
        }
    }
}

/// Processing-stage tag carried in raster metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStage {
    #[serde(rename = "ORIGINAL_IFG")]
    Orig,
    #[serde(rename = "MULTILOOKED_IFG")]
    Multilooked,
    #[serde(rename = "COHERENCE_MASKED_MULTILOOKED_IFG")]
    Coherence,
    #[serde(rename = "ORIGINAL_DEM")]
    Dem,
    #[serde(rename = "MULTILOOKED_DEM")]
    MlookedDem,
    #[serde(rename = "INCIDENCE_ANGLE_MAP")]
    Incidence,
    #[serde(rename = "MULTILOOKED_INCIDENCE_ANGLE_MAP")]
    MlookedIncidence,
}

impl ProcessingStage {
    pub const ALL: [ProcessingStage; 7] = [
        ProcessingStage::Orig,
        ProcessingStage::Multilooked,
        ProcessingStage::Coherence,
        ProcessingStage::Dem,
        ProcessingStage::MlookedDem,
        ProcessingStage::Incidence,
        ProcessingStage::MlookedIncidence,
    ];

    /// Metadata string written under `DATA_TYPE`
    pub fn tag(&self) -> &'static str {
        match self {
            ProcessingStage::Orig => "ORIGINAL_IFG",
            ProcessingStage::Multilooked => "MULTILOOKED_IFG",
            ProcessingStage::Coherence => "COHERENCE_MASKED_MULTILOOKED_IFG",
            ProcessingStage::Dem => "ORIGINAL_DEM",
            ProcessingStage::MlookedDem => "MULTILOOKED_DEM",
            ProcessingStage::Incidence => "INCIDENCE_ANGLE_MAP",
            ProcessingStage::MlookedIncidence => "MULTILOOKED_INCIDENCE_ANGLE_MAP",
        }
    }

    /// Parse a `DATA_TYPE` tag; unknown tags are a metadata state violation
    pub fn from_tag(tag: &str) -> PrepResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.tag() == tag.trim())
            .ok_or_else(|| {
                PrepError::MetadataState(format!("unrecognised {} tag '{}'", DATA_TYPE, tag))
            })
    }
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// World coordinate to (col, row) on this grid.
    ///
    /// Rounds half to even so boundaries that sit exactly between two
    /// pixels land where numpy-based tooling puts them.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let col = ((x - self.top_left_x) / self.pixel_width).round_ties_even();
        let row = ((self.top_left_y - y) / self.pixel_height.abs()).round_ties_even();
        (col as i64, row as i64)
    }
}

/// Geographic bounding box in the rasters' coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtentBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl ExtentBox {
    /// Build a resolved extent, rejecting empty or inverted boxes
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> PrepResult<Self> {
        if !(xmin < xmax) || !(ymin < ymax) {
            return Err(PrepError::Configuration(format!(
                "resolved extent is empty or inverted: x [{}, {}], y [{}, {}]",
                xmin, xmax, ymin, ymax
            )));
        }
        Ok(Self { xmin, ymin, xmax, ymax })
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Rule selecting the common extent for a raster batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CropPolicy {
    /// Overlap of all rasters (crop option 1)
    Intersection,
    /// Area covered by any raster (crop option 2)
    Union,
    /// Externally supplied bounds (crop option 3)
    Custom,
    /// Rasters already share one grid (crop option 4)
    Unchanged,
}

impl CropPolicy {
    /// Map the numeric crop option used in configuration files
    pub fn from_option(option: u8) -> PrepResult<Self> {
        match option {
            1 => Ok(CropPolicy::Intersection),
            2 => Ok(CropPolicy::Union),
            3 => Ok(CropPolicy::Custom),
            4 => Ok(CropPolicy::Unchanged),
            other => Err(PrepError::Configuration(format!(
                "unrecognised crop option: {}",
                other
            ))),
        }
    }

    pub fn option(&self) -> u8 {
        match self {
            CropPolicy::Intersection => 1,
            CropPolicy::Union => 2,
            CropPolicy::Custom => 3,
            CropPolicy::Unchanged => 4,
        }
    }
}

/// Multilook factors; only isotropic looks are supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookFactors {
    pub x_looks: usize,
    pub y_looks: usize,
}

impl LookFactors {
    pub fn new(x_looks: usize, y_looks: usize) -> PrepResult<Self> {
        let looks = Self { x_looks, y_looks };
        looks.validate()?;
        Ok(looks)
    }

    pub fn validate(&self) -> PrepResult<()> {
        if self.x_looks == 0 || self.y_looks == 0 {
            return Err(PrepError::Configuration(format!(
                "invalid looks parameter(s), x: {}, y: {}",
                self.x_looks, self.y_looks
            )));
        }
        if self.x_looks != self.y_looks {
            return Err(PrepError::Configuration(format!(
                "x and y looks mismatch, x: {}, y: {}",
                self.x_looks, self.y_looks
            )));
        }
        Ok(())
    }

    /// The shared look factor
    pub fn factor(&self) -> usize {
        self.x_looks
    }

    pub fn is_identity(&self) -> bool {
        self.x_looks == 1 && self.y_looks == 1
    }
}

impl Default for LookFactors {
    fn default() -> Self {
        Self { x_looks: 1, y_looks: 1 }
    }
}

/// One raster that failed inside a batch
#[derive(Debug)]
pub struct RasterFailure {
    pub path: PathBuf,
    pub error: PrepError,
}

/// Every per-raster failure of a batch run
#[derive(Debug)]
pub struct BatchFailure {
    pub failures: Vec<RasterFailure>,
    pub total: usize,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} rasters failed to prepare", self.failures.len(), self.total)?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.path.display(), failure.error)?;
        }
        Ok(())
    }
}

/// Error types for raster preparation
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Grid alignment error: {parameter} crop extent not within {tolerance} of grid coordinate")]
    GridAlignment { parameter: String, tolerance: f64 },

    #[error("Metadata state error: {0}")]
    MetadataState(String),

    #[error("Input raster not found: {0}")]
    InputNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("{0}")]
    Batch(BatchFailure),
}

/// Result type for preparation operations
pub type PrepResult<T> = Result<T, PrepError>;
