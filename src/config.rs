//! Validated configuration handed over by the outer pipeline

use crate::types::{CropPolicy, LookFactors, PrepError, PrepResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default tolerance for grid alignment, as a fraction of one pixel step
pub const GRID_TOL: f64 = 1e-6;

/// Custom crop bounds; all four are required for `CropPolicy::Custom`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomBounds {
    pub x_first: Option<f64>,
    pub y_first: Option<f64>,
    pub x_last: Option<f64>,
    pub y_last: Option<f64>,
}

impl CustomBounds {
    pub fn new(x_first: f64, y_first: f64, x_last: f64, y_last: f64) -> Self {
        Self {
            x_first: Some(x_first),
            y_first: Some(y_first),
            x_last: Some(x_last),
            y_last: Some(y_last),
        }
    }

    /// All four bounds as (x_first, y_first, x_last, y_last)
    pub fn require(&self) -> PrepResult<(f64, f64, f64, f64)> {
        let missing = |name: &str| {
            PrepError::Configuration(format!("'{}' must be provided for custom crop", name))
        };
        Ok((
            self.x_first.ok_or_else(|| missing("ifgxfirst"))?,
            self.y_first.ok_or_else(|| missing("ifgyfirst"))?,
            self.x_last.ok_or_else(|| missing("ifgxlast"))?,
            self.y_last.ok_or_else(|| missing("ifgylast"))?,
        ))
    }
}

/// Coherence masking inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoherenceConfig {
    /// Minimum coherence for a pixel to be kept
    pub threshold: Option<f64>,
    /// Directory the coherence files live in
    pub dir: Option<PathBuf>,
    /// Pool of coherence file names, paired to interferograms by epoch
    pub files: Vec<String>,
}

/// Preparation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepConfig {
    pub looks: LookFactors,
    pub crop: CropPolicy,
    #[serde(default)]
    pub custom_bounds: CustomBounds,
    /// NaN fraction at or above which an averaged cell becomes no-data
    pub nan_threshold: f64,
    #[serde(default)]
    pub coherence: CoherenceConfig,
    /// Worker pool size; host parallelism when unset
    #[serde(default)]
    pub workers: Option<usize>,
    /// Replace boundary blocks with nearest-neighbour values like legacy tools
    #[serde(default)]
    pub legacy_alignment: bool,
    #[serde(default = "default_grid_tolerance")]
    pub grid_tolerance: f64,
    /// Output directory; next to each input when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_grid_tolerance() -> f64 {
    GRID_TOL
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            looks: LookFactors::default(),
            crop: CropPolicy::Intersection,
            custom_bounds: CustomBounds::default(),
            nan_threshold: 0.0,
            coherence: CoherenceConfig::default(),
            workers: None,
            legacy_alignment: false,
            grid_tolerance: GRID_TOL,
            output_dir: None,
        }
    }
}

impl PrepConfig {
    /// Check every setting that can be checked without touching a raster
    pub fn validate(&self) -> PrepResult<()> {
        self.looks.validate()?;

        if !(0.0..=1.0).contains(&self.nan_threshold) {
            return Err(PrepError::Configuration(format!(
                "NaN averaging threshold must be between 0.0 and 1.0 (inclusive), got {}",
                self.nan_threshold
            )));
        }

        if self.crop == CropPolicy::Custom {
            self.custom_bounds.require()?;
        }

        if let Some(threshold) = self.coherence.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(PrepError::Configuration(format!(
                    "coherence threshold must be between 0.0 and 1.0 (inclusive), got {}",
                    threshold
                )));
            }
            if self.coherence.files.is_empty() {
                return Err(PrepError::Configuration(
                    "coherence threshold is set but no coherence files are supplied".to_string(),
                ));
            }
        } else if !self.coherence.files.is_empty() {
            return Err(PrepError::Configuration(
                "coherence files provided without a coherence threshold".to_string(),
            ));
        }

        if self.workers == Some(0) {
            return Err(PrepError::Configuration("worker count must be >= 1".to_string()));
        }

        if !(self.grid_tolerance >= 0.0 && self.grid_tolerance < 0.5) {
            return Err(PrepError::Configuration(format!(
                "grid tolerance must be in [0, 0.5), got {}",
                self.grid_tolerance
            )));
        }

        Ok(())
    }

    /// Effective worker pool size
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}
