use crate::types::{PrepError, PrepResult, RasterData};
use ndarray::Zip;
use std::path::PathBuf;

/// Coherence raster and threshold used to reject unreliable pixels
#[derive(Debug, Clone, PartialEq)]
pub struct CoherenceSpec {
    pub path: PathBuf,
    pub threshold: f64,
}

impl CoherenceSpec {
    /// Pair a coherence path with a threshold.
    ///
    /// Both absent means no masking. One without the other is rejected; each
    /// side is checked on its own so the error names what is missing.
    pub fn from_parts(path: Option<PathBuf>, threshold: Option<f64>) -> PrepResult<Option<Self>> {
        match (path, threshold) {
            (Some(path), Some(threshold)) => {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(PrepError::Configuration(format!(
                        "coherence threshold must be between 0.0 and 1.0 (inclusive), got {}",
                        threshold
                    )));
                }
                Ok(Some(Self { path, threshold }))
            }
            (Some(path), None) => Err(PrepError::Configuration(format!(
                "coherence file {} provided without a coherence threshold",
                path.display()
            ))),
            (None, Some(_)) => Err(PrepError::Configuration(
                "coherence threshold is set but no coherence file is supplied".to_string(),
            )),
            (None, None) => Ok(None),
        }
    }
}

/// Rejects pixels whose coherence falls below a threshold
pub struct CoherenceMasker {
    threshold: f32,
}

impl CoherenceMasker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold as f32,
        }
    }

    /// Keep `source` where coherence >= threshold, NaN elsewhere.
    ///
    /// NaN coherence never passes. Returns the masked array and the number of
    /// pixels newly rejected.
    pub fn apply(&self, source: RasterData, coherence: &RasterData) -> PrepResult<(RasterData, usize)> {
        if source.dim() != coherence.dim() {
            return Err(PrepError::Processing(format!(
                "coherence raster shape {:?} does not match source shape {:?}",
                coherence.dim(),
                source.dim()
            )));
        }

        let threshold = self.threshold;
        let mut masked = source;
        let mut rejected = 0usize;

        Zip::from(&mut masked).and(coherence).for_each(|value, &coh| {
            if !(coh >= threshold) {
                if !value.is_nan() {
                    rejected += 1;
                }
                *value = f32::NAN;
            }
        });

        let total = masked.len().max(1);
        log::debug!(
            "Coherence mask at {:.3} rejected {} pixels ({:.2}%)",
            threshold,
            rejected,
            rejected as f64 / total as f64 * 100.0
        );

        Ok((masked, rejected))
    }
}
