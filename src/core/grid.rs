use crate::config::GRID_TOL;
use crate::io::RasterHeader;
use crate::types::{ExtentBox, PrepError, PrepResult};

/// Checks that extent boundaries fall on a raster's native pixel grid
#[derive(Debug, Clone, Copy)]
pub struct GridValidator {
    /// Allowed offset from a whole pixel, as a fraction of one step
    pub tolerance: f64,
}

impl Default for GridValidator {
    fn default() -> Self {
        Self { tolerance: GRID_TOL }
    }
}

impl GridValidator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Whether `boundary` lies a whole number of `step`s from `origin`
    pub fn is_aligned(&self, boundary: f64, origin: f64, step: f64) -> bool {
        let diff = (boundary - origin).abs();
        let remainder = (diff / step).fract().abs();
        remainder <= self.tolerance || remainder >= 1.0 - self.tolerance
    }

    /// Check one boundary, naming the grid parameter it was compared against
    pub fn check_boundary(
        &self,
        parameter: &str,
        boundary: f64,
        origin: f64,
        step: f64,
    ) -> PrepResult<()> {
        if self.is_aligned(boundary, origin, step) {
            Ok(())
        } else {
            Err(PrepError::GridAlignment {
                parameter: parameter.to_string(),
                tolerance: self.tolerance,
            })
        }
    }

    /// Check all four extent boundaries against `reference`.
    ///
    /// Only the reference raster is consulted; the rest of the batch is assumed
    /// to share its grid, which the resolution check makes plausible.
    pub fn check_extent(&self, reference: &RasterHeader, extent: &ExtentBox) -> PrepResult<()> {
        let checks = [
            ("x_first", extent.xmin, reference.x_first(), reference.x_step()),
            ("x_last", extent.xmax, reference.x_last(), reference.x_step()),
            ("y_first", extent.ymax, reference.y_first(), reference.y_step()),
            ("y_last", extent.ymin, reference.y_last(), reference.y_step()),
        ];

        for (parameter, boundary, origin, step) in checks {
            self.check_boundary(parameter, boundary, origin, step)?;
        }

        log::debug!(
            "Extent aligned with grid of {} within {}",
            reference.path.display(),
            self.tolerance
        );
        Ok(())
    }
}
