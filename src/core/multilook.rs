use crate::types::{
    ExtentBox, GeoTransform, LookFactors, NanFraction, PrepError, PrepResult, RasterData,
};
use ndarray::{s, Array2, ArrayView2, Zip};

/// Multilooking parameters
#[derive(Debug, Clone, Copy)]
pub struct MultilookParams {
    /// Block size along each axis
    pub looks: LookFactors,
    /// NaN fraction at or above which a block averages to NaN.
    ///
    /// 0.0 rejects any block with a missing cell, 1.0 only fully missing blocks.
    pub nan_threshold: f64,
}

impl Default for MultilookParams {
    fn default() -> Self {
        Self {
            looks: LookFactors::default(),
            nan_threshold: 0.0,
        }
    }
}

/// Averaged raster with its companion NaN-fraction plane
#[derive(Debug, Clone)]
pub struct MultilookResult {
    pub data: RasterData,
    /// Fraction of missing source cells behind each output cell
    pub nan_fraction: NanFraction,
    /// Grid of `data`: resolved origin, pixel size scaled by the looks
    pub transform: GeoTransform,
}

impl MultilookResult {
    /// Mean NaN fraction over the output, for quality reporting
    pub fn mean_nan_fraction(&self) -> f64 {
        if self.nan_fraction.is_empty() {
            return 0.0;
        }
        self.nan_fraction.iter().map(|&f| f as f64).sum::<f64>() / self.nan_fraction.len() as f64
    }
}

/// NaN-aware block-averaging resampler
pub struct MultilookProcessor {
    params: MultilookParams,
}

impl MultilookProcessor {
    /// Create a new multilook processor
    pub fn new(params: MultilookParams) -> PrepResult<Self> {
        params.looks.validate()?;
        if !(0.0..=1.0).contains(&params.nan_threshold) {
            return Err(PrepError::Configuration(format!(
                "threshold must be >= 0 and <= 1, got {}",
                params.nan_threshold
            )));
        }
        Ok(Self { params })
    }

    /// Output (rows, cols) for a window of the given size.
    ///
    /// Rounds half to even, so a trailing partial block of at least half a
    /// block (strictly more for the tie case) produces an extra output cell.
    pub fn output_dim(&self, rows: usize, cols: usize) -> (usize, usize) {
        let looks = self.params.looks.factor() as f64;
        (
            (rows as f64 / looks).round_ties_even() as usize,
            (cols as f64 / looks).round_ties_even() as usize,
        )
    }

    /// Average `window` (already cut to `extent`, missing data as NaN) into blocks.
    ///
    /// # Arguments
    /// * `window` - source samples under the resolved extent
    /// * `source` - native grid of the source raster
    /// * `extent` - resolved extent the window was cut to
    pub fn apply_multilook(
        &self,
        window: &RasterData,
        source: &GeoTransform,
        extent: &ExtentBox,
    ) -> PrepResult<MultilookResult> {
        let (rows, cols) = window.dim();
        let looks = self.params.looks.factor();
        let (out_rows, out_cols) = self.output_dim(rows, cols);

        if out_rows == 0 || out_cols == 0 {
            return Err(PrepError::Processing(format!(
                "Multilook parameters too large for input image: {}x{} window, {} looks",
                rows, cols, looks
            )));
        }

        log::debug!(
            "Applying {}x{} looks to {}x{} window -> {}x{}",
            looks, looks, rows, cols, out_rows, out_cols
        );

        let mut data = Array2::<f32>::from_elem((out_rows, out_cols), f32::NAN);
        let mut nan_fraction = NanFraction::zeros((out_rows, out_cols));
        let threshold = self.params.nan_threshold;
        let view = window.view();

        let cell = |(r, c): (usize, usize), value: &mut f32, fraction: &mut f32| {
            let (mean, f) = average_block(&view, r, c, looks, threshold);
            *value = mean;
            *fraction = f as f32;
        };

        #[cfg(feature = "parallel")]
        Zip::indexed(&mut data)
            .and(&mut nan_fraction)
            .par_for_each(cell);

        #[cfg(not(feature = "parallel"))]
        Zip::indexed(&mut data)
            .and(&mut nan_fraction)
            .for_each(cell);

        let transform = GeoTransform {
            top_left_x: extent.xmin,
            pixel_width: source.pixel_width * looks as f64,
            rotation_x: source.rotation_x,
            top_left_y: extent.ymax,
            rotation_y: source.rotation_y,
            pixel_height: source.pixel_height * looks as f64,
        };

        Ok(MultilookResult {
            data,
            nan_fraction,
            transform,
        })
    }
}

/// Mean and NaN fraction of the block behind output cell (`row`, `col`).
///
/// Cells of a trailing block that fall past the window count as missing. The mean
/// is kept when the fraction is below the threshold, or when nothing is missing
/// and the threshold is exactly zero.
fn average_block(
    window: &ArrayView2<f32>,
    row: usize,
    col: usize,
    looks: usize,
    threshold: f64,
) -> (f32, f64) {
    let (rows, cols) = window.dim();
    let r0 = (row * looks).min(rows);
    let r1 = ((row + 1) * looks).min(rows);
    let c0 = (col * looks).min(cols);
    let c1 = ((col + 1) * looks).min(cols);

    let mut sum = 0.0f64; // f64 accumulation keeps large blocks exact enough
    let mut valid = 0usize;
    for &v in window.slice(s![r0..r1, c0..c1]).iter() {
        if !v.is_nan() {
            sum += v as f64;
            valid += 1;
        }
    }

    let block_cells = looks * looks;
    let nan_fraction = (block_cells - valid) as f64 / block_cells as f64;

    let keep = nan_fraction < threshold || (nan_fraction == 0.0 && threshold == 0.0);
    if keep && valid > 0 {
        ((sum / valid as f64) as f32, nan_fraction)
    } else {
        (f32::NAN, nan_fraction)
    }
}
