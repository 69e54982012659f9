//! Edge correction reproducing legacy multilook output.
//!
//! Legacy tools size the multilooked grid by truncating division, so a trailing
//! partial block never produces an averaged cell. When the block averager rounds
//! the grid up instead, the extra southeast cells are refilled with the
//! nearest-neighbour source sample so outputs line up with legacy products.

use crate::io::PixelWindow;
use crate::types::{LookFactors, PrepResult, RasterData};
use ndarray::s;

/// Replaces the southeast border of a multilooked array with nearest-neighbour samples
pub struct LegacyAligner {
    looks: usize,
}

impl LegacyAligner {
    pub fn new(looks: LookFactors) -> PrepResult<Self> {
        looks.validate()?;
        Ok(Self {
            looks: looks.factor(),
        })
    }

    /// Output size legacy tools produce for a `rows` x `cols` window
    pub fn truncated_dim(&self, rows: usize, cols: usize) -> (usize, usize) {
        (rows / self.looks, cols / self.looks)
    }

    /// Correct `averaged`, multilooked from `window` of the raw `source` band.
    ///
    /// The replaced region is `rows >= row_start, cols >= col_start`, where each
    /// start is the truncated size on an axis whose output grew past it and 0 on
    /// an axis that did not. Each replaced cell takes the source sample under its
    /// centre, or NaN where the centre falls outside the source. Returns the
    /// corrected array and the number of cells rewritten.
    pub fn apply(
        &self,
        averaged: RasterData,
        source: &RasterData,
        window: &PixelWindow,
    ) -> PrepResult<(RasterData, usize)> {
        let (out_rows, out_cols) = averaged.dim();
        let (trunc_rows, trunc_cols) = self.truncated_dim(window.rows, window.cols);

        if out_rows <= trunc_rows && out_cols <= trunc_cols {
            return Ok((averaged, 0));
        }

        let row_start = if out_rows > trunc_rows { trunc_rows } else { 0 };
        let col_start = if out_cols > trunc_cols { trunc_cols } else { 0 };

        let (src_rows, src_cols) = source.dim();
        let mut corrected = averaged;
        let mut region = corrected.slice_mut(s![row_start.., col_start..]);
        for ((r, c), value) in region.indexed_iter_mut() {
            let src_row = nearest(window.row_off, r + row_start, self.looks, src_rows);
            let src_col = nearest(window.col_off, c + col_start, self.looks, src_cols);
            *value = match (src_row, src_col) {
                (Some(row), Some(col)) => source[[row, col]],
                _ => f32::NAN,
            };
        }

        let rewritten = (out_rows - row_start) * (out_cols - col_start);
        log::debug!(
            "Legacy alignment rewrote {} cells from row {} / col {} ({}x{} truncated)",
            rewritten, row_start, col_start, trunc_rows, trunc_cols
        );

        Ok((corrected, rewritten))
    }
}

/// Source index under the centre of output cell `index`, if inside the source
fn nearest(offset: i64, index: usize, looks: usize, len: usize) -> Option<usize> {
    // centre of the block in source pixels is index * looks + looks / 2
    let centre = offset + (index * looks + looks / 2) as i64;
    if centre >= 0 && (centre as usize) < len {
        Some(centre as usize)
    } else {
        None
    }
}
