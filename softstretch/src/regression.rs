//! Shadow slope estimation.
//!
//! Fits an ordinary least-squares line to a window of the additive histogram
//! and reports where that line crosses zero. The crossing is the statistically
//! robust origin of the histogram's rising edge and becomes the black point.
//!
//! Degenerate windows are not repaired here. A single-sample window yields a
//! NaN slope, a flat window an infinite x-intercept; the caller decides what
//! to substitute.

use serde::Serialize;
use thiserror::Error;

use crate::diagnostics::confidence_percent;

/// Errors that can occur during the shadow regression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegressionError {
    #[error("Regression window [{start}, {end}) holds no samples")]
    EmptyWindow { start: usize, end: usize },
}

/// Least-squares line `y = slope * x + intercept` with its goodness of fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, in `[0, 1]` for well-posed windows
    pub r2: f64,
    /// `-intercept / slope`
    pub x_intercept: f64,
    /// Number of samples in the window
    pub samples: usize,
}

impl RegressionResult {
    /// Integer bin of the zero crossing, `floor(x_intercept)`.
    ///
    /// Returns `None` when the crossing is not finite (flat or single-sample window).
    pub fn black_point_adu(&self) -> Option<i64> {
        if self.x_intercept.is_finite() {
            Some(self.x_intercept.floor() as i64)
        } else {
            None
        }
    }

    /// R² as a percentage rounded to 2 decimals
    pub fn confidence_percent(&self) -> f64 {
        confidence_percent(self.r2)
    }
}

/// Fit `y = additive[j]` against `x = j` over `j ∈ [start, end)`.
///
/// # Arguments
/// * `additive` - Additive histogram of one channel
/// * `start` - First bin of the window (the clipping threshold bin)
/// * `end` - Exclusive upper bound (the histogram peak bin), clamped to `additive.len()`
///
/// # Errors
/// * `RegressionError::EmptyWindow` - `end <= start`
pub fn estimate(
    additive: &[f64],
    start: usize,
    end: usize,
) -> Result<RegressionResult, RegressionError> {
    let end = end.min(additive.len());
    if end <= start {
        return Err(RegressionError::EmptyWindow { start, end });
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;

    for (j, &y) in additive.iter().enumerate().take(end).skip(start) {
        let x = j as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
        sum_y2 += y * y;
    }

    let n = (end - start) as f64;
    let covariance = n * sum_xy - sum_x * sum_y;
    let variance_x = n * sum_x2 - sum_x * sum_x;
    let variance_y = n * sum_y2 - sum_y * sum_y;

    let slope = covariance / variance_x;
    let intercept = (sum_y - slope * sum_x) / n;
    let r = covariance / (variance_x * variance_y).sqrt();

    Ok(RegressionResult {
        slope,
        intercept,
        r2: r * r,
        x_intercept: -intercept / slope,
        samples: end - start,
    })
}
