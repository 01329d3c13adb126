//! Warnings and per-channel reports produced alongside a soft stretch.
//!
//! None of the numeric degradations the pipeline can hit are fatal. Each one
//! is logged at `warn` and recorded here so callers (and tests) can inspect
//! exactly what was substituted.

use serde::Serialize;
use std::fmt;

/// A recovered numeric degradation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StretchWarning {
    /// The shadow regression window `[start, end)` held no samples, black point set to 0
    DegenerateWindow {
        channel: usize,
        start: usize,
        end: usize,
    },
    /// The fitted line crossed zero at or below bin 0 (or not at all), black point set to 0
    NoSlopeOrigin { channel: usize, x_intercept: f64 },
    /// The additive histogram never exceeded the clipping threshold, regression starts at 0
    ClippingThresholdNotReached { channel: usize, threshold: f64 },
    /// The estimated black point exceeded the median, black point reset to 0
    InconsistentOrdering { median: f64, black_point: f64 },
    /// White point did not lie above the black point, white point reset to 1
    DegenerateWhitePoint { white_point: f64, black_point: f64 },
    /// The balance search hit its iteration limit, best estimate kept
    SolverNotConverged { iterations: usize, balance: f64 },
}

impl fmt::Display for StretchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateWindow {
                channel,
                start,
                end,
            } => write!(
                f,
                "channel {channel}: regression window [{start}, {end}) is empty, black point set to 0"
            ),
            Self::NoSlopeOrigin {
                channel,
                x_intercept,
            } => write!(
                f,
                "channel {channel}: no slope origin found (x-intercept {x_intercept}), black point set to 0"
            ),
            Self::ClippingThresholdNotReached { channel, threshold } => write!(
                f,
                "channel {channel}: additive histogram never exceeds {threshold:.1}, regression starts at bin 0"
            ),
            Self::InconsistentOrdering {
                median,
                black_point,
            } => write!(
                f,
                "median {median:.6} lies below black point {black_point:.6}, black point set to 0"
            ),
            Self::DegenerateWhitePoint {
                white_point,
                black_point,
            } => write!(
                f,
                "white point {white_point:.6} does not exceed black point {black_point:.6}, white point set to 1"
            ),
            Self::SolverNotConverged {
                iterations,
                balance,
            } => write!(
                f,
                "midtones balance search stopped after {iterations} iterations at {balance:.10}"
            ),
        }
    }
}

/// Diagnostic values for one channel's shadow regression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelReport {
    pub channel: usize,
    /// Fitted slope, `None` when the window was empty
    pub slope: Option<f64>,
    /// R² as a percentage rounded to 2 decimals
    pub confidence_percent: Option<f64>,
    /// Black point adopted for this channel after the fallback policy
    pub black_point_adu: usize,
}

/// R² expressed as a percentage rounded to 2 decimals.
pub fn confidence_percent(r2: f64) -> f64 {
    (r2 * 100.0 * 100.0).round() / 100.0
}
