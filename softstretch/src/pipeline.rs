//! The soft stretch pipeline.
//!
//! `histogram + medians + configuration -> StretchParameters`, recomputed from
//! scratch on every call:
//!
//! 1. extract per-channel white, median and black points ([`crate::extract`]),
//! 2. aggregate them across channels (lowest black, highest white, mean median),
//! 3. reset the black point when it overtakes the median,
//! 4. solve for the midtones balance that lands the rescaled median on the
//!    target once the low output range expansion is applied.
//!
//! Every numeric degradation is recovered with a [`StretchWarning`]; only
//! invalid inputs return an error.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, SoftStretchConfig};
use crate::diagnostics::{ChannelReport, StretchWarning};
use crate::extract::{self, ChannelStats, Extraction};
use crate::histogram::{Histogram, HistogramError};
use crate::mtf::MidtonesBalanceSolver;
use crate::transform::{HistogramTransform, TransformRow};

/// Errors for inputs that violate the pipeline contract.
#[derive(Error, Debug)]
pub enum StretchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid histogram input: {0}")]
    Histogram(#[from] HistogramError),
}

/// Final stretch record handed to the tone-curve executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretchParameters {
    pub black_point: f64,
    /// Midtones balance in `[0, 1]`
    pub midtones_balance: f64,
    pub white_point: f64,
    /// Lower output range bound, `-ht_expand_low`
    pub shadows_clip: f64,
    /// Upper output range bound, always 1
    pub highlights_clip: f64,
}

impl StretchParameters {
    /// Control points applied identically to every colour channel.
    pub fn transform_row(&self) -> TransformRow {
        TransformRow {
            shadows_clip: self.black_point,
            midtones_balance: self.midtones_balance,
            highlights_clip: self.white_point,
            shadows_output_offset: self.shadows_clip,
            highlights_output_offset: self.highlights_clip,
        }
    }

    pub fn to_histogram_transform(&self) -> HistogramTransform {
        HistogramTransform::uniform(self.transform_row())
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SoftStretch {
    pub parameters: StretchParameters,
    /// Red, green and blue slots
    pub channel_stats: [ChannelStats; 3],
    /// Mean of the channel medians
    pub median: f64,
    /// Median rescaled into `[black_point, white_point]`, the solver's input
    pub clipped_median: f64,
    /// Level the MTF has to reach before output range expansion
    pub mtf_target: f64,
    pub reports: Vec<ChannelReport>,
    pub warnings: Vec<StretchWarning>,
}

/// MTF output that ends at `median_target` after expanding `[-e, 1]` onto `[0, 1]`.
pub fn effective_mtf_target(median_target: f64, ht_expand_low: f64) -> f64 {
    median_target * (1.0 + ht_expand_low) - ht_expand_low
}

/// A black point above the median cannot be right; the caller resets it to 0.
fn check_ordering(median: f64, black_point: f64) -> Option<StretchWarning> {
    (median < black_point).then_some(StretchWarning::InconsistentOrdering {
        median,
        black_point,
    })
}

/// Common black point of the extraction, reset to bin 0 when it lies above
/// `median`. A reset recounts every channel's clipped pixels against bin 0.
fn black_point_below_median(
    histogram: &Histogram,
    extraction: &mut Extraction,
    median: f64,
) -> (usize, Option<StretchWarning>) {
    let black_adu = extraction.common_black_point_adu();
    match check_ordering(median, histogram.normalize(black_adu)) {
        Some(warning) => {
            extraction.recount_clipped(histogram, 0);
            (0, Some(warning))
        }
        None => (black_adu, None),
    }
}

/// A white point at or below the black point leaves no range; the caller resets it to 1.
fn check_white_point(white_point: f64, black_point: f64) -> Option<StretchWarning> {
    (white_point <= black_point).then_some(StretchWarning::DegenerateWhitePoint {
        white_point,
        black_point,
    })
}

/// Run the soft stretch with the default balance solver.
pub fn soft_stretch(
    histogram: &Histogram,
    medians: &[f64],
    config: &SoftStretchConfig,
) -> Result<SoftStretch, StretchError> {
    soft_stretch_with_solver(histogram, medians, config, &MidtonesBalanceSolver::default())
}

/// Run the soft stretch with an explicit balance solver.
///
/// # Arguments
/// * `histogram` - Captured per-channel histogram
/// * `medians` - Normalized median of each channel
/// * `config` - Validated before use
/// * `solver` - Tolerance and iteration bound of the balance search
pub fn soft_stretch_with_solver(
    histogram: &Histogram,
    medians: &[f64],
    config: &SoftStretchConfig,
    solver: &MidtonesBalanceSolver,
) -> Result<SoftStretch, StretchError> {
    config.validate()?;
    let mut extraction = extract::extract(histogram, medians, config.aggressiveness)?;
    let mut warnings = std::mem::take(&mut extraction.warnings);

    let median = medians.iter().sum::<f64>() / medians.len() as f64;

    let (black_adu, ordering) = black_point_below_median(histogram, &mut extraction, median);
    if let Some(warning) = ordering {
        warn!("{warning}");
        warnings.push(warning);
    }
    let black_point = histogram.normalize(black_adu);

    let mut white_point = if config.zero_in_white_point {
        histogram.normalize(extraction.common_white_point_adu())
    } else {
        1.0
    };
    if let Some(warning) = check_white_point(white_point, black_point) {
        warn!("{warning}");
        warnings.push(warning);
        white_point = 1.0;
    }

    let clipped_median = ((median - black_point) / (white_point - black_point)).clamp(0.0, 1.0);
    let mtf_target = effective_mtf_target(config.median_target, config.ht_expand_low);
    let solution = solver.solve(clipped_median, mtf_target);
    if !solution.converged {
        let warning = StretchWarning::SolverNotConverged {
            iterations: solution.iterations,
            balance: solution.balance,
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    let parameters = StretchParameters {
        black_point,
        midtones_balance: solution.balance,
        white_point,
        shadows_clip: -config.ht_expand_low,
        highlights_clip: 1.0,
    };

    let clipped = extraction.stats[0].clipped_pixel_count;
    let total = histogram.total_pixels();
    info!(
        "Soft stretch: black {:.6} ({} ADU, {} px clipped, {:.4}%), white {:.6}, median {:.6} -> balance {:.8}",
        black_point,
        black_adu,
        clipped,
        if total > 0 { clipped as f64 * 100.0 / total as f64 } else { 0.0 },
        white_point,
        median,
        solution.balance
    );

    Ok(SoftStretch {
        parameters,
        channel_stats: extraction.stats,
        median,
        clipped_median,
        mtf_target,
        reports: extraction.reports,
        warnings,
    })
}
