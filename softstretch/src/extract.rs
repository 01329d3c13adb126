//! Per-channel black, white and median point extraction.
//!
//! For every channel the extractor
//! 1. finds the white point, the highest populated bin,
//! 2. converts the median to a bin index by truncation (`floor(median * B)`),
//! 3. builds the additive histogram below the median: a running sum of the
//!    mean of each bin and its successor,
//! 4. remembers the bin with the largest additive increment (the right edge
//!    of the regression window),
//! 5. finds the first bin where the additive histogram exceeds
//!    `total / 10000 * aggressiveness` (the left edge of the window),
//! 6. fits the shadow slope over that window to place the black point.
//!
//! Channels are independent and processed in parallel. Once every channel's
//! black point is known, the pixels below the lowest of them are counted as
//! clipped.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::diagnostics::{ChannelReport, StretchWarning};
use crate::histogram::{Histogram, HistogramError};
use crate::regression::{self, RegressionResult};

/// Divisor applied to the pixel total before scaling by aggressiveness
pub const CLIPPING_THRESHOLD_DIVISOR: f64 = 10_000.0;

/// Derived statistics for one channel, in ADU (bin index) units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChannelStats {
    pub white_point_adu: usize,
    pub median_adu: usize,
    pub black_point_adu: usize,
    /// Pixels in bins below the common (cross-channel minimum) black point
    pub clipped_pixel_count: u64,
}

/// Shadow-region profile of one channel, the input to the slope fit.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowProfile {
    pub white_point_adu: usize,
    pub median_adu: usize,
    /// Additive histogram for bins `0..median_adu`
    pub additive: Vec<f64>,
    /// Bin with the largest additive increment
    pub peak_adu: usize,
    pub peak_increment: f64,
    /// First bin above the clipping threshold, 0 when never crossed
    pub mad_min_adu: usize,
    pub clipping_threshold: f64,
    pub threshold_crossed: bool,
}

/// Result of extracting every channel of a histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Red, green and blue slots; a grayscale channel fills all three
    pub stats: [ChannelStats; 3],
    pub profiles: Vec<ShadowProfile>,
    pub fits: Vec<Option<RegressionResult>>,
    pub reports: Vec<ChannelReport>,
    pub warnings: Vec<StretchWarning>,
}

impl Extraction {
    /// Lowest black point across all channels
    pub fn common_black_point_adu(&self) -> usize {
        self.stats
            .iter()
            .map(|s| s.black_point_adu)
            .min()
            .unwrap_or(0)
    }

    /// Highest white point across all channels
    pub fn common_white_point_adu(&self) -> usize {
        self.stats
            .iter()
            .map(|s| s.white_point_adu)
            .max()
            .unwrap_or(0)
    }

    /// Recount clipped pixels against a new common black point.
    pub fn recount_clipped(&mut self, histogram: &Histogram, black_point_adu: usize) {
        for (slot, stats) in self.stats.iter_mut().enumerate() {
            let channel = slot.min(histogram.channel_count() - 1);
            stats.clipped_pixel_count =
                clipped_pixel_count(histogram.channel(channel), black_point_adu);
        }
    }
}

/// Highest bin with a nonzero count, 0 for an empty channel.
pub fn white_point_adu(counts: &[u64]) -> usize {
    counts.iter().rposition(|&c| c > 0).unwrap_or(0)
}

/// Median bin by truncation, `floor(median_norm * bins)`, kept inside the histogram.
pub fn median_adu(median_norm: f64, bins: usize) -> usize {
    ((median_norm * bins as f64).floor() as usize).min(bins.saturating_sub(1))
}

/// Total count in bins strictly below `black_point_adu`.
pub fn clipped_pixel_count(counts: &[u64], black_point_adu: usize) -> u64 {
    counts.iter().take(black_point_adu).sum()
}

/// Build the shadow profile of one channel.
///
/// # Arguments
/// * `counts` - Bin counts of the channel
/// * `median_norm` - Channel median in `[0, 1]`
/// * `aggressiveness` - Scales the clipping threshold; larger values start the fit higher
pub fn profile_channel(counts: &[u64], median_norm: f64, aggressiveness: f64) -> ShadowProfile {
    let total: u64 = counts.iter().sum();
    let white_point_adu = white_point_adu(counts);
    let median_adu = median_adu(median_norm, counts.len());
    let clipping_threshold = total as f64 / CLIPPING_THRESHOLD_DIVISOR * aggressiveness;

    let mut additive = Vec::with_capacity(median_adu);
    let mut running = 0.0;
    let mut peak_adu = 0;
    let mut peak_increment = 0.0;
    let mut crossing = None;

    for j in 0..median_adu {
        let next = counts.get(j + 1).copied().unwrap_or(0);
        let increment = (counts[j] + next) as f64 / 2.0;
        running += increment;
        additive.push(running);

        if increment > peak_increment {
            peak_increment = increment;
            peak_adu = j;
        }
        if crossing.is_none() && running > clipping_threshold {
            crossing = Some(j);
        }
    }

    ShadowProfile {
        white_point_adu,
        median_adu,
        additive,
        peak_adu,
        peak_increment,
        mad_min_adu: crossing.unwrap_or(0),
        clipping_threshold,
        threshold_crossed: crossing.is_some(),
    }
}

/// Per-channel outcome before cross-channel aggregation.
struct ChannelOutcome {
    profile: ShadowProfile,
    fit: Option<RegressionResult>,
    black_point_adu: usize,
    warnings: Vec<StretchWarning>,
}

fn process_channel(
    channel: usize,
    counts: &[u64],
    median_norm: f64,
    aggressiveness: f64,
) -> ChannelOutcome {
    let profile = profile_channel(counts, median_norm, aggressiveness);
    let mut warnings = Vec::new();

    if !profile.threshold_crossed {
        let warning = StretchWarning::ClippingThresholdNotReached {
            channel,
            threshold: profile.clipping_threshold,
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    debug!(
        "Channel {}: white {} median {} window [{}, {})",
        channel, profile.white_point_adu, profile.median_adu, profile.mad_min_adu, profile.peak_adu
    );

    let (fit, black_point_adu) =
        match regression::estimate(&profile.additive, profile.mad_min_adu, profile.peak_adu) {
            Err(_) => {
                let warning = StretchWarning::DegenerateWindow {
                    channel,
                    start: profile.mad_min_adu,
                    end: profile.peak_adu,
                };
                warn!("{warning}");
                warnings.push(warning);
                (None, 0)
            }
            Ok(fit) => {
                let adopted = match fit.black_point_adu() {
                    Some(adu) if adu > 0 => (adu as usize).min(counts.len() - 1),
                    _ => {
                        let warning = StretchWarning::NoSlopeOrigin {
                            channel,
                            x_intercept: fit.x_intercept,
                        };
                        warn!("{warning}");
                        warnings.push(warning);
                        0
                    }
                };
                info!(
                    "Channel {}: slope {:.4}, confidence {:.2}%, black point {}",
                    channel,
                    fit.slope,
                    fit.confidence_percent(),
                    adopted
                );
                (Some(fit), adopted)
            }
        };

    ChannelOutcome {
        profile,
        fit,
        black_point_adu,
        warnings,
    }
}

/// Extract black, white and median points for every channel.
///
/// # Errors
/// Fails only when `medians` does not match the histogram's channels or
/// holds values outside `[0, 1]`. Degenerate channels produce warnings, not errors.
pub fn extract(
    histogram: &Histogram,
    medians: &[f64],
    aggressiveness: f64,
) -> Result<Extraction, HistogramError> {
    histogram.validate_medians(medians)?;

    let outcomes: Vec<ChannelOutcome> = (0..histogram.channel_count())
        .into_par_iter()
        .map(|c| process_channel(c, histogram.channel(c), medians[c], aggressiveness))
        .collect();

    let channel_stats: Vec<ChannelStats> = outcomes
        .iter()
        .map(|o| ChannelStats {
            white_point_adu: o.profile.white_point_adu,
            median_adu: o.profile.median_adu,
            black_point_adu: o.black_point_adu,
            clipped_pixel_count: 0,
        })
        .collect();

    let stats = match channel_stats.as_slice() {
        [gray] => [*gray; 3],
        [red, green, blue] => [*red, *green, *blue],
        _ => unreachable!("histogram channel count is validated on construction"),
    };

    let reports = outcomes
        .iter()
        .enumerate()
        .map(|(channel, o)| ChannelReport {
            channel,
            slope: o.fit.map(|f| f.slope),
            confidence_percent: o.fit.map(|f| f.confidence_percent()),
            black_point_adu: o.black_point_adu,
        })
        .collect();

    let mut extraction = Extraction {
        stats,
        fits: outcomes.iter().map(|o| o.fit).collect(),
        reports,
        warnings: outcomes.iter().flat_map(|o| o.warnings.clone()).collect(),
        profiles: outcomes.into_iter().map(|o| o.profile).collect(),
    };

    let common_black = extraction.common_black_point_adu();
    extraction.recount_clipped(histogram, common_black);

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_point_is_highest_populated_bin() {
        assert_eq!(white_point_adu(&[0, 3, 0, 2, 0, 0]), 3);
        assert_eq!(white_point_adu(&[1, 0, 0, 0, 0, 9]), 5);
        assert_eq!(white_point_adu(&[0, 0, 0]), 0);
    }

    #[test]
    fn test_median_adu_truncates() {
        assert_eq!(median_adu(0.5, 65536), 32768);
        // 0.99999 * 10 = 9.9999 truncates to 9, never rounds to 10
        assert_eq!(median_adu(0.99999, 10), 9);
        assert_eq!(median_adu(0.26, 10), 2);
        assert_eq!(median_adu(0.0, 10), 0);
        assert_eq!(median_adu(1.0, 10), 9);
    }

    #[test]
    fn test_additive_histogram_smoothing() {
        let counts = [2, 4, 6, 8, 0, 0, 0, 0, 0, 0];
        let profile = profile_channel(&counts, 0.4, 1.0);

        assert_eq!(profile.median_adu, 4);
        // (2+4)/2, +(4+6)/2, +(6+8)/2, +(8+0)/2
        assert_eq!(profile.additive, vec![3.0, 8.0, 15.0, 19.0]);
        assert_eq!(profile.peak_adu, 2);
        assert_eq!(profile.peak_increment, 7.0);
    }

    #[test]
    fn test_additive_histogram_is_monotone() {
        let counts: Vec<u64> = (0..500u64).map(|i| (i * 7919) % 13).collect();
        let profile = profile_channel(&counts, 0.9, 1.0);
        assert!(profile.additive.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_successor_past_last_bin_counts_as_zero() {
        let counts = [0, 0, 4, 6];
        let profile = profile_channel(&counts, 1.0, 1.0);
        assert_eq!(profile.median_adu, 3);
        assert_eq!(profile.additive, vec![0.0, 2.0, 7.0]);
    }

    #[test]
    fn test_clipping_threshold_crossing() {
        // 20000 pixels, threshold = 20000 / 10000 * 3 = 6
        let mut counts = vec![0u64; 100];
        counts[10] = 4;
        counts[11] = 4;
        counts[12] = 4;
        counts[60] = 19988;

        let profile = profile_channel(&counts, 0.5, 3.0);
        assert_eq!(profile.clipping_threshold, 6.0);
        // additive: j=9 -> 2, j=10 -> 6, j=11 -> 10
        assert_eq!(profile.mad_min_adu, 11);
        assert!(profile.threshold_crossed);
    }

    #[test]
    fn test_threshold_never_crossed_keeps_zero() {
        let mut counts = vec![0u64; 100];
        counts[90] = 1000;
        let profile = profile_channel(&counts, 0.5, 1.0);
        assert_eq!(profile.mad_min_adu, 0);
        assert!(!profile.threshold_crossed);
    }

    #[test]
    fn test_clipped_pixel_count() {
        let counts = [5, 3, 2, 7, 1];
        assert_eq!(clipped_pixel_count(&counts, 0), 0);
        assert_eq!(clipped_pixel_count(&counts, 3), 10);
        assert_eq!(clipped_pixel_count(&counts, 5), 18);
    }

    /// Channel whose shadow edge rises linearly from `start` to a plateau at `peak`.
    fn ramp_channel(bins: usize, start: usize, peak: usize, plateau: u64) -> Vec<u64> {
        let mut counts = vec![0u64; bins];
        for (i, c) in counts.iter_mut().enumerate() {
            *c = if i < start {
                0
            } else if i < peak {
                (i - start) as u64 * plateau / (peak - start) as u64
            } else if i < bins / 2 {
                plateau
            } else {
                plateau / 4
            };
        }
        counts
    }

    #[test]
    fn test_extract_grayscale_fills_all_slots() {
        let counts = ramp_channel(1000, 100, 200, 1000);
        let hist = Histogram::from_channels(vec![counts]).unwrap();
        let medians = hist.medians();

        let extraction = extract(&hist, &medians, 1.0).unwrap();
        assert_eq!(extraction.stats[0], extraction.stats[1]);
        assert_eq!(extraction.stats[1], extraction.stats[2]);
        assert_eq!(extraction.reports.len(), 1);
        assert_eq!(extraction.stats[0].white_point_adu, 999);
        assert!(extraction.stats[0].black_point_adu > 0);
        assert!(extraction.stats[0].black_point_adu < extraction.stats[0].median_adu);
    }

    #[test]
    fn test_extract_rgb_clips_below_common_black_point() {
        let red = ramp_channel(1000, 100, 200, 1000);
        let total: u64 = red.iter().sum();
        let mut green = ramp_channel(1000, 150, 250, 1000);
        let mut blue = ramp_channel(1000, 200, 300, 1000);
        // Balance the totals in the top bin
        green[999] += total - green.iter().sum::<u64>();
        blue[999] += total - blue.iter().sum::<u64>();

        let hist = Histogram::from_channels(vec![red, green, blue]).unwrap();
        let extraction = extract(&hist, &hist.medians(), 1.0).unwrap();

        let common = extraction.common_black_point_adu();
        assert_eq!(common, extraction.stats[0].black_point_adu);
        assert!(extraction.stats[2].black_point_adu > common);
        for (c, stats) in extraction.stats.iter().enumerate() {
            assert_eq!(
                stats.clipped_pixel_count,
                clipped_pixel_count(hist.channel(c), common)
            );
        }
    }

    #[test]
    fn test_extract_empty_histogram_degrades() {
        let mut counts = vec![0u64; 1024];
        counts[0] = 500;
        let hist = Histogram::from_channels(vec![counts]).unwrap();

        let extraction = extract(&hist, &[0.0], 10.0).unwrap();
        assert_eq!(extraction.stats[0].white_point_adu, 0);
        assert_eq!(extraction.stats[0].median_adu, 0);
        assert_eq!(extraction.stats[0].black_point_adu, 0);
        assert!(extraction
            .warnings
            .iter()
            .any(|w| matches!(w, StretchWarning::DegenerateWindow { channel: 0, .. })));
    }

    #[test]
    fn test_extract_fit_crossing_below_zero_adopts_zero() {
        // A tall floor from bin 0 puts the fitted crossing left of the histogram
        let counts: Vec<u64> = (0..1000).map(|i| 100_000 + i).collect();
        let hist = Histogram::from_channels(vec![counts]).unwrap();

        let extraction = extract(&hist, &[0.5], 1.0).unwrap();
        let profile = &extraction.profiles[0];
        assert_eq!((profile.mad_min_adu, profile.peak_adu), (0, 499));

        let fit = extraction.fits[0].expect("window is long enough to fit");
        assert!(fit.x_intercept < 0.0, "crossing at {}", fit.x_intercept);
        assert_eq!(extraction.stats[0].black_point_adu, 0);
        assert_eq!(extraction.reports[0].black_point_adu, 0);
        assert_eq!(extraction.stats[0].clipped_pixel_count, 0);
        assert!(extraction
            .warnings
            .iter()
            .any(|w| matches!(w, StretchWarning::NoSlopeOrigin { channel: 0, x_intercept } if *x_intercept < 0.0)));
    }

    #[test]
    fn test_extract_records_unreached_clipping_threshold() {
        let mut counts = vec![0u64; 100];
        counts[90] = 1000;
        let hist = Histogram::from_channels(vec![counts]).unwrap();

        let extraction = extract(&hist, &[0.5], 1.0).unwrap();
        assert_eq!(extraction.profiles[0].mad_min_adu, 0);
        assert_eq!(extraction.stats[0].black_point_adu, 0);
        assert!(extraction.warnings.iter().any(|w| matches!(
            w,
            StretchWarning::ClippingThresholdNotReached { channel: 0, threshold }
                if (*threshold - 0.1).abs() < 1e-12
        )));
    }

    #[test]
    fn test_extract_rejects_mismatched_medians() {
        let hist = Histogram::from_channels(vec![vec![1, 1, 1]]).unwrap();
        assert!(extract(&hist, &[0.5, 0.5], 1.0).is_err());
    }
}
