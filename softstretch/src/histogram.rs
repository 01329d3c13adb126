//! Per-channel intensity histograms.
//!
//! A [`Histogram`] holds one ordered sequence of bin counts per channel. All
//! channels share the same bin count and the same pixel total. Once captured a
//! histogram is never mutated; every stage of the soft stretch reads it by
//! reference.
//!
//! Histograms normally arrive from the host already binned, but they can also
//! be captured directly from a 16-bit `(rows, cols, channels)` array with
//! [`Histogram::from_image`].

use ndarray::{ArrayView3, Axis};
use rayon::prelude::*;
use thiserror::Error;

/// Number of bins in a histogram of 16-bit data.
pub const BINS_16BIT: usize = 65536;

/// Errors raised when a histogram or its median estimates violate the input contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistogramError {
    #[error("Histogram has no channels")]
    NoChannels,
    #[error("Histogram must have 1 or 3 channels, got {0}")]
    UnsupportedChannelCount(usize),
    #[error("Histogram needs at least 2 bins, got {0}")]
    TooFewBins(usize),
    #[error("Channel {channel} has {found} bins, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        found: usize,
    },
    #[error("Channel {channel} holds {found} pixels, expected {expected}")]
    ChannelTotalMismatch {
        channel: usize,
        expected: u64,
        found: u64,
    },
    #[error("Pixel total of channel {channel} does not fit in 64 bits")]
    CountOverflow { channel: usize },
    #[error("Expected {expected} median values, got {found}")]
    MedianCountMismatch { expected: usize, found: usize },
    #[error("Median {value} for channel {channel} is outside [0, 1]")]
    MedianOutOfRange { channel: usize, value: f64 },
    #[error("Image must have 1 or 3 channels along the last axis, got {0}")]
    UnsupportedImageShape(usize),
}

/// Discretized intensity histogram with 1 (grayscale) or 3 (RGB) channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bins: usize,
    /// Pixel total, identical for every channel
    total: u64,
    channels: Vec<Vec<u64>>,
}

/// Sum of a channel's counts, `None` when it overflows `u64`.
fn checked_total(counts: &[u64]) -> Option<u64> {
    counts.iter().try_fold(0u64, |acc, &c| acc.checked_add(c))
}

impl Histogram {
    /// Build a histogram from raw per-channel bin counts.
    ///
    /// # Errors
    /// Returns a [`HistogramError`] when there are not 1 or 3 channels, fewer
    /// than 2 bins, when a channel's pixel total overflows `u64`, or when the
    /// channels disagree on bin count or pixel total.
    pub fn from_channels(channels: Vec<Vec<u64>>) -> Result<Self, HistogramError> {
        let first = channels.first().ok_or(HistogramError::NoChannels)?;
        if channels.len() != 1 && channels.len() != 3 {
            return Err(HistogramError::UnsupportedChannelCount(channels.len()));
        }

        let bins = first.len();
        if bins < 2 {
            return Err(HistogramError::TooFewBins(bins));
        }

        let expected_total =
            checked_total(first).ok_or(HistogramError::CountOverflow { channel: 0 })?;
        for (channel, counts) in channels.iter().enumerate().skip(1) {
            if counts.len() != bins {
                return Err(HistogramError::ChannelLengthMismatch {
                    channel,
                    expected: bins,
                    found: counts.len(),
                });
            }
            let total = checked_total(counts).ok_or(HistogramError::CountOverflow { channel })?;
            if total != expected_total {
                return Err(HistogramError::ChannelTotalMismatch {
                    channel,
                    expected: expected_total,
                    found: total,
                });
            }
        }

        Ok(Self {
            bins,
            total: expected_total,
            channels,
        })
    }

    /// Capture a 65536-bin histogram from a 16-bit image laid out as
    /// `(rows, cols, channels)`.
    ///
    /// Channels are binned in parallel.
    pub fn from_image(image: ArrayView3<u16>) -> Result<Self, HistogramError> {
        let channel_count = image.len_of(Axis(2));
        if channel_count != 1 && channel_count != 3 {
            return Err(HistogramError::UnsupportedImageShape(channel_count));
        }

        let channels: Vec<Vec<u64>> = (0..channel_count)
            .into_par_iter()
            .map(|c| {
                let mut counts = vec![0u64; BINS_16BIT];
                for &value in image.index_axis(Axis(2), c).iter() {
                    counts[value as usize] += 1;
                }
                counts
            })
            .collect();

        Self::from_channels(channels)
    }

    /// Number of channels (1 or 3)
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of bins per channel
    pub fn bin_count(&self) -> usize {
        self.bins
    }

    /// Count in one bin of one channel
    pub fn count(&self, channel: usize, bin: usize) -> u64 {
        self.channels[channel][bin]
    }

    /// All bin counts of one channel
    pub fn channel(&self, channel: usize) -> &[u64] {
        &self.channels[channel]
    }

    /// Pixel total, shared by every channel
    pub fn total_pixels(&self) -> u64 {
        self.total
    }

    /// Convert a bin index to normalized `[0, 1]` intensity, `bin / (B - 1)`.
    pub fn normalize(&self, bin: usize) -> f64 {
        bin as f64 / (self.bins - 1) as f64
    }

    /// Median of one channel in normalized units.
    ///
    /// This is the lowest bin whose cumulative count reaches half of the
    /// pixel total. An empty channel reports `0.0`.
    pub fn median_norm(&self, channel: usize) -> f64 {
        let total = self.total;
        if total == 0 {
            return 0.0;
        }

        // ceil(total / 2) without doubling the cumulative count
        let half = total - total / 2;
        let mut cumulative = 0u64;
        for (bin, &count) in self.channels[channel].iter().enumerate() {
            cumulative += count;
            if cumulative >= half {
                return self.normalize(bin);
            }
        }
        1.0
    }

    /// Median of every channel in normalized units
    pub fn medians(&self) -> Vec<f64> {
        (0..self.channel_count())
            .map(|c| self.median_norm(c))
            .collect()
    }

    /// Check a set of externally supplied medians against this histogram.
    pub fn validate_medians(&self, medians: &[f64]) -> Result<(), HistogramError> {
        if medians.len() != self.channel_count() {
            return Err(HistogramError::MedianCountMismatch {
                expected: self.channel_count(),
                found: medians.len(),
            });
        }
        for (channel, &value) in medians.iter().enumerate() {
            if !(0.0..=1.0).contains(&value) {
                return Err(HistogramError::MedianOutOfRange { channel, value });
            }
        }
        Ok(())
    }
}
