//! Histogram transform records and the tone-curve executor seam.
//!
//! A histogram transform is described per channel by five control points:
//! input shadows/highlights clipping, the midtones balance, and the output
//! range bounds. Three auxiliary slots (saturation, lightness, hue in the
//! host's transform) are always left as the identity.
//!
//! Applying the transform is the host's job, expressed here as the
//! [`ToneCurveExecutor`] trait. [`Image16`] is an in-process executor for
//! 16-bit arrays that applies the curve through a lookup table.

use ndarray::{Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::histogram::{Histogram, HistogramError, BINS_16BIT};
use crate::mtf::mtf;

/// Five control points of one channel's tone curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformRow {
    /// Input level mapped to output 0 before range expansion
    pub shadows_clip: f64,
    pub midtones_balance: f64,
    /// Input level mapped to output 1 before range expansion
    pub highlights_clip: f64,
    /// Lower output range bound; negative values lift the shadows
    pub shadows_output_offset: f64,
    /// Upper output range bound
    pub highlights_output_offset: f64,
}

impl TransformRow {
    pub const IDENTITY: Self = Self {
        shadows_clip: 0.0,
        midtones_balance: 0.5,
        highlights_clip: 1.0,
        shadows_output_offset: 0.0,
        highlights_output_offset: 1.0,
    };

    /// Map one normalized value through the curve.
    ///
    /// Clip to `[shadows_clip, highlights_clip]`, rescale to `[0, 1]`, apply the
    /// MTF, then expand `[shadows_output_offset, highlights_output_offset]` onto `[0, 1]`.
    pub fn map(&self, value: f64) -> f64 {
        let input_range = self.highlights_clip - self.shadows_clip;
        let clipped = if input_range > 0.0 {
            ((value - self.shadows_clip) / input_range).clamp(0.0, 1.0)
        } else if value >= self.highlights_clip {
            1.0
        } else {
            0.0
        };

        let curved = mtf(self.midtones_balance, clipped);

        let output_range = self.highlights_output_offset - self.shadows_output_offset;
        if output_range <= 0.0 {
            return curved;
        }
        ((curved - self.shadows_output_offset) / output_range).clamp(0.0, 1.0)
    }

    /// Precompute the curve for every 16-bit input level.
    pub fn lookup_table_16bit(&self) -> Vec<u16> {
        let max = (BINS_16BIT - 1) as f64;
        (0..BINS_16BIT)
            .map(|level| (self.map(level as f64 / max) * max).round() as u16)
            .collect()
    }
}

impl Default for TransformRow {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Complete transform handed to a tone-curve executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramTransform {
    /// Red, green and blue (a grayscale image uses the first)
    pub channels: [TransformRow; 3],
    /// Always identity
    pub auxiliary: [TransformRow; 3],
}

impl HistogramTransform {
    /// Same curve on every colour channel, identity on the auxiliary slots.
    pub fn uniform(row: TransformRow) -> Self {
        Self {
            channels: [row; 3],
            auxiliary: [TransformRow::IDENTITY; 3],
        }
    }
}

impl Default for HistogramTransform {
    fn default() -> Self {
        Self::uniform(TransformRow::IDENTITY)
    }
}

/// Applies a histogram transform to the image it owns.
pub trait ToneCurveExecutor {
    type Error;

    fn execute(&mut self, transform: &HistogramTransform) -> Result<(), Self::Error>;
}

/// 16-bit image laid out as `(rows, cols, channels)` with 1 or 3 channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Image16 {
    pixels: Array3<u16>,
}

impl Image16 {
    pub fn new(pixels: Array3<u16>) -> Result<Self, HistogramError> {
        let channels = pixels.len_of(Axis(2));
        if channels != 1 && channels != 3 {
            return Err(HistogramError::UnsupportedImageShape(channels));
        }
        Ok(Self { pixels })
    }

    pub fn view(&self) -> ArrayView3<'_, u16> {
        self.pixels.view()
    }

    pub fn into_inner(self) -> Array3<u16> {
        self.pixels
    }

    pub fn channel_count(&self) -> usize {
        self.pixels.len_of(Axis(2))
    }

    pub fn histogram(&self) -> Result<Histogram, HistogramError> {
        Histogram::from_image(self.pixels.view())
    }
}

impl ToneCurveExecutor for Image16 {
    type Error = Infallible;

    fn execute(&mut self, transform: &HistogramTransform) -> Result<(), Self::Error> {
        for (channel, mut plane) in self.pixels.axis_iter_mut(Axis(2)).enumerate() {
            let lut = transform.channels[channel].lookup_table_16bit();
            plane.par_mapv_inplace(|v| lut[v as usize]);
        }
        Ok(())
    }
}
