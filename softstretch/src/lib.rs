//! Automatic calibration of a soft histogram stretch.
//!
//! Given a per-channel intensity histogram and the channel medians, computes
//! the black point, white point and midtones balance of a gentle stretch that
//! lands the image median on a configurable target while clipping as little
//! shadow detail as possible.

pub mod config;
pub mod config_storage;
pub mod diagnostics;
pub mod extract;
pub mod histogram;
pub mod mtf;
pub mod pipeline;
pub mod preview;
pub mod regression;
pub mod transform;

pub use config::{ConfigError, SoftStretchConfig};
pub use config_storage::PresetStorage;
pub use diagnostics::{ChannelReport, StretchWarning};
pub use extract::{extract, ChannelStats, Extraction};
pub use histogram::{Histogram, HistogramError, BINS_16BIT};
pub use mtf::{mtf, BalanceSolution, MidtonesBalanceSolver};
pub use pipeline::{soft_stretch, SoftStretch, StretchError, StretchParameters};
pub use preview::PreviewSession;
pub use regression::{RegressionError, RegressionResult};
pub use transform::{HistogramTransform, Image16, ToneCurveExecutor, TransformRow};
