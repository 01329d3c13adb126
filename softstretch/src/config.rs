//! Soft stretch configuration.
//!
//! The configuration is owned by the caller and persisted between sessions,
//! see [`crate::config_storage::PresetStorage`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Upper bound of the low output range expansion
pub const MAX_EXPAND_LOW: f64 = 0.2;

/// Smallest allowed aggressiveness factor
pub const MIN_AGGRESSIVENESS: f64 = 1.0;

/// Exclusive upper bound of the median target
pub const MAX_MEDIAN_TARGET: f64 = 0.4;

/// Required gap between the low range expansion and the median target
pub const MEDIAN_TARGET_MARGIN: f64 = 0.1;

/// Errors raised by configuration validation and persistence.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("ht_expand_low {0} is outside [0, 0.2]")]
    ExpandLowOutOfRange(f64),
    #[error("aggressiveness {0} must be finite and at least 1")]
    AggressivenessOutOfRange(f64),
    #[error("median_target {target} must lie in ({lower}, 0.4)")]
    MedianTargetOutOfRange { target: f64, lower: f64 },
    #[error("Invalid preset name '{0}'")]
    InvalidPresetName(String),
    #[error("Configuration I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// User-facing parameters of the soft stretch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftStretchConfig {
    /// Low output range expansion in `[0, 0.2]`; lifts the darkest output level
    pub ht_expand_low: f64,
    /// Clip highlights at the highest populated bin instead of 1.0
    pub zero_in_white_point: bool,
    /// Scales the clipping threshold that opens the shadow regression window
    pub aggressiveness: f64,
    /// Output median the stretch aims for
    pub median_target: f64,
}

impl Default for SoftStretchConfig {
    fn default() -> Self {
        Self {
            ht_expand_low: 0.0,
            zero_in_white_point: false,
            aggressiveness: 1.0,
            median_target: 0.25,
        }
    }
}

impl SoftStretchConfig {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_EXPAND_LOW).contains(&self.ht_expand_low) {
            return Err(ConfigError::ExpandLowOutOfRange(self.ht_expand_low));
        }
        if !self.aggressiveness.is_finite() || self.aggressiveness < MIN_AGGRESSIVENESS {
            return Err(ConfigError::AggressivenessOutOfRange(self.aggressiveness));
        }
        let lower = self.ht_expand_low + MEDIAN_TARGET_MARGIN;
        if !(self.median_target > lower && self.median_target < MAX_MEDIAN_TARGET) {
            return Err(ConfigError::MedianTargetOutOfRange {
                target: self.median_target,
                lower,
            });
        }
        Ok(())
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file and validate
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
