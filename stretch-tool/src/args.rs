//! Stretch settings shared by every subcommand that runs or stores a stretch.

use clap::Args;
use softstretch::config::{MAX_EXPAND_LOW, MAX_MEDIAN_TARGET, MIN_AGGRESSIVENESS};
use softstretch::{ConfigError, PresetStorage, SoftStretchConfig};

/// Parse the low output range expansion, in `[0, 0.2]`
fn parse_expand_low(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid numeric value: {s}"))?;
    if !(0.0..=MAX_EXPAND_LOW).contains(&value) {
        return Err(format!("Expansion must be between 0 and {MAX_EXPAND_LOW}"));
    }
    Ok(value)
}

/// Parse the aggressiveness factor, at least 1
fn parse_aggressiveness(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid numeric value: {s}"))?;
    if !value.is_finite() || value < MIN_AGGRESSIVENESS {
        return Err(format!("Aggressiveness must be at least {MIN_AGGRESSIVENESS}"));
    }
    Ok(value)
}

/// Parse the median target, in `(0, 0.4)`; the lower bound against the expansion
/// is checked once all settings are combined.
fn parse_median_target(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid numeric value: {s}"))?;
    if !(value > 0.0 && value < MAX_MEDIAN_TARGET) {
        return Err(format!(
            "Median target must be between 0 and {MAX_MEDIAN_TARGET} (exclusive)"
        ));
    }
    Ok(value)
}

/// Soft stretch settings; anything left unset comes from the base preset.
#[derive(Args, Debug, Clone, Default)]
pub struct StretchArgs {
    /// Start from a stored preset instead of the last used settings
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Ignore the last used settings and start from the defaults
    #[arg(long, conflicts_with = "preset")]
    pub defaults: bool,

    /// Expand the output range below zero to lift the shadows (0 to 0.2)
    #[arg(long, value_parser = parse_expand_low)]
    pub ht_expand_low: Option<f64>,

    /// Clip highlights at the brightest populated level instead of full scale
    #[arg(long)]
    pub zero_in_white_point: Option<bool>,

    /// Clipping threshold scale for the shadow fit (at least 1)
    #[arg(short, long, value_parser = parse_aggressiveness)]
    pub aggressiveness: Option<f64>,

    /// Output median to aim for
    #[arg(short, long, value_parser = parse_median_target)]
    pub median_target: Option<f64>,
}

impl StretchArgs {
    /// Resolve the base configuration, then apply the command line overrides.
    ///
    /// The base is the named preset if one was given, otherwise the last used
    /// settings, otherwise the defaults. A missing or unreadable last used file
    /// silently falls back to the defaults; a missing preset is an error.
    pub fn resolve(&self, storage: &PresetStorage) -> Result<SoftStretchConfig, ResolveError> {
        let base = if let Some(name) = &self.preset {
            storage
                .get_preset(name)
                .ok_or_else(|| ResolveError::UnknownPreset(name.clone()))??
        } else if self.defaults {
            SoftStretchConfig::default()
        } else {
            match storage.get_last_used() {
                Some(Ok(config)) => config,
                Some(Err(e)) => {
                    log::warn!("Ignoring unreadable last used settings: {e}");
                    SoftStretchConfig::default()
                }
                None => SoftStretchConfig::default(),
            }
        };

        let config = self.apply(base);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, base: SoftStretchConfig) -> SoftStretchConfig {
        SoftStretchConfig {
            ht_expand_low: self.ht_expand_low.unwrap_or(base.ht_expand_low),
            zero_in_white_point: self
                .zero_in_white_point
                .unwrap_or(base.zero_in_white_point),
            aggressiveness: self.aggressiveness.unwrap_or(base.aggressiveness),
            median_target: self.median_target.unwrap_or(base.median_target),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("No preset named '{0}'")]
    UnknownPreset(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
