//! Preset storage for soft stretch configurations.
//!
//! Named presets live in `~/.softstretch/presets/<name>.json`; the
//! configuration of the most recent run is kept in `~/.softstretch/last_used.json`
//! so the next session starts from the same settings.

use crate::config::{ConfigError, SoftStretchConfig};
use std::path::{Path, PathBuf};

/// Storage manager for soft stretch presets.
#[derive(Debug, Clone)]
pub struct PresetStorage {
    /// Root directory for all presets (e.g., ~/.softstretch)
    root_path: PathBuf,
}

impl PresetStorage {
    /// Create a preset storage at the default path (~/.softstretch)
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(Self {
            root_path: PathBuf::from(home).join(".softstretch"),
        })
    }

    /// Create a preset storage with custom root path
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn presets_dir(&self) -> PathBuf {
        self.root_path.join("presets")
    }

    fn last_used_path(&self) -> PathBuf {
        self.root_path.join("last_used.json")
    }

    /// Names become file stems, so only ASCII letters, digits, `_` and `-` are allowed.
    fn preset_path(&self, name: &str) -> Result<PathBuf, ConfigError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigError::InvalidPresetName(name.to_string()));
        }
        Ok(self.presets_dir().join(format!("{name}.json")))
    }

    /// Load a named preset.
    ///
    /// Returns None if the preset does not exist.
    /// Returns Some(Err) if the name is invalid or the file cannot be loaded.
    pub fn get_preset(&self, name: &str) -> Option<Result<SoftStretchConfig, ConfigError>> {
        let path = match self.preset_path(name) {
            Ok(path) => path,
            Err(e) => return Some(Err(e)),
        };

        if !path.exists() {
            return None;
        }

        Some(SoftStretchConfig::load_from_file(&path))
    }

    /// Save a named preset, replacing any existing one.
    ///
    /// The configuration is validated first; invalid settings are never stored.
    /// Returns the path where the preset was saved.
    pub fn save_preset(
        &self,
        name: &str,
        config: &SoftStretchConfig,
    ) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = self.preset_path(name)?;
        std::fs::create_dir_all(self.presets_dir())?;
        config.save_to_file(&path)?;
        Ok(path)
    }

    /// List stored preset names in sorted order.
    pub fn list_presets(&self) -> std::io::Result<Vec<String>> {
        let dir = self.presets_dir();

        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();

        Ok(names)
    }

    /// Delete a named preset.
    ///
    /// Returns Ok(true) if the file was deleted, Ok(false) if it didn't exist.
    pub fn delete_preset(&self, name: &str) -> Result<bool, ConfigError> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(path)?;
        Ok(true)
    }

    /// Get the configuration of the last run.
    ///
    /// Returns None if nothing has been recorded yet.
    pub fn get_last_used(&self) -> Option<Result<SoftStretchConfig, ConfigError>> {
        let path = self.last_used_path();

        if !path.exists() {
            return None;
        }

        Some(SoftStretchConfig::load_from_file(&path))
    }

    /// Record the configuration of the current run.
    pub fn save_last_used(&self, config: &SoftStretchConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        std::fs::create_dir_all(&self.root_path)?;

        let path = self.last_used_path();
        config.save_to_file(&path)?;
        Ok(path)
    }
}

impl Default for PresetStorage {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_path(PathBuf::from(".softstretch")))
    }
}
