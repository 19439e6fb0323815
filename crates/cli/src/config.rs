//! Configuration management for the CLI
//!
//! Layers, lowest precedence first: built-in defaults, the JSON config file,
//! `CPUREADY_*` environment variables (nested keys joined with `__`, e.g.
//! `CPUREADY_THRESHOLDS__WARNING=7`), then command-line flags.

use analyzer_lib::{IntervalProfile, NormalizerConfig, RiskPolicy, Thresholds};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::commands::IntervalChoice;

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Health thresholds in percent
    pub thresholds: Thresholds,
    /// Unit detection tuning
    pub normalizer: NormalizerConfig,
    /// Removal risk classification limits
    pub risk: RiskPolicy,
    /// Interval used when `--interval` is not given; auto-detect if unset
    pub default_interval: Option<IntervalProfile>,
}

impl AppConfig {
    /// Load configuration from the config file and environment
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let file = match path {
            Some(p) => Some((p.to_path_buf(), true)),
            None => Self::config_path().ok().map(|p| (p, false)),
        };
        if let Some((file, required)) = file {
            builder = builder.add_source(
                config::File::from(file.as_path())
                    .format(config::FileFormat::Json)
                    .required(required),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("CPUREADY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Apply the command-line layer on top of file and environment values
    pub fn with_overrides(
        mut self,
        interval: Option<IntervalChoice>,
        warning: Option<f64>,
        critical: Option<f64>,
    ) -> Self {
        if let Some(w) = warning {
            self.thresholds.warning = w;
        }
        if let Some(c) = critical {
            self.thresholds.critical = c;
        }
        match interval {
            Some(IntervalChoice::Fixed(profile)) => self.default_interval = Some(profile),
            Some(IntervalChoice::Auto) => self.default_interval = None,
            None => {}
        }
        self
    }

    /// Reject thresholds and normalizer settings the analysis cannot use
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.normalizer
            .validate()
            .context("Invalid \"normalizer\" section")?;
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("cpuready").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let base = AppConfig {
            default_interval: Some(IntervalProfile::LastMonth),
            ..AppConfig::default()
        };

        let week = Some(IntervalChoice::Fixed(IntervalProfile::LastWeek));
        let merged = base.clone().with_overrides(week, Some(8.0), None);
        assert_eq!(merged.thresholds.warning, 8.0);
        assert_eq!(merged.thresholds.critical, base.thresholds.critical);
        assert_eq!(merged.default_interval, Some(IntervalProfile::LastWeek));

        let auto = base.clone().with_overrides(Some(IntervalChoice::Auto), None, None);
        assert_eq!(auto.default_interval, None);

        assert_eq!(base.clone().with_overrides(None, None, None), base);
    }

    #[test]
    fn test_validate_rejects_zero_divisor() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        config.normalizer.emergency_divisor = 0.0;
        assert!(config.validate().is_err());
    }
}
