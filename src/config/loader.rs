//! Configuration Loader
//!
//! Environment-aware configuration loading that mirrors the Rails side's
//! YAML approach: a base `docstream.yaml` merged with an optional
//! `environments/<env>.yaml` overlay. A missing file is not fatal - the
//! loader falls back to documented defaults with a warning, because the
//! monitor must come up even on a half-provisioned host.

use std::env;
use std::path::{Path, PathBuf};

use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};

use super::DocstreamConfig;
use crate::error::{DocstreamError, Result};

pub struct ConfigLoader {
    config_directory: PathBuf,
    environment: String,
}

impl ConfigLoader {
    /// Create a loader with environment auto-detection.
    pub fn new(config_dir: Option<PathBuf>) -> Self {
        Self {
            config_directory: config_dir.unwrap_or_else(|| PathBuf::from("config")),
            environment: Self::detect_environment(),
        }
    }

    /// Create a loader with an explicit environment. Useful for tests that
    /// must not touch process-wide environment variables.
    pub fn with_environment(config_dir: Option<PathBuf>, environment: &str) -> Self {
        Self {
            config_directory: config_dir.unwrap_or_else(|| PathBuf::from("config")),
            environment: environment.to_string(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Load and merge configuration, then validate it.
    ///
    /// Returns defaults (with a warning) when the base file is absent;
    /// a file that exists but fails to parse is a hard error.
    pub fn load(&self) -> Result<DocstreamConfig> {
        let base_path = self.config_directory.join("docstream.yaml");
        if !base_path.exists() {
            warn!(
                path = %base_path.display(),
                "Configuration file not found, using defaults"
            );
            return Ok(DocstreamConfig::default());
        }

        let mut merged = Self::read_yaml(&base_path)?;

        let overlay_path = self
            .config_directory
            .join("environments")
            .join(format!("{}.yaml", self.environment));
        if overlay_path.exists() {
            let overlay = Self::read_yaml(&overlay_path)?;
            Self::merge_yaml(&mut merged, overlay);
            debug!(
                environment = %self.environment,
                overlay = %overlay_path.display(),
                "Applied environment configuration overlay"
            );
        }

        let config: DocstreamConfig = serde_yaml::from_value(merged).map_err(|e| {
            DocstreamError::ConfigurationError(format!(
                "Invalid configuration in {}: {e}",
                base_path.display()
            ))
        })?;

        config.validate()?;

        debug!(
            environment = %self.environment,
            stale_job_threshold = config.monitor.stale_job_threshold_seconds,
            stuck_job_limit = config.monitor.stuck_job_limit,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Detect environment from standard environment variables
    pub fn detect_environment() -> String {
        env::var("DOCSTREAM_ENV")
            .or_else(|_| env::var("RAILS_ENV"))
            .or_else(|_| env::var("RACK_ENV"))
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn read_yaml(path: &Path) -> Result<YamlValue> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DocstreamError::ConfigurationError(format!("Cannot read {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            DocstreamError::ConfigurationError(format!("Cannot parse {}: {e}", path.display()))
        })
    }

    /// Deep-merge `overlay` into `base`. Mappings merge recursively;
    /// everything else in the overlay replaces the base value.
    fn merge_yaml(base: &mut YamlValue, overlay: YamlValue) {
        match (base, overlay) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
                for (key, value) in overlay_map {
                    match base_map.entry(key) {
                        serde_yaml::mapping::Entry::Occupied(mut existing) => {
                            Self::merge_yaml(existing.get_mut(), value);
                        }
                        serde_yaml::mapping::Entry::Vacant(slot) => {
                            slot.insert(value);
                        }
                    }
                }
            }
            (base_slot, overlay_value) => *base_slot = overlay_value,
        }
    }
}
