//! Configuration for simulation sessions.
//!
//! Sessions can be configured declaratively from YAML or JSON:
//!
//! ```yaml
//! maxPops: 10000
//! waveWindow: 300
//! logLevel: info
//! clocks:
//!   - node: clk_in
//!     period: 2
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::DEFAULT_MAX_POPS;
use crate::types::{Id, Tick};
use crate::wave::DEFAULT_WAVE_WINDOW;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A clock bound to an input node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Input node driven by this clock
    pub node: Id,
    /// Ticks per half-cycle
    pub period: Tick,
}

/// Session configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimConfig {
    /// Queue-pop bound per drain
    #[serde(default = "default_max_pops")]
    pub max_pops: u64,

    /// Visible waveform window width in ticks
    #[serde(default = "default_wave_window")]
    pub wave_window: Tick,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Clocks to install when a session is built from a document
    #[serde(default)]
    pub clocks: Vec<ClockConfig>,

    /// Free-form attributes for editor extensions
    #[serde(default)]
    pub attrs: HashMap<String, String>,
}

fn default_max_pops() -> u64 {
    DEFAULT_MAX_POPS
}

fn default_wave_window() -> Tick {
    DEFAULT_WAVE_WINDOW
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_pops: default_max_pops(),
            wave_window: default_wave_window(),
            log_level: default_log_level(),
            clocks: Vec::new(),
            attrs: HashMap::new(),
        }
    }
}

impl SimConfig {
    /// Parses a YAML configuration string.
    pub fn from_yaml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON configuration string.
    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, dispatching on its extension.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            Some("json") => Self::from_json_str(&contents),
            other => Err(ConfigError::UnknownFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_pops == 0 {
            return Err(ConfigError::Validation(
                "maxPops must be greater than zero".to_string(),
            ));
        }
        if self.wave_window == 0 {
            return Err(ConfigError::Validation(
                "waveWindow must be greater than zero".to_string(),
            ));
        }
        for clock in &self.clocks {
            if clock.period == 0 {
                return Err(ConfigError::Validation(format!(
                    "clock on node {} has zero period",
                    clock.node
                )));
            }
        }
        Ok(())
    }
}
