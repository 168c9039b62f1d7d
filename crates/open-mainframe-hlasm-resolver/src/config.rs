//! Resolver configuration: sweep limits and layout options.

use serde::{Deserialize, Serialize};

/// Errors loading a [`ResolverConfig`].
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {param}: {value}")]
    InvalidValue { param: &'static str, value: String },
}

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Upper bound on re-evaluations in one cascade; the rest wait for `finish`.
    #[serde(default = "default_max_sweeps")]
    pub max_sweeps: usize,
    /// Stop collecting diagnostics after this many (0 = unlimited).
    #[serde(default)]
    pub max_diagnostics: usize,
    /// Boundary a non-first location counter starts on.
    #[serde(default = "default_loctr_alignment")]
    pub loctr_alignment: u32,
}

fn default_max_sweeps() -> usize {
    10_000
}

fn default_loctr_alignment() -> u32 {
    8
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_sweeps: default_max_sweeps(),
            max_diagnostics: 0,
            loctr_alignment: default_loctr_alignment(),
        }
    }
}

impl ResolverConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = self.loctr_alignment;
        if a == 0 || a > 4096 || !a.is_power_of_two() {
            return Err(ConfigError::InvalidValue {
                param: "loctr_alignment",
                value: a.to_string(),
            });
        }
        if self.max_sweeps == 0 {
            return Err(ConfigError::InvalidValue {
                param: "max_sweeps",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
