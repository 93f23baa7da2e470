//! Configuration management for the rsgate CLI.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults. This follows the 12-factor app
//! pattern.
//!
//! # Example
//!
//! ```ignore
//! use rsgate_server::config::GateConfig;
//!
//! // Load from file with env overrides
//! let config = GateConfig::load("config.yaml")?;
//!
//! // Or load from environment only
//! let config = GateConfig::from_env()?;
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GateConfig {
    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Code shape settings
    #[serde(default)]
    pub codes: CodeSettings,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Backend to use: "memory" or "postgres"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database connection URL (required for postgres)
    #[serde(default)]
    pub database_url: Option<String>,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout(),
        }
    }
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    30
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to emit JSON-formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Code shape settings.
///
/// These can be overridden via environment variables with the `RSGATE_`
/// prefix and `__` as the nested key separator:
///
/// - `RSGATE_CODES__LENGTH=8`
/// - `RSGATE_CODES__ALPHABET=ABCDEF0123456789`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CodeSettings {
    /// Length of every code
    #[serde(default = "default_code_length")]
    pub length: usize,

    /// Alphabet codes are generated from (canonical, upper-case)
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            length: default_code_length(),
            alphabet: default_alphabet(),
        }
    }
}

fn default_code_length() -> usize {
    rsgate_domain::DEFAULT_CODE_LENGTH
}

fn default_alphabet() -> String {
    rsgate_domain::DIGIT_ALPHABET.to_string()
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl GateConfig {
    /// Loads configuration from a YAML file with environment overrides.
    ///
    /// Environment variables are prefixed with `RSGATE_` and use `__`
    /// as separator: `RSGATE_STORAGE__BACKEND=postgres`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&GateConfig::default())?)
            // Add config file
            .add_source(File::from(path).format(FileFormat::Yaml))
            // Add environment variables with RSGATE_ prefix
            .add_source(
                Environment::with_prefix("RSGATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let gate_config: GateConfig = config.try_deserialize()?;
        gate_config.validate()?;

        Ok(gate_config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&GateConfig::default())?)
            .add_source(
                Environment::with_prefix("RSGATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let gate_config: GateConfig = config.try_deserialize()?;
        gate_config.validate()?;

        Ok(gate_config)
    }

    /// Validates field values after deserialization.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_backends = ["memory", "postgres"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "storage.backend must be one of: {:?}, got: {}",
                    valid_backends, self.storage.backend
                ),
            });
        }

        if self.storage.backend == "postgres"
            && self
                .storage
                .database_url
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            return Err(ConfigLoadError::Invalid {
                message: "storage.database_url is required when backend is 'postgres'"
                    .to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        if self.codes.length == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "codes.length must be greater than 0".to_string(),
            });
        }

        if self.codes.alphabet.is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "codes.alphabet must not be empty".to_string(),
            });
        }

        // Generated codes must already be canonical, or redemption of a
        // freshly generated code would fail its own canonical check.
        if self.codes.alphabet.chars().any(|c| c.is_lowercase()) {
            return Err(ConfigLoadError::Invalid {
                message: "codes.alphabet must not contain lowercase characters".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = GateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.codes.length, 6);
        assert_eq!(config.codes.alphabet, "0123456789");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = GateConfig::load("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "storage:\n  backend: memory\ncodes:\n  length: 8\nlogging:\n  level: debug"
        )
        .unwrap();

        let config = GateConfig::load(file.path()).unwrap();
        assert_eq!(config.codes.length, 8);
        assert_eq!(config.logging.level, "debug");
        // Untouched sections keep defaults.
        assert_eq!(config.storage.pool_size, 10);
    }

    #[test]
    fn postgres_requires_database_url() {
        let config = GateConfig {
            storage: StorageSettings {
                backend: "postgres".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid { .. }));
    }

    #[test]
    fn rejects_unknown_backend_and_level() {
        let config = GateConfig {
            storage: StorageSettings {
                backend: "sqlite".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GateConfig {
            logging: LoggingSettings {
                level: "loud".to_string(),
                json: false,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_degenerate_code_settings() {
        let config = GateConfig {
            codes: CodeSettings {
                length: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GateConfig {
            codes: CodeSettings {
                length: 6,
                alphabet: "abc123".to_string(),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
