//! Configuration for the key/value resolver
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files (`config/default`, `config/{env}`)
//! - Environment variables (KV_RESOLVER_ prefix, `__` as separator)
//!
//! Settings are validated after loading.

pub mod settings;

pub use settings::{
    load_settings, load_settings_from, ObservabilityConfig, PersistenceBackend, PersistenceConfig,
    SnapshotFormat, Settings, ENV_PREFIX,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(name) => ConfigError::MissingField(name),
            config::ConfigError::Foreign(inner) => ConfigError::Environment(inner.to_string()),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}
