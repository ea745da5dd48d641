//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "KV_RESOLVER";

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Domain names in resolution order
    #[serde(default)]
    pub domains: Vec<String>,

    /// Persistence backend
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Share pattern strings between keys
    #[serde(default = "default_true")]
    pub interning: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            persistence: PersistenceConfig::default(),
            observability: ObservabilityConfig::default(),
            interning: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// Values live in memory only
    #[default]
    None,
    /// Volatile backend recording stores, mostly for tests
    Memory,
    /// Snapshot file on disk
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Yaml,
    Json,
}

impl SnapshotFormat {
    /// Format implied by a file extension, if any
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,

    /// Snapshot file, required for the file backend
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Snapshot encoding; inferred from the path extension when unset
    #[serde(default)]
    pub format: Option<SnapshotFormat>,
}

impl PersistenceConfig {
    /// Configured format, else the one implied by the path, else YAML
    pub fn effective_format(&self) -> SnapshotFormat {
        self.format
            .or_else(|| self.path.as_deref().and_then(SnapshotFormat::from_path))
            .unwrap_or_default()
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_domains()?;
        self.validate_persistence()?;
        self.validate_observability()?;
        Ok(())
    }

    fn validate_domains(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "domains".to_string(),
                    message: "Domain names must not be blank".to_string(),
                });
            }
            if !seen.insert(domain.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "domains".to_string(),
                    message: format!("Duplicate domain '{}'", domain),
                });
            }
        }
        Ok(())
    }

    fn validate_persistence(&self) -> Result<(), ConfigError> {
        if self.persistence.backend == PersistenceBackend::File && self.persistence.path.is_none() {
            return Err(ConfigError::MissingField("persistence.path".to_string()));
        }
        Ok(())
    }

    fn validate_observability(&self) -> Result<(), ConfigError> {
        if self.observability.log_level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "observability.log_level".to_string(),
                message: "Log level must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from `config/default`, `config/{env}` and the environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from `{dir}/default`, `{dir}/{env}` and the environment
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::from(dir.join("default")).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("domains"),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        domains = ?settings.domains,
        backend = ?settings.persistence.backend,
        "Loaded settings"
    );
    Ok(settings)
}
