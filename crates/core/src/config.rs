//! Configuration types for the Searchlog core library

use crate::coalescer::CoalescerConfig;
use crate::{Result, SearchlogError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchlogConfig {
    /// Version of the configuration schema
    pub version: String,
    /// Storage settings
    pub database: DatabaseConfig,
    /// Session coalescing settings
    pub coalescer: CoalescerConfig,
    /// Statistics worker settings
    pub worker: WorkerConfig,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for SearchlogConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database: DatabaseConfig::default(),
            coalescer: CoalescerConfig::default(),
            worker: WorkerConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which storage backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process storage, lost on restart
    #[default]
    Memory,
    /// PostgreSQL through sqlx
    Postgres,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Connection URL for the postgres backend
    #[serde(default)]
    pub url: String,
    /// Maximum pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Apply embedded migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url: String::new(),
            max_connections: default_max_connections(),
            run_migrations: true,
        }
    }
}

/// Statistics worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Run the worker periodically inside the server; `None` means on demand
    /// only
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Advisory lock key guarding worker runs across processes
    #[serde(default = "default_lease_key")]
    pub lease_key: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            lease_key: default_lease_key(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    /// Identify clients by the first `X-Forwarded-For` entry
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            max_request_size: default_max_request_size(),
            trust_forwarded_for: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SearchlogConfig {
    /// Load configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        // Try YAML first, then JSON
        match serde_yaml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(_) => {
                let config = serde_json::from_str(&content)?;
                Ok(config)
            }
        }
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from an optional file overlaid with `SEARCHLOG__*`
    /// environment variables, then validate it
    ///
    /// `SEARCHLOG__COALESCER__DEBOUNCE_TIMEOUT_MS=5000` sets
    /// `coalescer.debounce_timeout_ms`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("SEARCHLOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: SearchlogConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.coalescer.debounce_timeout_ms == 0 {
            return Err(SearchlogError::config(
                "Debounce timeout must be greater than zero",
            ));
        }

        if self.database.backend == StorageBackend::Postgres && self.database.url.trim().is_empty()
        {
            return Err(SearchlogError::config(
                "Database URL is required for the postgres backend",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(SearchlogError::config(
                "Database pool needs at least one connection",
            ));
        }

        if self.worker.interval_secs == Some(0) {
            return Err(SearchlogError::config(
                "Worker interval must be greater than zero",
            ));
        }

        if self.server.port == 0 {
            return Err(SearchlogError::config("Port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(SearchlogError::config(format!(
                "Invalid log level: {}. Valid levels: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty", "text", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(SearchlogError::config(format!(
                "Invalid log format: {}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_max_connections() -> u32 {
    5
}
fn default_lease_key() -> i64 {
    // "srchstat" as ASCII
    0x7372_6368_7374_6174
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_max_request_size() -> usize {
    1024 * 1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coalescer::SubmitPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SearchlogConfig::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert_eq!(config.coalescer.debounce_timeout_ms, 3000);
        assert_eq!(config.server.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SearchlogConfig::default();
        config.coalescer.debounce_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SearchlogConfig::default();
        config.database.backend = StorageBackend::Postgres;
        assert!(config.validate().is_err());
        config.database.url = "postgresql://localhost/searchlog".to_string();
        assert!(config.validate().is_ok());

        let mut config = SearchlogConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = SearchlogConfig::default();
        config.worker.interval_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
coalescer:
  debounce_timeout_ms: 5000
  submit_policy: flush_draft
server:
  port: 8080
  trust_forwarded_for: true
"#;
        let config: SearchlogConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.coalescer.debounce_timeout_ms, 5000);
        assert_eq!(config.coalescer.submit_policy, SubmitPolicy::FlushDraft);
        assert!(!config.coalescer.flush_on_divergence);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.trust_forwarded_for);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_file_io() {
        let mut config = SearchlogConfig::default();
        config.worker.interval_secs = Some(60);

        let temp_file = NamedTempFile::new().unwrap();
        config.to_file(temp_file.path()).unwrap();

        let loaded = SearchlogConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_layers_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "database:\n  backend: postgres\n  url: postgresql://db/searchlog\nworker:\n  interval_secs: 30"
        )
        .unwrap();

        let config = SearchlogConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database.backend, StorageBackend::Postgres);
        assert_eq!(config.database.url, "postgresql://db/searchlog");
        assert_eq!(config.worker.interval_secs, Some(30));
        assert_eq!(config.coalescer, CoalescerConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(file, "database:\n  backend: postgres").unwrap();

        assert!(SearchlogConfig::load(Some(file.path())).is_err());
    }
}
