//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: bind address, port and greeting name.
//!     - StorageConfig: which backend persists readings, and the expiry horizon.
//!     - DetectionConfig: watering detection strategy and history window.
//!     - LoggingConfig: default log filter when RUST_LOG is unset.
//!
//! every section is optional. a missing key takes its default.
//!
//! ==============================================================================

use crate::detection::DetectionStrategy;
use crate::storage::DEFAULT_EXPIRY_DAYS;
use anyhow::{ensure, Context};
use serde::Deserialize;
use std::path::Path;

/// longest expiry horizon accepted, 100 years
pub const MAX_EXPIRY_DAYS: i64 = 36_500;

/// longest detection window accepted, one year
pub const MAX_WINDOW_MINUTES: i64 = 525_600;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub detection: DetectionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// who `GET /` says hello to
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Datastore,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub expiry_days: i64,
    pub datastore: DatastoreConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DatastoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub kind: String,
    /// keep one client for the life of the process instead of one per call
    pub reuse_client: bool,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub strategy: DetectionStrategy,
    /// how far back the history for a verdict reaches
    pub window_minutes: i64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0".to_string(), port: 8080, name: "World".to_string() }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            expiry_days: DEFAULT_EXPIRY_DAYS,
            datastore: DatastoreConfig::default(),
        }
    }
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            project_id: "moisture-host".to_string(),
            kind: "sensor-reading".to_string(),
            reuse_client: true,
            timeout_seconds: 10,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self { strategy: DetectionStrategy::default(), window_minutes: 60 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: HostConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// horizons outside these ranges would overflow date arithmetic
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (1..=MAX_EXPIRY_DAYS).contains(&self.storage.expiry_days),
            "storage.expiry_days must be between 1 and {}, got {}",
            MAX_EXPIRY_DAYS,
            self.storage.expiry_days
        );
        ensure!(
            (1..=MAX_WINDOW_MINUTES).contains(&self.detection.window_minutes),
            "detection.window_minutes must be between 1 and {}, got {}",
            MAX_WINDOW_MINUTES,
            self.detection.window_minutes
        );
        Ok(())
    }

    /// Load with default fallback
    ///
    /// returns the path the config came from, `None` when defaults were used.
    /// logging is not up yet, so the caller reports it.
    pub fn load_or_default() -> (Self, Option<std::path::PathBuf>, Vec<String>) {
        let paths = [
            std::path::PathBuf::from("config").join("host.toml"),
            std::path::PathBuf::from("..").join("config").join("host.toml"),
        ];
        let mut warnings = Vec::new();

        for path in paths {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => return (config, Some(path), warnings),
                    Err(e) => warnings.push(format!("Failed to load {}: {:#}", path.display(), e)),
                }
            }
        }

        (Self::default(), None, warnings)
    }

    /// `PORT` and `NAME` from the environment win over the file
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(name) = var("NAME").filter(|n| !n.is_empty()) {
            self.server.name = name;
        }
    }

    pub fn expiry_horizon(&self) -> chrono::Duration {
        chrono::Duration::days(self.storage.expiry_days)
    }

    pub fn detection_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.detection.window_minutes)
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            bind = %self.server.bind,
            port = self.server.port,
            backend = ?self.storage.backend,
            expiry_days = self.storage.expiry_days,
            strategy = ?self.detection.strategy,
            window_minutes = self.detection.window_minutes,
            "host configuration"
        );
        if self.storage.backend == StorageBackend::Datastore {
            tracing::info!(
                url = %self.storage.datastore.base_url,
                project = %self.storage.datastore.project_id,
                kind = %self.storage.datastore.kind,
                reuse_client = self.storage.datastore.reuse_client,
                "datastore backend"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(HostConfig::parse("").unwrap(), HostConfig::default());
    }

    #[test]
    fn partial_sections() {
        let config = HostConfig::parse(
            r#"
            [server]
            port = 9000

            [storage]
            backend = "datastore"

            [storage.datastore]
            base_url = "https://docs.example.net"
            reuse_client = false

            [detection]
            strategy = "z-score"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackend::Datastore);
        assert_eq!(config.storage.expiry_days, 30);
        assert_eq!(config.storage.datastore.base_url, "https://docs.example.net");
        assert!(!config.storage.datastore.reuse_client);
        assert_eq!(config.storage.datastore.kind, "sensor-reading");
        assert_eq!(config.detection.strategy, DetectionStrategy::ZScore);
        assert_eq!(config.detection.window_minutes, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(HostConfig::parse("[detection]\nstrategy = \"bayes\"").is_err());
    }

    #[test]
    fn out_of_range_horizons_are_rejected() {
        assert!(HostConfig::parse("[detection]\nwindow_minutes = 9223372036854775807").is_err());
        assert!(HostConfig::parse("[detection]\nwindow_minutes = 0").is_err());
        assert!(HostConfig::parse("[storage]\nexpiry_days = 1000000000000").is_err());
        assert!(HostConfig::parse("[storage]\nexpiry_days = -3").is_err());
        assert!(HostConfig::parse("[storage]\nexpiry_days = 36500\n[detection]\nwindow_minutes = 525600").is_ok());
    }

    #[test]
    fn environment_overrides_port_and_name() {
        let mut config = HostConfig::default();
        config.apply_vars(|key| match key {
            "PORT" => Some("9090".to_string()),
            "NAME" => Some("Cactus".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.name, "Cactus");

        let mut config = HostConfig::default();
        config.apply_vars(|key| match key {
            "PORT" => Some("not a port".to_string()),
            "NAME" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn horizons() {
        let config = HostConfig::default();
        assert_eq!(config.expiry_horizon(), chrono::Duration::days(30));
        assert_eq!(config.detection_window(), chrono::Duration::hours(1));
    }
}
