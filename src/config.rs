//! Client configuration
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (evolution.toml)
//! - Environment variables (EVOLUTION__*)
//!
//! ## Example config file (evolution.toml):
//! ```toml
//! [registry]
//! compatibility = "BACKWARD"
//! subject_strategy = "topic_name"
//! auto_register = true
//!
//! [consumer]
//! poll_timeout_ms = 100
//! auto_offset_reset = "earliest"
//!
//! [transport]
//! max_batch = 500
//!
//! [container]
//! records_per_block = 100
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::compatibility::CompatibilityLevel;
use crate::registry::SubjectNameStrategy;
use crate::transport::OffsetReset;

/// Configuration shared by senders, receivers and container writers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub consumer: ConsumerConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub container: ContainerConfig,
}

/// Registry interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Level for subjects without their own setting
    #[serde(default)]
    pub compatibility: CompatibilityLevel,

    #[serde(default)]
    pub subject_strategy: SubjectNameStrategy,

    /// Register unknown schemas on send; otherwise they must already be registered
    #[serde(default = "default_true")]
    pub auto_register: bool,
}

/// Receiver polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Longest a single receive waits for payloads
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    #[serde(default)]
    pub auto_offset_reset: OffsetReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Most payloads returned by one poll
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_records_per_block")]
    pub records_per_block: usize,
}

fn default_true() -> bool {
    true
}

fn default_poll_timeout_ms() -> u64 {
    100
}

fn default_max_batch() -> usize {
    500
}

fn default_records_per_block() -> usize {
    100
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            compatibility: CompatibilityLevel::default(),
            subject_strategy: SubjectNameStrategy::default(),
            auto_register: true,
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            auto_offset_reset: OffsetReset::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_batch: default_max_batch(),
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            records_per_block: default_records_per_block(),
        }
    }
}

impl ConsumerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl ClientConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["evolution.toml", ".evolution.toml", "config/evolution.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "schema-evolution", "evolution") {
            let xdg_config = dirs.config_dir().join("evolution.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // EVOLUTION__CONSUMER__POLL_TIMEOUT_MS=250
        builder = builder.add_source(
            Environment::with_prefix("EVOLUTION")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.registry.compatibility, CompatibilityLevel::Backward);
        assert_eq!(config.registry.subject_strategy, SubjectNameStrategy::TopicName);
        assert!(config.registry.auto_register);
        assert_eq!(config.consumer.poll_timeout(), Duration::from_millis(100));
        assert_eq!(config.consumer.auto_offset_reset, OffsetReset::Earliest);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");

        let mut config = ClientConfig::default();
        config.registry.compatibility = CompatibilityLevel::FullTransitive;
        config.registry.subject_strategy = SubjectNameStrategy::RecordName;
        config.transport.max_batch = 7;
        config.save(path.to_str().unwrap()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[registry]"));
        assert!(text.contains("FULL_TRANSITIVE"));

        let loaded = ClientConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.registry.compatibility, CompatibilityLevel::FullTransitive);
        assert_eq!(loaded.registry.subject_strategy, SubjectNameStrategy::RecordName);
        assert_eq!(loaded.transport.max_batch, 7);
        assert_eq!(loaded.container.records_per_block, 100);
    }
}
