//! Broker configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file
//! - Environment variables (PULSE_BROKER_*), applied on top by [`BrokerConfig::load`]
//!
//! `Default`, `from_file` and `from_toml_str` never consult the environment.

use crate::topic::MAX_TOPIC_NAME_LENGTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Maximum number of topics.
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    /// Maximum subscribers registered under a single topic.
    #[serde(default = "default_max_subscribers_per_topic")]
    pub max_subscribers_per_topic: usize,

    /// Maximum topic name length in bytes.
    #[serde(default = "default_max_topic_length")]
    pub max_topic_length: usize,

    /// Default close timeout in milliseconds, used by `Broker::shutdown`.
    #[serde(default = "default_close_timeout")]
    pub close_timeout_ms: u64,
}

fn default_max_topics() -> usize {
    10_000
}

fn default_max_subscribers_per_topic() -> usize {
    10_000
}

fn default_max_topic_length() -> usize {
    MAX_TOPIC_NAME_LENGTH
}

fn default_close_timeout() -> u64 {
    5_000
}

fn override_from<T, F>(field: &mut T, key: &str, lookup: &F)
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    // Unparseable values are ignored.
    if let Some(value) = lookup(key).and_then(|v| v.parse().ok()) {
        *field = value;
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_topics: default_max_topics(),
            max_subscribers_per_topic: default_max_subscribers_per_topic(),
            max_topic_length: default_max_topic_length(),
            close_timeout_ms: default_close_timeout(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from the first config file found, or defaults,
    /// then apply `PULSE_BROKER_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_paths = [
            "pulse-broker.toml",
            "/etc/pulse/broker.toml",
            "~/.config/pulse/broker.toml",
        ];

        let mut config = Self::default();
        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                config = Self::from_file(expanded.as_ref())?;
                break;
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `PULSE_BROKER_*` keys resolved through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_from(&mut self.max_topics, "PULSE_BROKER_MAX_TOPICS", &lookup);
        override_from(
            &mut self.max_subscribers_per_topic,
            "PULSE_BROKER_MAX_SUBSCRIBERS_PER_TOPIC",
            &lookup,
        );
        override_from(
            &mut self.max_topic_length,
            "PULSE_BROKER_MAX_TOPIC_LENGTH",
            &lookup,
        );
        override_from(
            &mut self.close_timeout_ms,
            "PULSE_BROKER_CLOSE_TIMEOUT_MS",
            &lookup,
        );
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid configuration.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Default deadline for `Broker::shutdown`.
    #[must_use]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}
