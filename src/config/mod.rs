//! Application configuration.
//!
//! Aggregates listener, routing and logging settings into a single
//! [`BrokerConfig`] that can be loaded from YAML files or environment
//! variables.

mod logging;
mod server;

pub use logging::{LogFormat, LogOutput, LoggingConfig};
pub use server::{ServerConfig, DEFAULT_EVENT_SOURCE_PORT, DEFAULT_SUBSCRIBER_PORT};

use serde::Deserialize;

use crate::error::Result;
use crate::routing::RoutingConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "broker.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "BROKER_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "BROKER";
/// Environment variable overriding the configured log filter.
pub const LOG_ENV_VAR: &str = "BROKER_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub server: ServerConfig,
    pub routing: RoutingConfig,
    pub logging: LoggingConfig,
}

impl BrokerConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `broker.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `BROKER_CONFIG` (if set)
    /// 4. Environment variables prefixed `BROKER__`, e.g. `BROKER__SERVER__SUBSCRIBER_PORT`
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Loopback listeners on ephemeral ports with default routing.
    pub fn for_test() -> Self {
        Self {
            server: ServerConfig::ephemeral(),
            ..Self::default()
        }
    }
}
