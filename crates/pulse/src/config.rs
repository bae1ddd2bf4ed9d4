//! Configuration file handling for the Pulse server.
//!
//! Loads [`AppConfig`] from TOML and turns it into the library's
//! [`NetworkConfig`].

use anyhow::{bail, Context, Result};
use pulse_network::{NetworkConfig, DEFAULT_TICKS_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

fn default_ticks_per_second() -> u32 {
    DEFAULT_TICKS_PER_SECOND
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_frame_length() -> usize {
    32 * 1024
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network settings
    pub server: ServerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Network listener and tick settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host name or IP address to listen on
    pub address: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Network ticks per second
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: u32,
    /// Read frames without waiting for the tick
    #[serde(default)]
    pub auto_read: bool,
    /// Longest accepted inbound line, in bytes
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,
    /// Per-channel queue capacity; unbounded when absent
    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                address: "127.0.0.1".to_string(),
                port: 25565,
                max_connections: default_max_connections(),
                ticks_per_second: default_ticks_per_second(),
                auto_read: false,
                max_frame_length: default_max_frame_length(),
                queue_capacity: None,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration is written to
    /// `path` and returned.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The configuration and whether the file had to be created. Loading
    /// happens before logging is set up, so reporting is left to the caller.
    pub async fn load_from_file(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok((config, false))
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok((default_config, true))
        }
    }

    /// Resolves the listen address. Host names are looked up and the first
    /// address returned is used.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let host = self.server.address.as_str();
        (host, self.server.port)
            .to_socket_addrs()
            .with_context(|| format!("invalid listen address: {}", host))?
            .next()
            .with_context(|| format!("listen address {} did not resolve", host))
    }

    /// Converts the file configuration into a [`NetworkConfig`].
    pub fn to_network_config(&self) -> Result<NetworkConfig> {
        Ok(NetworkConfig {
            bind_address: self.bind_address()?,
            ticks_per_second: self.server.ticks_per_second,
            max_connections: self.server.max_connections,
            auto_read: self.server.auto_read,
            max_frame_length: self.server.max_frame_length,
            queue_capacity: self.server.queue_capacity,
            ..NetworkConfig::default()
        })
    }

    /// Checks the configuration for values the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            );
        }

        self.to_network_config()?.validate()?;
        Ok(())
    }
}
