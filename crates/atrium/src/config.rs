//! Configuration management for the Atrium server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use atrium_server::config::{AuthConfig, LimitsConfig, ServerConfig, SpawnPoint, TimeoutConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

fn default_endpoint_path() -> String {
    "/ws".to_string()
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_send_buffer() -> usize {
    256
}

fn default_store_ms() -> u64 {
    500
}

fn default_profile_ms() -> u64 {
    500
}

fn default_placeholder_name() -> String {
    "Guest".to_string()
}

/// Application configuration loaded from a TOML file.
///
/// This is the main configuration structure that encompasses all server
/// settings including networking, credentials, the space grid, logging,
/// and the published client reconnect contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Credential verification settings
    pub auth: AuthSettings,
    /// Space grid and spawn settings
    pub space: SpaceSettings,
    /// Message size and buffering limits
    #[serde(default)]
    pub limits: LimitsSettings,
    /// Bounded timeouts for external collaborator calls
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
    /// Client reconnect contract (published, not enforced server-side)
    #[serde(default)]
    pub reconnect: ReconnectSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Fixed WebSocket endpoint path
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Credential verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Shared secret used to verify connection credentials
    pub secret: String,
}

/// Space grid and spawn configuration.
///
/// The grid here feeds the reference passability predicate (every
/// in-bounds cell is walkable). Deployments with real map geometry swap
/// the predicate in code; these bounds still cap the coordinate plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceSettings {
    /// Grid width in cells
    pub width: i32,
    /// Grid height in cells
    pub height: i32,
    /// Default spawn X coordinate for first joins
    pub spawn_x: i32,
    /// Default spawn Y coordinate for first joins
    pub spawn_y: i32,
    /// Display name used when the profile lookup fails
    #[serde(default = "default_placeholder_name")]
    pub placeholder_name: String,
}

/// Message size and buffering limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Maximum inbound message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Capacity of each connection's outbound frame queue
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
}

/// Bounded timeouts for external collaborator calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Timeout for position store writes, in milliseconds
    #[serde(default = "default_store_ms")]
    pub store_ms: u64,
    /// Timeout for display name lookups, in milliseconds
    #[serde(default = "default_profile_ms")]
    pub profile_ms: u64,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

/// Client reconnect contract.
///
/// Reconnect-with-backoff is a client concern; the server publishes the
/// contract here so client implementations share one source of truth
/// instead of inlining constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Maximum reconnect attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on the delay between attempts, in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_factor: f64,
}

impl Default for LimitsSettings {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            send_buffer: default_send_buffer(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            store_ms: default_store_ms(),
            profile_ms: default_profile_ms(),
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay_ms: 250,
            max_delay_ms: 8000,
            backoff_factor: 2.0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                endpoint_path: default_endpoint_path(),
                max_connections: default_max_connections(),
            },
            auth: AuthSettings {
                secret: "atrium-dev-secret".to_string(),
            },
            space: SpaceSettings {
                width: 100,
                height: 100,
                spawn_x: 0,
                spawn_y: 0,
                placeholder_name: default_placeholder_name(),
            },
            limits: LimitsSettings::default(),
            timeouts: TimeoutSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    pub async fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a core server configuration.
    pub fn to_server_config(&self) -> anyhow::Result<ServerConfig> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            endpoint_path: self.server.endpoint_path.clone(),
            max_connections: self.server.max_connections,
            auth: AuthConfig {
                secret: self.auth.secret.clone(),
            },
            spawn: SpawnPoint {
                x: self.space.spawn_x,
                y: self.space.spawn_y,
            },
            placeholder_name: self.space.placeholder_name.clone(),
            limits: LimitsConfig {
                max_message_size: self.limits.max_message_size,
                send_buffer: self.limits.send_buffer,
            },
            timeouts: TimeoutConfig {
                store_ms: self.timeouts.store_ms,
                profile_ms: self.timeouts.profile_ms,
            },
        })
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if !self.server.endpoint_path.starts_with('/') {
            return Err(format!(
                "Endpoint path must start with '/': {}",
                &self.server.endpoint_path
            ));
        }

        if self.auth.secret.is_empty() {
            return Err("Auth secret cannot be empty".to_string());
        }

        if self.space.width <= 0 || self.space.height <= 0 {
            return Err("Space dimensions must be positive".to_string());
        }

        if self.space.spawn_x < 0
            || self.space.spawn_x >= self.space.width
            || self.space.spawn_y < 0
            || self.space.spawn_y >= self.space.height
        {
            return Err(format!(
                "Spawn point ({}, {}) lies outside the {}x{} grid",
                self.space.spawn_x, self.space.spawn_y, self.space.width, self.space.height
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        if self.reconnect.backoff_factor < 1.0 {
            return Err("Reconnect backoff factor must be at least 1.0".to_string());
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err("Reconnect initial delay must not exceed the max delay".to_string());
        }

        Ok(())
    }
}
