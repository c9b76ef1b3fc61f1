//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the presence server behavior.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the presence server.
///
/// Contains all necessary parameters to configure server behavior including
/// network settings, credential verification, spawn coordinates, message
/// limits, and collaborator timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Fixed endpoint path clients connect to (e.g. "/ws")
    pub endpoint_path: String,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Credential verification settings
    pub auth: AuthConfig,

    /// Default spawn coordinate assigned on first join
    pub spawn: SpawnPoint,

    /// Placeholder display name used when the profile lookup fails
    pub placeholder_name: String,

    /// Message size and buffering limits
    pub limits: LimitsConfig,

    /// Bounded timeouts for external collaborator calls
    pub timeouts: TimeoutConfig,
}

/// Credential verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret used to verify connection credentials
    pub secret: String,
}

/// Default spawn coordinate for users joining a space for the first time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Spawn X coordinate
    pub x: i32,
    /// Spawn Y coordinate
    pub y: i32,
}

/// Message size and per-connection buffering limits.
///
/// A connection whose outbound buffer stays full is treated as an
/// imminent disconnect: frames to it are dropped rather than letting a
/// slow consumer stall delivery to other occupants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound message size in bytes; larger frames are ignored
    pub max_message_size: usize,

    /// Capacity of each connection's outbound frame queue
    pub send_buffer: usize,
}

/// Bounded timeouts for external collaborator calls.
///
/// The in-memory state is broadcast authority: a store write or profile
/// lookup that exceeds its bound is logged and abandoned, never awaited
/// past these limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for position store writes, in milliseconds
    pub store_ms: u64,

    /// Timeout for display name lookups, in milliseconds
    pub profile_ms: u64,
}

impl TimeoutConfig {
    /// Store write timeout as a [`Duration`].
    pub fn store(&self) -> Duration {
        Duration::from_millis(self.store_ms)
    }

    /// Profile lookup timeout as a [`Duration`].
    pub fn profile(&self) -> Duration {
        Duration::from_millis(self.profile_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            endpoint_path: "/ws".to_string(),
            max_connections: 1000,
            auth: AuthConfig {
                secret: "atrium-dev-secret".to_string(),
            },
            spawn: SpawnPoint { x: 0, y: 0 },
            placeholder_name: "Guest".to_string(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64KB
            send_buffer: 256,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_ms: 500,
            profile_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.endpoint_path, "/ws");
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.spawn.x, 0);
        assert_eq!(config.spawn.y, 0);
        assert_eq!(config.placeholder_name, "Guest");
        assert_eq!(config.limits.max_message_size, 64 * 1024);
        assert_eq!(config.limits.send_buffer, 256);
        assert_eq!(config.timeouts.store(), Duration::from_millis(500));
        assert_eq!(config.timeouts.profile(), Duration::from_millis(500));
    }

    #[test]
    fn test_server_config_custom_values() {
        let config = ServerConfig {
            bind_address: "0.0.0.0:3000".parse().unwrap(),
            endpoint_path: "/session".to_string(),
            max_connections: 5000,
            spawn: SpawnPoint { x: 12, y: 7 },
            ..Default::default()
        };

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.endpoint_path, "/session");
        assert_eq!(config.max_connections, 5000);
        assert_eq!(config.spawn.x, 12);
        assert_eq!(config.spawn.y, 7);
    }
}
