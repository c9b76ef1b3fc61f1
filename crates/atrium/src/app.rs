//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that orchestrates server
//! startup, the signal-driven shutdown sequence, and final cleanup.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals::setup_signal_handlers};
use atrium_server::external::{BoundedGrid, MemoryPositionStore, StaticProfiles};
use atrium_server::{ShutdownState, SpaceServer};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main application struct.
///
/// Manages the complete lifecycle of the Atrium server: configuration
/// loading and validation, collaborator wiring, server startup, and
/// graceful shutdown handling.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Presence server instance
    server: SpaceServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// wires the server to the reference collaborators: a bounded-grid
    /// passability predicate, an in-memory position store, and an empty
    /// profile directory (every name resolves to the placeholder).
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }
        if let Some(secret) = args.secret {
            config.auth.secret = secret;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            anyhow::bail!("Configuration validation failed: {e}");
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = SpaceServer::new(
            server_config,
            Arc::new(BoundedGrid {
                width: config.space.width,
                height: config.space.height,
            }),
            Arc::new(MemoryPositionStore::new()),
            Arc::new(StaticProfiles::new()),
        );

        info!(
            "📂 Config: {} | Space: {}x{} | Spawn: ({}, {})",
            args.config_path.display(),
            config.space.width,
            config.space.height,
            config.space.spawn_x,
            config.space.spawn_y
        );

        Ok(Self { config, server })
    }

    /// Runs the application until a shutdown signal arrives.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("🌟 Starting Atrium Server");
        self.log_configuration_summary();

        let registry = self.server.registry();

        // Create shutdown state for coordinated shutdown
        let shutdown_state = ShutdownState::new();
        let shutdown_state_for_server = shutdown_state.clone();

        // Start server in background
        let server = self.server.clone();
        let server_handle = tokio::spawn(async move {
            match server.start_with_shutdown_state(shutdown_state_for_server).await {
                Ok(()) => info!("✅ Server completed successfully"),
                Err(e) => {
                    error!("❌ Server error: {:?}", e);
                    std::process::exit(1);
                }
            }
        });

        info!("✅ Atrium Server is now running!");
        info!(
            "🌐 Ready to accept connections on ws://{}{}",
            self.config.server.bind_address, self.config.server.endpoint_path
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        // Wait for shutdown signal
        let signal_shutdown_state = setup_signal_handlers().await?;
        if signal_shutdown_state.is_shutdown_initiated() {
            shutdown_state.initiate_shutdown();
        }

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");

        // Stop the accept loop, then give in-flight connection cleanup a
        // moment to drive call teardown and leave notifications.
        self.server.shutdown();
        if tokio::time::timeout(tokio::time::Duration::from_secs(8), server_handle)
            .await
            .is_err()
        {
            warn!("⏰ Server task did not complete within timeout, proceeding with cleanup");
        } else {
            info!("✅ Server task completed gracefully");
        }

        shutdown_state.complete_shutdown();

        let remaining = registry.len().await;
        info!("📊 Final Statistics:");
        info!("  - Sessions still registered: {}", remaining);

        info!("✅ Atrium Server shutdown complete");
        info!("👋 Thank you for using Atrium!");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  🚪 Endpoint path: {}", self.config.server.endpoint_path);
        info!(
            "  🗺️ Space grid: {}x{} cells",
            self.config.space.width, self.config.space.height
        );
        info!(
            "  👥 Max connections: {}",
            self.config.server.max_connections
        );
        info!(
            "  🔁 Reconnect contract: {} attempts, {}ms..{}ms x{}",
            self.config.reconnect.max_attempts,
            self.config.reconnect.initial_delay_ms,
            self.config.reconnect.max_delay_ms,
            self.config.reconnect.backoff_factor
        );
    }
}
