//! Core presence server implementation.
//!
//! `SpaceServer` wires the connection registry, membership tracker,
//! movement broadcaster, and call signaling relay together around a single
//! accept loop. The external collaborators — passability predicate,
//! position store, profile directory — are injected at construction and
//! never implemented here.

use crate::auth::{IdentityVerifier, TokenVerifier};
use crate::config::ServerConfig;
use crate::connection::ConnectionRegistry;
use crate::error::ServerError;
use crate::external::{Passability, PositionStore, ProfileDirectory};
use crate::movement::MovementBroadcaster;
use crate::server::handlers::handle_connection;
use crate::shutdown::ShutdownState;
use crate::signaling::CallRelay;
use crate::space::SpaceTracker;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// The core presence and signaling server.
///
/// Cheap to clone: every component is reference counted, and each accepted
/// connection gets its own clone.
#[derive(Clone)]
pub struct SpaceServer {
    /// Server configuration settings
    pub(crate) config: Arc<ServerConfig>,

    /// Live sessions keyed by user identifier
    pub(crate) registry: Arc<ConnectionRegistry>,

    /// Space occupancy and in-memory position authority
    pub(crate) tracker: Arc<SpaceTracker>,

    /// Move validation and fan-out
    pub(crate) movement: Arc<MovementBroadcaster>,

    /// Call signaling relay
    pub(crate) relay: Arc<CallRelay>,

    /// Credential verifier for the connection handshake
    pub(crate) verifier: Arc<dyn IdentityVerifier>,

    /// External profile service for display names
    pub(crate) profiles: Arc<dyn ProfileDirectory>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl SpaceServer {
    /// Creates a new server with the specified configuration and external
    /// collaborators.
    pub fn new(
        config: ServerConfig,
        passability: Arc<dyn Passability>,
        store: Arc<dyn PositionStore>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        let verifier = Arc::new(TokenVerifier::new(&config.auth.secret));
        let registry = Arc::new(ConnectionRegistry::new());
        let tracker = Arc::new(SpaceTracker::new(
            registry.clone(),
            store.clone(),
            config.spawn,
            config.timeouts.store(),
        ));
        let movement = Arc::new(MovementBroadcaster::new(
            tracker.clone(),
            passability,
            store,
            config.timeouts.store(),
        ));
        let relay = Arc::new(CallRelay::new(registry.clone()));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config: Arc::new(config),
            registry,
            tracker,
            movement,
            relay,
            verifier,
            profiles,
            shutdown_sender,
        }
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.start_internal(None).await
    }

    /// Binds the configured address and serves until the shared shutdown
    /// state is initiated (or an internal shutdown signal arrives).
    pub async fn start_with_shutdown_state(
        &self,
        shutdown_state: ShutdownState,
    ) -> Result<(), ServerError> {
        self.start_internal(Some(shutdown_state)).await
    }

    async fn start_internal(&self, shutdown_state: Option<ShutdownState>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
        self.serve(listener, shutdown_state).await
    }

    /// Runs the accept loop on an already-bound listener.
    ///
    /// Exposed separately so tests (and embedders) can bind an ephemeral
    /// port themselves.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown_state: Option<ShutdownState>,
    ) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("No local address: {e}")))?;
        info!(
            "🚀 Atrium server listening on ws://{}{}",
            local_addr, self.config.endpoint_path
        );

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            if let Some(state) = &shutdown_state {
                if state.is_shutdown_initiated() {
                    info!("🛑 Accept loop stopping - shutdown initiated");
                    break;
                }
            }

            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let server = self.clone();
                            tokio::spawn(async move {
                                match handle_connection(stream, addr, server).await {
                                    Ok(()) => {}
                                    Err(ServerError::Authentication(reason)) => {
                                        warn!("Connection from {addr} rejected: {reason}");
                                    }
                                    Err(e) => {
                                        error!("Connection error from {addr}: {e:?}");
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {e}");
                            break;
                        }
                    }
                }
                _ = shutdown_receiver.recv() => {
                    info!("Internal shutdown signal received");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
    }

    /// The active configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The connection registry (live sessions).
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// The space membership tracker.
    pub fn tracker(&self) -> Arc<SpaceTracker> {
        self.tracker.clone()
    }

    /// The call signaling relay.
    pub fn relay(&self) -> Arc<CallRelay> {
        self.relay.clone()
    }
}
