//! Utility functions and helper methods for the presence server.
//!
//! This module provides convenient factory functions for creating server
//! instances wired to the in-memory reference collaborators, for
//! development and tests.

use crate::config::ServerConfig;
use crate::external::{BoundedGrid, MemoryPositionStore, StaticProfiles};
use crate::server::SpaceServer;
use std::sync::Arc;

/// Creates a server with default configuration and in-memory collaborators.
///
/// The passability predicate is an open 100x100 grid; positions and
/// memberships live in process memory; every display name resolves to the
/// configured placeholder. Real deployments inject their own collaborators
/// through [`SpaceServer::new`].
pub fn create_server() -> SpaceServer {
    create_server_with_config(ServerConfig::default())
}

/// Creates a server with custom configuration and in-memory collaborators.
pub fn create_server_with_config(config: ServerConfig) -> SpaceServer {
    SpaceServer::new(
        config,
        Arc::new(BoundedGrid {
            width: 100,
            height: 100,
        }),
        Arc::new(MemoryPositionStore::new()),
        Arc::new(StaticProfiles::new()),
    )
}
