//! Live session representation.
//!
//! A session is the authenticated binding between one user identifier and
//! one open connection. It is created after successful credential
//! verification, stored in the registry, and destroyed on disconnect or
//! eviction. Sessions are immutable values: a reconnect produces a new
//! session rather than mutating the old one.

use crate::connection::handle::ConnectionHandle;
use crate::ident::{ConnectionId, SpaceId, UserId};

/// The live, authenticated binding between a user and a connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// Verified identifier of the connected user
    pub user_id: UserId,

    /// Display name resolved at join time (placeholder on lookup failure)
    pub display_name: String,

    /// The space this session joined at handshake time
    pub space_id: SpaceId,

    /// Outbound delivery handle for this connection
    pub handle: ConnectionHandle,
}

impl Session {
    /// The process-local identifier of the underlying connection.
    pub fn connection_id(&self) -> ConnectionId {
        self.handle.connection_id()
    }
}
