//! Identifier types shared across the server.
//!
//! User and space identifiers are opaque strings minted outside this core
//! (user ids come from the verified credential, space ids from the client
//! handshake). Connection ids are process-local and only distinguish one
//! physical connection from its successor for the same user.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type alias for connection identifiers.
///
/// Connection IDs are used to tell a live connection apart from a stale
/// one that belonged to the same user before a reconnect.
pub type ConnectionId = usize;

/// Stable identifier of an authenticated user.
///
/// This is the sole party key used by the registry, the membership tracker,
/// and the signaling relay. It is produced exactly once per connection by
/// credential verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a space (a shared coordinate plane).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(pub String);

impl SpaceId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpaceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
