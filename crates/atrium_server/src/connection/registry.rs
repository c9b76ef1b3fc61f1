//! Registry of live sessions, keyed by user identifier.
//!
//! The registry is the single source of truth mapping an identifier to its
//! active connection handle, used for unicast delivery as opposed to
//! space-scoped broadcast. It enforces at most one live session per
//! identifier: admitting an identifier that is already registered evicts
//! the previous connection and hands the evicted session back to the
//! caller so call and membership teardown can run for it.

use crate::connection::session::Session;
use crate::ident::{ConnectionId, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// Result of admitting a session into the registry.
#[derive(Debug)]
pub struct AdmitOutcome {
    /// The previous session for the same identifier, if one was evicted.
    /// Its handle has already been asked to close; the caller is
    /// responsible for tearing down its call state and membership.
    pub evicted: Option<Session>,
}

/// Thread-safe map of user identifier to live session.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a session, evicting any previous session for the same user.
    pub async fn admit(&self, session: Session) -> AdmitOutcome {
        let mut sessions = self.sessions.write().await;
        let evicted = sessions.insert(session.user_id.clone(), session);
        if let Some(old) = &evicted {
            info!(
                "Evicting connection {} of user {} in favor of a new connection",
                old.connection_id(),
                old.user_id
            );
            old.handle.close();
        }
        AdmitOutcome { evicted }
    }

    /// Returns the live session for a user, if any.
    pub async fn lookup(&self, user_id: &UserId) -> Option<Session> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// Returns whether the given connection is still the user's live one.
    pub async fn owns(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        self.sessions
            .read()
            .await
            .get(user_id)
            .map(|s| s.connection_id() == connection_id)
            .unwrap_or(false)
    }

    /// Removes the user's session if it still belongs to `connection_id`.
    ///
    /// The guard keeps an evicted connection's late cleanup from removing
    /// the session of the connection that replaced it.
    pub async fn remove_if(
        &self,
        user_id: &UserId,
        connection_id: ConnectionId,
    ) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(user_id)
            .map(|s| s.connection_id() == connection_id)
            .unwrap_or(false)
        {
            sessions.remove(user_id)
        } else {
            None
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
