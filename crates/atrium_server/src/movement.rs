//! Movement validation and fan-out.
//!
//! A move is accepted only if the externally supplied passability predicate
//! allows the target cell. Accepted moves update the in-memory position,
//! write through to the position store under a bounded timeout, and are
//! broadcast to every other occupant of the mover's space. Rejected moves
//! are silently dropped: no state change, no broadcast, and no reply — the
//! client resends on its own cadence.

use crate::connection::Session;
use crate::external::{bounded, Passability, PositionStore};
use crate::protocol::ServerMessage;
use crate::space::SpaceTracker;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    Rejected,
}

/// Validates, applies, persists, and broadcasts move requests.
pub struct MovementBroadcaster {
    tracker: Arc<SpaceTracker>,
    passability: Arc<dyn Passability>,
    store: Arc<dyn PositionStore>,
    store_timeout: Duration,
}

impl MovementBroadcaster {
    pub fn new(
        tracker: Arc<SpaceTracker>,
        passability: Arc<dyn Passability>,
        store: Arc<dyn PositionStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            tracker,
            passability,
            store,
            store_timeout,
        }
    }

    /// Applies a move request for the session's user.
    ///
    /// Broadcast order follows validation order on this session; no global
    /// ordering across sessions is guaranteed, since position is
    /// idempotently overwritten per user.
    pub async fn apply_move(&self, session: &Session, x: i32, y: i32) -> MoveOutcome {
        if !self.passability.is_passable(x, y) {
            debug!(
                "Move to ({x}, {y}) by {} rejected by passability predicate",
                session.user_id
            );
            return MoveOutcome::Rejected;
        }

        let Some(position) = self.tracker.apply_position(&session.user_id, x, y).await else {
            debug!(
                "Move by {} ignored: no position record (not joined)",
                session.user_id
            );
            return MoveOutcome::Rejected;
        };

        // Write-through is best effort; the in-memory value just applied is
        // the broadcast authority.
        bounded(
            "upsert_position",
            self.store_timeout,
            self.store.upsert_position(
                &session.user_id,
                position.x,
                position.y,
                &session.space_id,
                position.last_moved_at,
            ),
        )
        .await;

        self.tracker
            .broadcast_to_space(
                &session.space_id,
                &session.user_id,
                ServerMessage::PositionUpdate {
                    user_id: session.user_id.clone(),
                    display_name: session.display_name.clone(),
                    x: position.x,
                    y: position.y,
                    space_id: session.space_id.clone(),
                },
            )
            .await;

        MoveOutcome::Accepted
    }
}
