//! Space membership tracker.
//!
//! Maintains, per space, the current set of occupant identifiers and the
//! in-memory position of every connected user. Join returns the occupant
//! snapshot the new arrival renders from and notifies existing occupants;
//! leave removes the occupant, clears the durable membership record, and
//! notifies the remainder. An identifier appears in at most one space's
//! set at a time (single live connection per identifier).

use crate::config::SpawnPoint;
use crate::connection::{ConnectionRegistry, Session};
use crate::external::{bounded, PositionStore};
use crate::ident::{SpaceId, UserId};
use crate::protocol::{OccupantInfo, ServerMessage};
use crate::space::Position;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct TrackerState {
    occupants: HashMap<SpaceId, HashSet<UserId>>,
    positions: HashMap<UserId, Position>,
}

/// Tracks space occupancy and in-memory positions.
pub struct SpaceTracker {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn PositionStore>,
    spawn: SpawnPoint,
    store_timeout: Duration,
    state: RwLock<TrackerState>,
}

impl SpaceTracker {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn PositionStore>,
        spawn: SpawnPoint,
        store_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            spawn,
            store_timeout,
            state: RwLock::new(TrackerState::default()),
        }
    }

    /// Records a join and returns the snapshot of the other occupants.
    ///
    /// Initializes the user's position to the spawn coordinate when absent,
    /// persists position and membership (bounded, tolerated on failure),
    /// and notifies every other occupant with `USER_JOINED`.
    pub async fn join(&self, session: &Session) -> Vec<OccupantInfo> {
        let now = Utc::now();
        let (snapshot, position) = {
            let mut state = self.state.write().await;
            state
                .occupants
                .entry(session.space_id.clone())
                .or_default()
                .insert(session.user_id.clone());

            let position = state
                .positions
                .entry(session.user_id.clone())
                .and_modify(|p| {
                    p.space_id = session.space_id.clone();
                    p.last_updated_at = now;
                })
                .or_insert_with(|| Position {
                    user_id: session.user_id.clone(),
                    x: self.spawn.x,
                    y: self.spawn.y,
                    space_id: session.space_id.clone(),
                    last_moved_at: now,
                    last_updated_at: now,
                })
                .clone();

            let mut snapshot = Vec::new();
            if let Some(occupants) = state.occupants.get(&session.space_id) {
                for occupant in occupants {
                    if occupant == &session.user_id {
                        continue;
                    }
                    let Some(pos) = state.positions.get(occupant) else {
                        continue;
                    };
                    // Only live occupants belong in the snapshot; a user
                    // mid-disconnect has no session anymore.
                    if let Some(other) = self.registry.lookup(occupant).await {
                        snapshot.push(OccupantInfo {
                            user_id: occupant.clone(),
                            x: pos.x,
                            y: pos.y,
                            display_name: other.display_name.clone(),
                        });
                    }
                }
            }
            (snapshot, position)
        };

        bounded(
            "create_membership",
            self.store_timeout,
            self.store
                .create_membership(&session.user_id, &session.space_id),
        )
        .await;
        bounded(
            "upsert_position",
            self.store_timeout,
            self.store.upsert_position(
                &session.user_id,
                position.x,
                position.y,
                &session.space_id,
                now,
            ),
        )
        .await;

        info!(
            "👋 User {} joined space {} ({} other occupant(s))",
            session.user_id,
            session.space_id,
            snapshot.len()
        );

        self.broadcast_to_space(
            &session.space_id,
            &session.user_id,
            ServerMessage::UserJoined {
                user_id: session.user_id.clone(),
                display_name: session.display_name.clone(),
                x: position.x,
                y: position.y,
            },
        )
        .await;

        snapshot
    }

    /// Removes an occupant and notifies the remaining occupants.
    ///
    /// Idempotent: a second leave for the same session is a no-op, so an
    /// evicted connection's late cleanup cannot double-announce.
    pub async fn leave(&self, session: &Session) {
        let was_present = {
            let mut state = self.state.write().await;
            let present = state
                .occupants
                .get_mut(&session.space_id)
                .map(|set| set.remove(&session.user_id))
                .unwrap_or(false);
            if let Some(set) = state.occupants.get(&session.space_id) {
                if set.is_empty() {
                    state.occupants.remove(&session.space_id);
                }
            }
            present
        };

        if !was_present {
            return;
        }

        bounded(
            "delete_membership",
            self.store_timeout,
            self.store
                .delete_membership(&session.user_id, &session.space_id),
        )
        .await;

        info!("👋 User {} left space {}", session.user_id, session.space_id);

        self.broadcast_to_space(
            &session.space_id,
            &session.user_id,
            ServerMessage::UserLeft {
                user_id: session.user_id.clone(),
            },
        )
        .await;
    }

    /// Current occupants of a space.
    pub async fn occupants_of(&self, space_id: &SpaceId) -> Vec<UserId> {
        self.state
            .read()
            .await
            .occupants
            .get(space_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Applies an accepted move to the in-memory position authority.
    ///
    /// Returns the updated record, or `None` if the user has no position
    /// (never joined). Last-applied-wins: arrival order at the server
    /// resolves racing moves from the same user.
    pub async fn apply_position(&self, user_id: &UserId, x: i32, y: i32) -> Option<Position> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let position = state.positions.get_mut(user_id)?;
        position.x = x;
        position.y = y;
        position.last_moved_at = now;
        position.last_updated_at = now;
        Some(position.clone())
    }

    /// Current in-memory position of a user, if any.
    pub async fn position_of(&self, user_id: &UserId) -> Option<Position> {
        self.state.read().await.positions.get(user_id).cloned()
    }

    /// Fans a message out to every occupant of a space except `except`.
    ///
    /// Delivery is per-handle best effort; a slow or vanished recipient
    /// never stalls the others.
    pub async fn broadcast_to_space(
        &self,
        space_id: &SpaceId,
        except: &UserId,
        message: ServerMessage,
    ) {
        let occupants = self.occupants_of(space_id).await;
        let mut delivered = 0usize;
        for occupant in &occupants {
            if occupant == except {
                continue;
            }
            if let Some(session) = self.registry.lookup(occupant).await {
                if session.handle.send(message.clone()) {
                    delivered += 1;
                }
            }
        }
        debug!(
            "📡 Broadcast to space {}: {} recipient(s)",
            space_id, delivered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::handle::{ConnectionHandle, Outbound};
    use crate::external::MemoryPositionStore;
    use tokio::sync::mpsc;

    const SPAWN: SpawnPoint = SpawnPoint { x: 5, y: 5 };

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        store: Arc<MemoryPositionStore>,
        tracker: SpaceTracker,
        next_connection: std::sync::atomic::AtomicUsize,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(ConnectionRegistry::new());
            let store = Arc::new(MemoryPositionStore::new());
            let tracker = SpaceTracker::new(
                registry.clone(),
                store.clone(),
                SPAWN,
                Duration::from_millis(100),
            );
            Self {
                registry,
                store,
                tracker,
                next_connection: std::sync::atomic::AtomicUsize::new(1),
            }
        }

        async fn connect(&self, user: &str, space: &str) -> (Session, mpsc::Receiver<Outbound>) {
            let id = self
                .next_connection
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let (handle, rx) = ConnectionHandle::new(id, 32);
            let session = Session {
                user_id: UserId::from(user),
                display_name: format!("name-{user}"),
                space_id: SpaceId::from(space),
                handle,
            };
            self.registry.admit(session.clone()).await;
            (session, rx)
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<ServerMessage> {
        let mut frames = Vec::new();
        while let Ok(out) = rx.try_recv() {
            if let Outbound::Frame(msg) = out {
                frames.push(msg);
            }
        }
        frames
    }

    #[tokio::test]
    async fn first_join_gets_empty_snapshot_and_spawn_position() {
        let h = Harness::new();
        let (a, _rx) = h.connect("a", "s1").await;

        let snapshot = h.tracker.join(&a).await;
        assert!(snapshot.is_empty());

        let pos = h.tracker.position_of(&a.user_id).await.expect("position");
        assert_eq!((pos.x, pos.y), (SPAWN.x, SPAWN.y));
        assert_eq!(
            h.store.membership_of(&a.user_id).await,
            Some(SpaceId::from("s1"))
        );
    }

    #[tokio::test]
    async fn second_join_sees_first_and_first_is_notified() {
        let h = Harness::new();
        let (a, mut a_rx) = h.connect("a", "s1").await;
        let (b, _b_rx) = h.connect("b", "s1").await;

        h.tracker.join(&a).await;
        h.tracker.apply_position(&a.user_id, 10, 12).await;
        let snapshot = h.tracker.join(&b).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].user_id, a.user_id);
        assert_eq!((snapshot[0].x, snapshot[0].y), (10, 12));
        assert_eq!(snapshot[0].display_name, "name-a");

        let frames = drain(&mut a_rx);
        assert!(frames.iter().any(|m| matches!(
            m,
            ServerMessage::UserJoined { user_id, x, y, .. }
                if *user_id == b.user_id && *x == SPAWN.x && *y == SPAWN.y
        )));
    }

    #[tokio::test]
    async fn occupants_in_other_spaces_are_invisible() {
        let h = Harness::new();
        let (a, mut a_rx) = h.connect("a", "s1").await;
        let (b, _b_rx) = h.connect("b", "s2").await;

        h.tracker.join(&a).await;
        let snapshot = h.tracker.join(&b).await;

        assert!(snapshot.is_empty());
        assert!(drain(&mut a_rx).is_empty());
    }

    #[tokio::test]
    async fn leave_notifies_remaining_and_clears_membership() {
        let h = Harness::new();
        let (a, _a_rx) = h.connect("a", "s1").await;
        let (b, mut b_rx) = h.connect("b", "s1").await;

        h.tracker.join(&a).await;
        h.tracker.join(&b).await;
        drain(&mut b_rx);

        h.tracker.leave(&a).await;

        let frames = drain(&mut b_rx);
        assert!(frames
            .iter()
            .any(|m| matches!(m, ServerMessage::UserLeft { user_id } if *user_id == a.user_id)));
        assert_eq!(h.store.membership_of(&a.user_id).await, None);
        assert_eq!(h.tracker.occupants_of(&a.space_id).await, vec![b.user_id]);

        // A second leave is silent.
        h.tracker.leave(&a).await;
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn apply_position_requires_a_joined_user() {
        let h = Harness::new();
        assert!(h
            .tracker
            .apply_position(&UserId::from("ghost"), 1, 1)
            .await
            .is_none());
    }
}
