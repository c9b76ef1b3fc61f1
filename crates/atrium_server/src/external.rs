//! Seams for the external collaborators the core consumes.
//!
//! The core validates moves, persists positions, and resolves display names
//! through these traits but owns none of their semantics: walkability is a
//! pure predicate supplied from outside, and the store's durability
//! guarantees are the store's business. In-memory reference implementations
//! are provided for default wiring and tests.

use crate::ident::{SpaceId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Pure walkability predicate over the shared coordinate plane.
pub trait Passability: Send + Sync {
    /// Returns whether `(x, y)` may be occupied.
    fn is_passable(&self, x: i32, y: i32) -> bool;
}

impl<F> Passability for F
where
    F: Fn(i32, i32) -> bool + Send + Sync,
{
    fn is_passable(&self, x: i32, y: i32) -> bool {
        self(x, y)
    }
}

/// Rectangular grid where every in-bounds cell is passable.
///
/// Reference implementation used by the default wiring; real deployments
/// supply the product's grid geometry instead.
#[derive(Debug, Clone, Copy)]
pub struct BoundedGrid {
    pub width: i32,
    pub height: i32,
}

impl Passability for BoundedGrid {
    fn is_passable(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }
}

/// Durable store for last-known positions and space membership records.
///
/// All methods are fallible and are invoked by the core under a bounded
/// timeout; a failed or slow write is logged and tolerated, never blocking
/// a broadcast.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Creates or updates the user's position record.
    async fn upsert_position(
        &self,
        user_id: &UserId,
        x: i32,
        y: i32,
        space_id: &SpaceId,
        now: DateTime<Utc>,
    ) -> Result<(), String>;

    /// Records that the user currently occupies the space.
    async fn create_membership(&self, user_id: &UserId, space_id: &SpaceId)
        -> Result<(), String>;

    /// Removes the user's membership record for the space.
    async fn delete_membership(&self, user_id: &UserId, space_id: &SpaceId)
        -> Result<(), String>;
}

/// Profile service that resolves display names.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Returns the display name for the user, or `None` if unknown.
    async fn lookup_display_name(&self, user_id: &UserId) -> Option<String>;
}

/// Runs a fallible collaborator call under a bounded timeout.
///
/// The in-memory state is broadcast authority, so a slow or failing
/// external call is logged and abandoned rather than awaited.
pub(crate) async fn bounded<F>(label: &'static str, limit: std::time::Duration, op: F)
where
    F: std::future::Future<Output = Result<(), String>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Store call '{label}' failed: {e}"),
        Err(_) => tracing::warn!("Store call '{label}' timed out after {limit:?}"),
    }
}

/// Position record as kept by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPosition {
    pub x: i32,
    pub y: i32,
    pub space_id: SpaceId,
    pub updated_at: DateTime<Utc>,
}

/// In-memory [`PositionStore`] used by the default wiring and tests.
#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    positions: RwLock<HashMap<UserId, StoredPosition>>,
    memberships: RwLock<HashMap<UserId, SpaceId>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored position record for a user, if any.
    pub async fn position_of(&self, user_id: &UserId) -> Option<StoredPosition> {
        self.positions.read().await.get(user_id).cloned()
    }

    /// Returns the recorded space membership for a user, if any.
    pub async fn membership_of(&self, user_id: &UserId) -> Option<SpaceId> {
        self.memberships.read().await.get(user_id).cloned()
    }
}

#[async_trait]
impl PositionStore for MemoryPositionStore {
    async fn upsert_position(
        &self,
        user_id: &UserId,
        x: i32,
        y: i32,
        space_id: &SpaceId,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let mut positions = self.positions.write().await;
        positions.insert(
            user_id.clone(),
            StoredPosition {
                x,
                y,
                space_id: space_id.clone(),
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn create_membership(
        &self,
        user_id: &UserId,
        space_id: &SpaceId,
    ) -> Result<(), String> {
        let mut memberships = self.memberships.write().await;
        memberships.insert(user_id.clone(), space_id.clone());
        Ok(())
    }

    async fn delete_membership(
        &self,
        user_id: &UserId,
        space_id: &SpaceId,
    ) -> Result<(), String> {
        let mut memberships = self.memberships.write().await;
        if memberships.get(user_id) == Some(space_id) {
            memberships.remove(user_id);
        }
        Ok(())
    }
}

/// Fixed-map [`ProfileDirectory`] used by the default wiring and tests.
///
/// Users absent from the map resolve to `None`, which the tracker turns
/// into the configured placeholder name.
#[derive(Debug, Default)]
pub struct StaticProfiles {
    names: HashMap<UserId, String>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from `(user id, display name)` pairs.
    pub fn with<I, U, N>(entries: I) -> Self
    where
        I: IntoIterator<Item = (U, N)>,
        U: Into<String>,
        N: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(user, name)| (UserId(user.into()), name.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl ProfileDirectory for StaticProfiles {
    async fn lookup_display_name(&self, user_id: &UserId) -> Option<String> {
        self.names.get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_grid_rejects_out_of_bounds() {
        let grid = BoundedGrid {
            width: 100,
            height: 50,
        };
        assert!(grid.is_passable(0, 0));
        assert!(grid.is_passable(99, 49));
        assert!(!grid.is_passable(-1, 0));
        assert!(!grid.is_passable(100, 0));
        assert!(!grid.is_passable(0, 50));
    }

    #[tokio::test]
    async fn memory_store_upsert_overwrites() {
        let store = MemoryPositionStore::new();
        let user = UserId::from("u1");
        let space = SpaceId::from("s1");
        let now = Utc::now();

        store
            .upsert_position(&user, 1, 2, &space, now)
            .await
            .expect("upsert");
        store
            .upsert_position(&user, 3, 4, &space, now)
            .await
            .expect("upsert");

        let stored = store.position_of(&user).await.expect("present");
        assert_eq!((stored.x, stored.y), (3, 4));
    }

    #[tokio::test]
    async fn membership_delete_ignores_other_spaces() {
        let store = MemoryPositionStore::new();
        let user = UserId::from("u1");

        store
            .create_membership(&user, &SpaceId::from("s1"))
            .await
            .expect("create");
        store
            .delete_membership(&user, &SpaceId::from("s2"))
            .await
            .expect("delete");
        assert_eq!(store.membership_of(&user).await, Some(SpaceId::from("s1")));

        store
            .delete_membership(&user, &SpaceId::from("s1"))
            .await
            .expect("delete");
        assert_eq!(store.membership_of(&user).await, None);
    }
}
