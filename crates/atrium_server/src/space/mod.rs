//! Space membership and presence state.
//!
//! A space is a named room grouping concurrently connected occupants on one
//! coordinate plane. This module tracks which users occupy which space and
//! holds the in-memory position authority that broadcasts are built from.

pub mod tracker;

pub use tracker::SpaceTracker;

use crate::ident::{SpaceId, UserId};
use chrono::{DateTime, Utc};

/// In-memory position record for a user.
///
/// One logical record per user: the position is global, while the current
/// space is tracked separately by the membership sets. The durable copy
/// lives in the external position store; this value is the broadcast
/// authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub user_id: UserId,
    pub x: i32,
    pub y: i32,
    /// Space the position was last updated in
    pub space_id: SpaceId,
    /// Last accepted move
    pub last_moved_at: DateTime<Utc>,
    /// Last mutation of any kind (move or join refresh)
    pub last_updated_at: DateTime<Utc>,
}
