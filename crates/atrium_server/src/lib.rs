//! # Atrium Server - Real-Time Presence and Call Signaling
//!
//! A server core that lets authenticated participants occupy shared 2D
//! spaces, see each other move in near real time, and establish direct
//! peer-to-peer calls by exchanging negotiation messages through the
//! server. This crate contains only the real-time core — sessions,
//! presence broadcast, and signaling relay; account management, space
//! CRUD, profile data, and walkability rules are external collaborators
//! reached through trait seams.
//!
//! ## Architecture Overview
//!
//! * **Identity Verifier** - validates the handshake credential and yields
//!   the user identifier every other component keys on
//! * **Connection Registry** - maps each identifier to its single live
//!   connection handle, used for unicast delivery
//! * **Space Membership Tracker** - per-space occupant sets, join
//!   snapshots, and the in-memory position authority
//! * **Movement Broadcaster** - validates moves against the external
//!   passability predicate and fans accepted updates out
//! * **Call Signaling Relay** - forwards offer/answer/candidate/end
//!   between pairs of users, detecting busy and stale messages
//!
//! ## Message Flow
//!
//! 1. Client opens a WebSocket to the fixed endpoint path, carrying its
//!    credential and target space as query parameters
//! 2. The credential is verified; failure closes the connection with no
//!    state created
//! 3. The session is admitted (evicting any previous connection for the
//!    same user) and joins its space, receiving the occupant snapshot
//! 4. Each inbound frame is routed to the movement broadcaster or the
//!    signaling relay by message kind
//! 5. Disconnect runs one cleanup pass: call teardown, membership
//!    removal, registry removal
//!
//! ## Thread Safety
//!
//! All shared state lives behind async-aware locks: the registry and
//! tracker use `RwLock<HashMap>`, the relay keeps its call table and
//! per-user index under one `Mutex` so busy-detection is atomic. Fan-out
//! uses bounded per-connection queues with non-blocking sends; a slow
//! recipient never stalls delivery to the others.

// Re-export core types and functions for easy access
pub use auth::{IdentityVerifier, TokenVerifier};
pub use config::ServerConfig;
pub use error::ServerError;
pub use ident::{ConnectionId, SpaceId, UserId};
pub use server::SpaceServer;
pub use shutdown::ShutdownState;
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod external;
pub mod ident;
pub mod movement;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod signaling;
pub mod space;
pub mod utils;

// Internal modules (not part of public API)
mod router;
