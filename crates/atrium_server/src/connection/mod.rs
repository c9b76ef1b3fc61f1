//! Connection management for live client sessions.
//!
//! This module owns the binding between an authenticated identifier and its
//! open connection: the per-connection outbound handle, the immutable
//! session value, and the registry enforcing at most one live connection
//! per identifier.

pub mod handle;
pub mod registry;
pub mod session;

pub use handle::{ConnectionHandle, Outbound};
pub use registry::{AdmitOutcome, ConnectionRegistry};
pub use session::Session;
