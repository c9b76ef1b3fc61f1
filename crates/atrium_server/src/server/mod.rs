//! Server orchestration: accept loop and per-connection lifecycle.

pub mod core;
pub mod handlers;

pub use core::SpaceServer;
