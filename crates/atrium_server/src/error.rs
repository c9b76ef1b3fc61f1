//! Error types and handling for the presence server.
//!
//! This module defines the error types that can occur during server operations,
//! providing clear categorization of different failure modes. Per-message
//! failures (malformed payloads, rejected moves, unroutable signaling) are
//! handled locally at the connection and never surface here.

/// Enumeration of possible server errors.
///
/// Categorizes errors into network, authentication, and internal server
/// errors. None of these are fatal to the process; a failure on one
/// connection never terminates another connection's session.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or handshake issues
    #[error("Network error: {0}")]
    Network(String),

    /// Credential verification failed; the connection is closed with no
    /// state created and no broadcast emitted
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}
