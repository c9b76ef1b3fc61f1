//! Shutdown coordination.
//!
//! A small shared flag pair letting the accept loop and application layer
//! coordinate a two-phase stop: initiation (stop accepting, drain) and
//! completion (cleanup done).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared shutdown state cloned across server components.
#[derive(Debug, Clone, Default)]
pub struct ShutdownState {
    inner: Arc<Flags>,
}

#[derive(Debug, Default)]
struct Flags {
    initiated: AtomicBool,
    completed: AtomicBool,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks shutdown as initiated; accept loops stop on their next pass.
    pub fn initiate_shutdown(&self) {
        self.inner.initiated.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.inner.initiated.load(Ordering::SeqCst)
    }

    /// Marks cleanup as finished.
    pub fn complete_shutdown(&self) {
        self.inner.completed.store(true, Ordering::SeqCst);
    }

    /// Whether cleanup has finished.
    pub fn is_shutdown_complete(&self) -> bool {
        self.inner.completed.load(Ordering::SeqCst)
    }
}
