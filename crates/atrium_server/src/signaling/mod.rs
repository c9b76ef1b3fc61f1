//! Call signaling relay state.
//!
//! The relay carries negotiation payloads between exactly two identifiers
//! without inspecting them, keeping just enough per-pair state to detect
//! busy, duplicate, and stale messages. Call state is keyed by the
//! unordered pair of participants; each identifier participates in at most
//! one call at a time.

pub mod relay;

pub use relay::CallRelay;

use crate::ident::UserId;
use crate::protocol::CallType;

/// Unordered pair of identifiers keying a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(UserId, UserId);

impl PairKey {
    pub fn new(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }
}

/// Phase of an in-progress negotiation.
///
/// Idle is represented by the absence of a [`CallState`]; ending a call in
/// any phase discards the record, returning the pair to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// The offer has been relayed to the callee
    Offered,
    /// The callee answered; candidates may flow either way
    Accepted,
}

/// The relay's record of one in-progress call.
#[derive(Debug, Clone)]
pub struct CallState {
    pub caller: UserId,
    pub callee: UserId,
    pub phase: CallPhase,
    pub call_type: CallType,
}

impl CallState {
    /// The other participant, if `user` is one of the pair.
    pub fn peer_of(&self, user: &UserId) -> Option<&UserId> {
        if &self.caller == user {
            Some(&self.callee)
        } else if &self.callee == user {
            Some(&self.caller)
        } else {
            None
        }
    }
}
