//! Call signaling relay.
//!
//! Forwards offer/answer/candidate/end messages between pairs of connected
//! users. Every relay operation is a best-effort unicast: if the target
//! handle is absent the message is dropped, not queued — signaling assumes
//! both parties stay connected for the duration of negotiation.
//!
//! The call table and the per-user index live behind one mutex so that
//! check-then-create sequences (busy detection in particular) are atomic:
//! two callers racing for the same callee cannot both win.

use crate::connection::{ConnectionRegistry, Session};
use crate::ident::UserId;
use crate::protocol::{CallType, EndReason, ServerMessage};
use crate::signaling::{CallPhase, CallState, PairKey};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct RelayState {
    calls: HashMap<PairKey, CallState>,
    by_user: HashMap<UserId, PairKey>,
}

impl RelayState {
    fn call_of(&self, user: &UserId) -> Option<(&PairKey, &CallState)> {
        let key = self.by_user.get(user)?;
        self.calls.get(key).map(|call| (key, call))
    }

    fn remove(&mut self, key: &PairKey) -> Option<CallState> {
        let call = self.calls.remove(key)?;
        self.by_user.remove(&call.caller);
        self.by_user.remove(&call.callee);
        Some(call)
    }
}

/// Relays call negotiation between pairs of connected users.
pub struct CallRelay {
    registry: Arc<ConnectionRegistry>,
    state: Mutex<RelayState>,
}

impl CallRelay {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(RelayState::default()),
        }
    }

    /// Starts a call: creates the pair's call state and relays the offer.
    ///
    /// The caller must be idle. An unreachable target or a caller already
    /// in a call yields an `ERROR` notice back to the caller; a busy callee
    /// yields a `call_ended {busy}` notice and delivers no offer.
    pub async fn initiate(
        &self,
        caller: &Session,
        target: &UserId,
        call_type: CallType,
        offer: serde_json::Value,
    ) {
        let mut state = self.state.lock().await;

        if state.by_user.contains_key(&caller.user_id) {
            warn!(
                "User {} tried to start a call while already in one",
                caller.user_id
            );
            caller.handle.send(ServerMessage::Error {
                message: "call already in progress".to_string(),
            });
            return;
        }

        let Some(callee) = self.registry.lookup(target).await else {
            debug!(
                "Call offer from {} to {} dropped: target not connected",
                caller.user_id, target
            );
            caller.handle.send(ServerMessage::Error {
                message: format!("target {target} unreachable"),
            });
            return;
        };

        if state.by_user.contains_key(target) {
            info!(
                "Call offer from {} to {} refused: callee busy",
                caller.user_id, target
            );
            caller.handle.send(ServerMessage::CallEnded {
                from_id: target.clone(),
                reason: EndReason::Busy,
            });
            return;
        }

        let key = PairKey::new(&caller.user_id, target);
        state.calls.insert(
            key.clone(),
            CallState {
                caller: caller.user_id.clone(),
                callee: target.clone(),
                phase: CallPhase::Offered,
                call_type,
            },
        );
        state.by_user.insert(caller.user_id.clone(), key.clone());
        state.by_user.insert(target.clone(), key);

        info!(
            "📞 Call offered: {} -> {} ({:?})",
            caller.user_id, target, call_type
        );

        callee.handle.send(ServerMessage::Offer {
            from_id: caller.user_id.clone(),
            display_name: caller.display_name.clone(),
            offer,
            call_type,
        });
    }

    /// Accepts an offered call and relays the answer to the caller.
    ///
    /// Only the callee of a call in the offered phase may accept; anything
    /// else is a stale or mismatched message and is dropped.
    pub async fn accept(&self, callee: &Session, target: &UserId, answer: serde_json::Value) {
        let mut state = self.state.lock().await;

        let Some(key) = state.by_user.get(&callee.user_id).cloned() else {
            debug!("Answer from {} dropped: no call state", callee.user_id);
            return;
        };
        let Some(call) = state.calls.get_mut(&key) else {
            return;
        };
        if call.callee != callee.user_id || call.caller != *target || call.phase != CallPhase::Offered
        {
            debug!(
                "Answer from {} to {} dropped: mismatched call state",
                callee.user_id, target
            );
            return;
        }

        call.phase = CallPhase::Accepted;
        info!("📞 Call accepted: {} <-> {}", call.caller, call.callee);

        if let Some(caller) = self.registry.lookup(target).await {
            caller.handle.send(ServerMessage::Answer {
                from_id: callee.user_id.clone(),
                answer,
            });
        }
    }

    /// Relays a transport candidate to the other party of a live call.
    ///
    /// Candidates arriving before a call exists, or addressed to a party
    /// other than the peer, are dropped and logged, never delivered.
    pub async fn relay_candidate(
        &self,
        from: &Session,
        target: &UserId,
        candidate: serde_json::Value,
    ) {
        let state = self.state.lock().await;

        let Some((_, call)) = state.call_of(&from.user_id) else {
            debug!("Candidate from {} dropped: no call state", from.user_id);
            return;
        };
        if call.peer_of(&from.user_id) != Some(target) {
            debug!(
                "Candidate from {} to {} dropped: not the call peer",
                from.user_id, target
            );
            return;
        }

        if let Some(peer) = self.registry.lookup(target).await {
            peer.handle.send(ServerMessage::Candidate {
                from_id: from.user_id.clone(),
                candidate,
            });
        }
    }

    /// Ends the call with `target`, notifying the other party if connected.
    pub async fn end(&self, from: &Session, target: &UserId, reason: EndReason) {
        let mut state = self.state.lock().await;

        let Some((key, call)) = state.call_of(&from.user_id) else {
            debug!("Call end from {} dropped: no call state", from.user_id);
            return;
        };
        if call.peer_of(&from.user_id) != Some(target) {
            debug!(
                "Call end from {} to {} dropped: not the call peer",
                from.user_id, target
            );
            return;
        }

        let key = key.clone();
        state.remove(&key);
        info!("📞 Call ended by {} ({reason})", from.user_id);

        if let Some(peer) = self.registry.lookup(target).await {
            peer.handle.send(ServerMessage::CallEnded {
                from_id: from.user_id.clone(),
                reason,
            });
        }
    }

    /// Synthesizes a call termination on behalf of a departed user.
    ///
    /// Invoked during disconnect cleanup, before the user's registry entry
    /// is removed; the peer receives `call_ended {disconnected}`.
    pub async fn end_for_disconnect(&self, user_id: &UserId) {
        let mut state = self.state.lock().await;

        let Some(key) = state.by_user.get(user_id).cloned() else {
            return;
        };
        let Some(call) = state.remove(&key) else {
            return;
        };
        let Some(peer) = call.peer_of(user_id).cloned() else {
            return;
        };

        info!("📞 Call with {peer} ended: {user_id} disconnected");

        if let Some(peer_session) = self.registry.lookup(&peer).await {
            peer_session.handle.send(ServerMessage::CallEnded {
                from_id: user_id.clone(),
                reason: EndReason::Disconnected,
            });
        }
    }

    /// The user's active call state, if any.
    pub async fn active_call(&self, user_id: &UserId) -> Option<CallState> {
        let state = self.state.lock().await;
        state.call_of(user_id).map(|(_, call)| call.clone())
    }
}
