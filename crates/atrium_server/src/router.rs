//! Routing of inbound client frames.
//!
//! Parses each text frame and dispatches it to the movement broadcaster or
//! the call signaling relay based on message kind. Malformed frames are
//! logged, answered with an `ERROR` notice, and otherwise ignored; the
//! connection stays open.

use crate::connection::Session;
use crate::movement::MovementBroadcaster;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::signaling::CallRelay;
use tracing::{trace, warn};

/// Parses and dispatches one client frame for the given session.
pub async fn route_client_message(
    text: &str,
    session: &Session,
    movement: &MovementBroadcaster,
    relay: &CallRelay,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Malformed message from {}: {e}", session.user_id);
            session.handle.send(ServerMessage::Error {
                message: "malformed message".to_string(),
            });
            return;
        }
    };

    trace!("📨 Routing {message:?} from {}", session.user_id);

    match message {
        ClientMessage::Move { x, y } => {
            movement.apply_move(session, x, y).await;
        }
        ClientMessage::Offer {
            target_id,
            offer,
            call_type,
        } => {
            relay.initiate(session, &target_id, call_type, offer).await;
        }
        ClientMessage::Answer { target_id, answer } => {
            relay.accept(session, &target_id, answer).await;
        }
        ClientMessage::Candidate {
            target_id,
            candidate,
        } => {
            relay.relay_candidate(session, &target_id, candidate).await;
        }
        ClientMessage::CallEnded { target_id, reason } => {
            relay.end(session, &target_id, reason).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnPoint;
    use crate::connection::handle::{ConnectionHandle, Outbound};
    use crate::connection::ConnectionRegistry;
    use crate::external::{BoundedGrid, MemoryPositionStore};
    use crate::ident::{SpaceId, UserId};
    use crate::space::SpaceTracker;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn harness() -> (
        Session,
        mpsc::Receiver<Outbound>,
        Arc<SpaceTracker>,
        MovementBroadcaster,
        CallRelay,
    ) {
        let registry = Arc::new(ConnectionRegistry::new());
        let store = Arc::new(MemoryPositionStore::new());
        let tracker = Arc::new(SpaceTracker::new(
            registry.clone(),
            store.clone(),
            SpawnPoint { x: 0, y: 0 },
            Duration::from_millis(100),
        ));
        let movement = MovementBroadcaster::new(
            tracker.clone(),
            Arc::new(BoundedGrid {
                width: 10,
                height: 10,
            }),
            store,
            Duration::from_millis(100),
        );
        let relay = CallRelay::new(registry.clone());

        let (handle, rx) = ConnectionHandle::new(1, 32);
        let session = Session {
            user_id: UserId::from("a"),
            display_name: "a".to_string(),
            space_id: SpaceId::from("s1"),
            handle,
        };
        registry.admit(session.clone()).await;
        tracker.join(&session).await;
        (session, rx, tracker, movement, relay)
    }

    #[tokio::test]
    async fn malformed_frames_get_an_error_notice() {
        let (session, mut rx, _tracker, movement, relay) = harness().await;

        route_client_message("{not json", &session, &movement, &relay).await;
        route_client_message(r#"{"kind":"NOPE"}"#, &session, &movement, &relay).await;

        let mut errors = 0;
        while let Ok(out) = rx.try_recv() {
            if matches!(out, Outbound::Frame(ServerMessage::Error { .. })) {
                errors += 1;
            }
        }
        assert_eq!(errors, 2);
    }

    #[tokio::test]
    async fn move_frames_reach_the_broadcaster() {
        let (session, _rx, tracker, movement, relay) = harness().await;

        route_client_message(
            r#"{"kind":"MOVE","x":3,"y":4}"#,
            &session,
            &movement,
            &relay,
        )
        .await;

        let pos = tracker.position_of(&session.user_id).await.expect("joined");
        assert_eq!((pos.x, pos.y), (3, 4));
    }

    #[tokio::test]
    async fn signaling_frames_reach_the_relay() {
        let (session, mut rx, _tracker, movement, relay) = harness().await;

        // Offer to an unreachable target comes straight back as an error.
        route_client_message(
            r#"{"kind":"offer","targetId":"nobody","offer":{},"callType":"audio"}"#,
            &session,
            &movement,
            &relay,
        )
        .await;

        match rx.try_recv() {
            Ok(Outbound::Frame(ServerMessage::Error { message })) => {
                assert!(message.contains("unreachable"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
