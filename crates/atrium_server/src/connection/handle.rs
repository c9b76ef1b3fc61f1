//! Per-connection outbound delivery handle.
//!
//! Every live connection owns a bounded outbound queue drained by its
//! writer task. All delivery in the core — broadcast fan-out and signaling
//! unicast alike — goes through [`ConnectionHandle::send`], which never
//! blocks: a full queue means the peer is not keeping up, the frame is
//! dropped, and the condition is logged as an imminent disconnect.

use crate::ident::ConnectionId;
use crate::protocol::ServerMessage;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Bytes;
use tracing::{debug, warn};

/// A frame queued for a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    /// A protocol message to serialize and send as a text frame
    Frame(ServerMessage),
    /// Reply to a client ping
    Pong(Bytes),
    /// Send a close frame and terminate the connection
    Close,
}

/// Cloneable sending side of a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: ConnectionId,
    outbound: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiving end its writer task drains.
    pub fn new(connection_id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (outbound, rx) = mpsc::channel(capacity);
        (
            Self {
                connection_id,
                outbound,
            },
            rx,
        )
    }

    /// The process-local identifier of the underlying connection.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Queues a message for delivery. Best effort: returns `false` if the
    /// connection is gone or its queue is full.
    pub fn send(&self, message: ServerMessage) -> bool {
        match self.outbound.try_send(Outbound::Frame(message)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue full for connection {}, dropping frame (slow consumer)",
                    self.connection_id
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    "Outbound queue closed for connection {}, dropping frame",
                    self.connection_id
                );
                false
            }
        }
    }

    /// Queues a pong reply to a client ping.
    pub fn pong(&self, payload: Bytes) {
        let _ = self.outbound.try_send(Outbound::Pong(payload));
    }

    /// Asks the writer task to send a close frame and shut the connection.
    pub fn close(&self) {
        let _ = self.outbound.try_send(Outbound::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::UserId;

    #[tokio::test]
    async fn send_queues_frames_in_order() {
        let (handle, mut rx) = ConnectionHandle::new(1, 8);
        assert!(handle.send(ServerMessage::UserLeft {
            user_id: UserId::from("u1"),
        }));
        assert!(handle.send(ServerMessage::Error {
            message: "x".to_string(),
        }));

        match rx.recv().await {
            Some(Outbound::Frame(ServerMessage::UserLeft { user_id })) => {
                assert_eq!(user_id, UserId::from("u1"))
            }
            other => panic!("unexpected frame: {other:?}"),
        }
        match rx.recv().await {
            Some(Outbound::Frame(ServerMessage::Error { .. })) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (handle, _rx) = ConnectionHandle::new(1, 1);
        assert!(handle.send(ServerMessage::UserLeft {
            user_id: UserId::from("u1"),
        }));
        // Queue capacity is 1 and nothing drains it: the second send drops.
        assert!(!handle.send(ServerMessage::UserLeft {
            user_id: UserId::from("u1"),
        }));
    }

    #[tokio::test]
    async fn closed_receiver_drops_without_panicking() {
        let (handle, rx) = ConnectionHandle::new(1, 8);
        drop(rx);
        assert!(!handle.send(ServerMessage::UserLeft {
            user_id: UserId::from("u1"),
        }));
    }
}
