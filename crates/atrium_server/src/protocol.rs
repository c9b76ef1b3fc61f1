//! Wire message definitions for client-server communication.
//!
//! Messages are JSON objects exchanged as text frames over the persistent
//! per-connection channel, internally tagged by `kind`. Negotiation payloads
//! (`offer`, `answer`, `candidate` bodies) are opaque values relayed without
//! inspection.

use crate::ident::{SpaceId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A message sent from a client to the server.
///
/// Movement messages feed the movement broadcaster; everything else is
/// call signaling addressed to a single target identifier.
///
/// # Examples
///
/// ```json
/// { "kind": "MOVE", "x": 10, "y": 12 }
/// { "kind": "offer", "targetId": "u2", "offer": { "sdp": "..." }, "callType": "video" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClientMessage {
    /// Request to move to the given coordinate
    #[serde(rename = "MOVE")]
    Move { x: i32, y: i32 },

    /// Start a call: carry a negotiation offer to the target
    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer {
        target_id: UserId,
        offer: serde_json::Value,
        call_type: CallType,
    },

    /// Accept a call: carry the negotiation answer back to the caller
    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer {
        target_id: UserId,
        answer: serde_json::Value,
    },

    /// Relay a transport candidate to the other party of a live call
    #[serde(rename = "candidate", rename_all = "camelCase")]
    Candidate {
        target_id: UserId,
        candidate: serde_json::Value,
    },

    /// Terminate (or reject) the call with the target
    #[serde(rename = "call_ended", rename_all = "camelCase")]
    CallEnded {
        target_id: UserId,
        #[serde(default)]
        reason: EndReason,
    },
}

/// A message sent from the server to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ServerMessage {
    /// Occupant snapshot delivered once, immediately after a join
    #[serde(rename = "INITIAL_USERS")]
    InitialUsers { users: Vec<OccupantInfo> },

    /// Broadcast to a space when an occupant's move is accepted
    #[serde(rename = "POSITION_UPDATE", rename_all = "camelCase")]
    PositionUpdate {
        user_id: UserId,
        display_name: String,
        x: i32,
        y: i32,
        space_id: SpaceId,
    },

    /// Broadcast to a space when a new occupant joins
    #[serde(rename = "USER_JOINED", rename_all = "camelCase")]
    UserJoined {
        user_id: UserId,
        display_name: String,
        x: i32,
        y: i32,
    },

    /// Broadcast to a space when an occupant leaves
    #[serde(rename = "USER_LEFT", rename_all = "camelCase")]
    UserLeft { user_id: UserId },

    /// Unicast call offer, including the caller's display name for UI use
    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer {
        from_id: UserId,
        display_name: String,
        offer: serde_json::Value,
        call_type: CallType,
    },

    /// Unicast call answer
    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer {
        from_id: UserId,
        answer: serde_json::Value,
    },

    /// Unicast transport candidate
    #[serde(rename = "candidate", rename_all = "camelCase")]
    Candidate {
        from_id: UserId,
        candidate: serde_json::Value,
    },

    /// Unicast call termination notice
    #[serde(rename = "call_ended", rename_all = "camelCase")]
    CallEnded { from_id: UserId, reason: EndReason },

    /// Error notice for the sending client; the connection stays open
    #[serde(rename = "ERROR")]
    Error { message: String },
}

/// A single occupant entry in the join snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupantInfo {
    pub user_id: UserId,
    pub x: i32,
    pub y: i32,
    pub display_name: String,
}

/// Media kind of a call, carried through negotiation untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

/// Reason attached to a call termination notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// A party hung up a live call
    Ended,
    /// The callee declined the offer
    Rejected,
    /// The callee was already in another call
    Busy,
    /// A party's connection went away mid-call
    Disconnected,
}

impl Default for EndReason {
    fn default() -> Self {
        EndReason::Ended
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EndReason::Ended => "ended",
            EndReason::Rejected => "rejected",
            EndReason::Busy => "busy",
            EndReason::Disconnected => "disconnected",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_move_message() {
        let msg: ClientMessage = serde_json::from_str(r#"{"kind":"MOVE","x":10,"y":12}"#)
            .expect("valid MOVE message");
        match msg {
            ClientMessage::Move { x, y } => {
                assert_eq!(x, 10);
                assert_eq!(y, 12);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_offer_with_opaque_payload() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"kind":"offer","targetId":"u2","offer":{"sdp":"v=0"},"callType":"video"}"#,
        )
        .expect("valid offer message");
        match msg {
            ClientMessage::Offer {
                target_id,
                offer,
                call_type,
            } => {
                assert_eq!(target_id, UserId::from("u2"));
                assert_eq!(offer["sdp"], "v=0");
                assert_eq!(call_type, CallType::Video);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn call_ended_reason_defaults_to_ended() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"kind":"call_ended","targetId":"u2"}"#).expect("valid");
        match msg {
            ClientMessage::CallEnded { reason, .. } => assert_eq!(reason, EndReason::Ended),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_kind_and_missing_fields() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"kind":"TELEPORT","x":1}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"kind":"MOVE","x":1}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    #[test]
    fn position_update_uses_wire_field_names() {
        let update = ServerMessage::PositionUpdate {
            user_id: UserId::from("u1"),
            display_name: "Ada".to_string(),
            x: 10,
            y: 13,
            space_id: SpaceId::from("s1"),
        };
        let json = serde_json::to_value(&update).expect("serializable");
        assert_eq!(json["kind"], "POSITION_UPDATE");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["displayName"], "Ada");
        assert_eq!(json["spaceId"], "s1");
    }

    #[test]
    fn end_reasons_serialize_lowercase() {
        let json = serde_json::to_value(EndReason::Disconnected).expect("serializable");
        assert_eq!(json, "disconnected");
        assert_eq!(EndReason::Busy.to_string(), "busy");
    }
}
