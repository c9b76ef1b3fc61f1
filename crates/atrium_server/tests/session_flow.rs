//! End-to-end session tests over real WebSocket connections.
//!
//! Boots the server on an ephemeral port and drives it with
//! tokio-tungstenite clients, exercising the full path: handshake,
//! credential verification, join snapshot, movement broadcast, call
//! signaling, and disconnect cleanup.

use atrium_server::config::{AuthConfig, ServerConfig};
use atrium_server::external::{BoundedGrid, MemoryPositionStore, StaticProfiles};
use atrium_server::{SpaceId, SpaceServer, TokenVerifier, UserId};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type ClientSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const SECRET: &str = "e2e-test-secret";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

async fn start_server() -> (std::net::SocketAddr, SpaceServer) {
    init_tracing();
    let config = ServerConfig {
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
        ..Default::default()
    };
    let server = SpaceServer::new(
        config,
        Arc::new(BoundedGrid {
            width: 100,
            height: 100,
        }),
        Arc::new(MemoryPositionStore::new()),
        Arc::new(StaticProfiles::with([("alice", "Alice"), ("bob", "Bob")])),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let background = server.clone();
    tokio::spawn(async move {
        background.serve(listener, None).await.expect("serve");
    });
    (addr, server)
}

fn token_for(user: &str) -> String {
    TokenVerifier::new(SECRET)
        .issue(&UserId::from(user), 60)
        .expect("token")
}

async fn connect(addr: std::net::SocketAddr, token: &str, space: &str) -> ClientSocket {
    let url = format!("ws://{addr}/ws?token={token}&space={space}");
    let (socket, _response) = connect_async(url).await.expect("connect");
    socket
}

/// Awaits the next text frame and parses it, skipping control frames.
async fn next_json(socket: &mut ClientSocket) -> Value {
    let deadline = Duration::from_secs(2);
    loop {
        let frame = tokio::time::timeout(deadline, socket.next())
            .await
            .expect("frame within deadline")
            .expect("stream open")
            .expect("frame ok");
        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("json"),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

async fn send_json(socket: &mut ClientSocket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

#[tokio::test(flavor = "multi_thread")]
async fn handshake_without_parameters_is_refused() {
    let (addr, _server) = start_server().await;
    let result = connect_async(format!("ws://{addr}/ws")).await;
    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_credential_closes_with_no_state() {
    let (addr, server) = start_server().await;

    let url = format!("ws://{addr}/ws?token=forged&space=plaza");
    let (mut socket, _response) = connect_async(url).await.expect("handshake completes");

    // The server closes immediately after verification fails.
    let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("frame within deadline")
        .expect("stream open")
        .expect("frame ok");
    assert!(matches!(frame, Message::Close(_)));

    // No registry entry and no occupancy were created.
    assert_eq!(server.registry().len().await, 0);
    assert!(server
        .tracker()
        .occupants_of(&SpaceId::from("plaza"))
        .await
        .is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn presence_movement_and_calls_flow_end_to_end() {
    let (addr, server) = start_server().await;

    // Alice joins first and is alone.
    let mut alice = connect(addr, &token_for("alice"), "plaza").await;
    let initial = next_json(&mut alice).await;
    assert_eq!(initial["kind"], "INITIAL_USERS");
    assert_eq!(initial["users"].as_array().expect("array").len(), 0);

    // Alice moves; nobody is listening yet. Moves carry no
    // acknowledgement, so wait until the server applied it before
    // bringing Bob in.
    send_json(&mut alice, json!({"kind": "MOVE", "x": 10, "y": 12})).await;
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(pos) = server.tracker().position_of(&UserId::from("alice")).await {
                if (pos.x, pos.y) == (10, 12) {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("move applied");

    // Bob joins and sees Alice at her moved position.
    let mut bob = connect(addr, &token_for("bob"), "plaza").await;
    let initial = next_json(&mut bob).await;
    assert_eq!(initial["kind"], "INITIAL_USERS");
    let users = initial["users"].as_array().expect("array");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["userId"], "alice");
    assert_eq!(users[0]["displayName"], "Alice");
    assert_eq!(users[0]["x"], 10);
    assert_eq!(users[0]["y"], 12);

    // Alice hears about Bob's arrival at the spawn coordinate.
    let joined = next_json(&mut alice).await;
    assert_eq!(joined["kind"], "USER_JOINED");
    assert_eq!(joined["userId"], "bob");
    assert_eq!(joined["x"], 0);
    assert_eq!(joined["y"], 0);

    // Bob moves; Alice receives the position update.
    send_json(&mut bob, json!({"kind": "MOVE", "x": 10, "y": 13})).await;
    let update = next_json(&mut alice).await;
    assert_eq!(update["kind"], "POSITION_UPDATE");
    assert_eq!(update["userId"], "bob");
    assert_eq!(update["x"], 10);
    assert_eq!(update["y"], 13);
    assert_eq!(update["spaceId"], "plaza");

    // A rejected move produces no broadcast and no stored change.
    send_json(&mut bob, json!({"kind": "MOVE", "x": -1, "y": 13})).await;

    // Alice calls Bob; the offer carries her display name.
    send_json(
        &mut alice,
        json!({
            "kind": "offer",
            "targetId": "bob",
            "offer": {"sdp": "v=0"},
            "callType": "audio"
        }),
    )
    .await;
    let offer = next_json(&mut bob).await;
    assert_eq!(offer["kind"], "offer");
    assert_eq!(offer["fromId"], "alice");
    assert_eq!(offer["displayName"], "Alice");
    assert_eq!(offer["callType"], "audio");
    assert_eq!(offer["offer"]["sdp"], "v=0");

    // Bob answers; Alice receives it.
    send_json(
        &mut bob,
        json!({"kind": "answer", "targetId": "alice", "answer": {"sdp": "a=1"}}),
    )
    .await;
    let answer = next_json(&mut alice).await;
    assert_eq!(answer["kind"], "answer");
    assert_eq!(answer["fromId"], "bob");

    // Candidates flow both ways.
    send_json(
        &mut alice,
        json!({"kind": "candidate", "targetId": "bob", "candidate": {"c": 1}}),
    )
    .await;
    let candidate = next_json(&mut bob).await;
    assert_eq!(candidate["kind"], "candidate");
    assert_eq!(candidate["fromId"], "alice");

    // Alice vanishes mid-call: Bob gets the synthesized termination and
    // the presence departure in the same cleanup pass.
    alice.close(None).await.expect("close");
    let mut kinds = Vec::new();
    for _ in 0..2 {
        let frame = next_json(&mut bob).await;
        if frame["kind"] == "call_ended" {
            assert_eq!(frame["fromId"], "alice");
            assert_eq!(frame["reason"], "disconnected");
        }
        kinds.push(frame["kind"].as_str().expect("kind").to_string());
    }
    kinds.sort();
    assert_eq!(kinds, ["USER_LEFT", "call_ended"]);

    // The registry forgets Alice once cleanup settles.
    tokio::time::timeout(Duration::from_secs(2), async {
        while server.registry().lookup(&UserId::from("alice")).await.is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("alice removed from registry");
}
