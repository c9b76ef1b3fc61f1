//! Connection handling logic for WebSocket clients.
//!
//! This module manages the complete lifecycle of one client connection:
//! WebSocket handshake with credential and space parameters, identity
//! verification, admission (with eviction of a previous connection for the
//! same user), space join, message routing, and cleanup. Cleanup runs in
//! one pass: call teardown first, then membership removal, then the
//! registry entry — so a mid-call peer learns of the disconnect before the
//! departed user is gone from the routing table.

use crate::connection::{ConnectionHandle, Outbound, Session};
use crate::error::ServerError;
use crate::ident::{ConnectionId, SpaceId};
use crate::protocol::ServerMessage;
use crate::router::route_client_message;
use crate::server::core::SpaceServer;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Process-wide connection id counter.
static NEXT_CONNECTION_ID: AtomicUsize = AtomicUsize::new(1);

/// Parameters carried by the handshake URL.
struct HandshakeParams {
    token: String,
    space_id: SpaceId,
}

/// Extracts credential and space parameters from the handshake request.
fn parse_handshake(request: &Request, endpoint_path: &str) -> Result<HandshakeParams, &'static str> {
    if request.uri().path() != endpoint_path {
        return Err("unknown endpoint path");
    }

    let query = request.uri().query().unwrap_or("");
    let mut token = None;
    let mut space = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "token" => token = Some(value.to_string()),
            "space" => space = Some(value.to_string()),
            _ => {}
        }
    }

    match (token, space) {
        (Some(token), Some(space)) if !token.is_empty() && !space.is_empty() => {
            Ok(HandshakeParams {
                token,
                space_id: SpaceId(space),
            })
        }
        _ => Err("missing token or space parameter"),
    }
}

/// Handles a single client connection from handshake to cleanup.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server: SpaceServer,
) -> Result<(), ServerError> {
    let mut params: Option<HandshakeParams> = None;
    let endpoint_path = server.config.endpoint_path.clone();
    let callback = |request: &Request, response: Response| match parse_handshake(
        request,
        &endpoint_path,
    ) {
        Ok(parsed) => {
            params = Some(parsed);
            Ok(response)
        }
        Err(reason) => {
            let mut rejection = ErrorResponse::new(Some(reason.to_string()));
            *rejection.status_mut() = StatusCode::BAD_REQUEST;
            Err(rejection)
        }
    };

    let mut ws_stream = accept_hdr_async(stream, callback)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;
    let params = params.ok_or_else(|| {
        ServerError::Internal("handshake accepted without parameters".to_string())
    })?;

    // Verify the credential before creating any state: a failure closes
    // the connection with no registry entry, no membership, no broadcast.
    let user_id = match server.verifier.verify(&params.token) {
        Ok(user_id) => user_id,
        Err(e) => {
            close(&mut ws_stream, CloseCode::Policy, "unauthorized").await;
            return Err(e);
        }
    };

    if server.registry.len().await >= server.config.max_connections {
        warn!("Connection from {addr} refused: server full");
        close(&mut ws_stream, CloseCode::Again, "server full").await;
        return Ok(());
    }

    // Display name comes from the external profile service; a slow or
    // failed lookup falls back to the configured placeholder.
    let display_name = match tokio::time::timeout(
        server.config.timeouts.profile(),
        server.profiles.lookup_display_name(&user_id),
    )
    .await
    {
        Ok(Some(name)) => name,
        _ => server.config.placeholder_name.clone(),
    };

    let connection_id: ConnectionId = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    let (handle, mut outbound_rx) =
        ConnectionHandle::new(connection_id, server.config.limits.send_buffer);
    let session = Session {
        user_id: user_id.clone(),
        display_name,
        space_id: params.space_id,
        handle,
    };

    info!(
        "🔗 Connection {} from {} as user {} (space {})",
        connection_id, addr, session.user_id, session.space_id
    );

    // Admission may evict a previous connection for the same user; its
    // call and membership are torn down before this session joins.
    let outcome = server.registry.admit(session.clone()).await;
    if let Some(evicted) = outcome.evicted {
        server.relay.end_for_disconnect(&evicted.user_id).await;
        server.tracker.leave(&evicted).await;
    }

    let snapshot = server.tracker.join(&session).await;
    session.handle.send(ServerMessage::InitialUsers { users: snapshot });

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Outgoing task: drain the session's outbound queue into the socket.
    let outgoing_task = async move {
        while let Some(item) = outbound_rx.recv().await {
            match item {
                Outbound::Frame(message) => {
                    let text = match serde_json::to_string(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to serialize outbound frame: {e}");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Pong(payload) => {
                    if ws_sender.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "replaced by a newer connection".into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    };

    // Incoming task: route frames until the peer goes away.
    let incoming_task = {
        let session = session.clone();
        let server = server.clone();
        async move {
            while let Some(message) = ws_receiver.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if text.len() > server.config.limits.max_message_size {
                            warn!(
                                "Oversized frame ({} bytes) from {}, ignoring",
                                text.len(),
                                session.user_id
                            );
                            session.handle.send(ServerMessage::Error {
                                message: "message too large".to_string(),
                            });
                            continue;
                        }
                        route_client_message(
                            text.as_str(),
                            &session,
                            &server.movement,
                            &server.relay,
                        )
                        .await;
                    }
                    Ok(Message::Ping(payload)) => session.handle.pong(payload),
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", session.user_id);
                        break;
                    }
                    Err(e) => {
                        debug!("WebSocket error for connection {connection_id}: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    // One synchronous cleanup pass. The ownership check keeps an evicted
    // connection's late cleanup away from its replacement's state.
    if server.registry.owns(&user_id, connection_id).await {
        server.relay.end_for_disconnect(&user_id).await;
        if let Some(departed) = server.registry.remove_if(&user_id, connection_id).await {
            server.tracker.leave(&departed).await;
        }
    }

    info!("❌ Connection {} from {} disconnected", connection_id, addr);
    Ok(())
}

async fn close(
    ws_stream: &mut WebSocketStream<TcpStream>,
    code: CloseCode,
    reason: &'static str,
) {
    let _ = ws_stream
        .close(Some(CloseFrame {
            code,
            reason: reason.into(),
        }))
        .await;
}
