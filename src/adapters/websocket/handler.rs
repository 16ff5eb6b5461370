//! WebSocket upgrade handler for hub connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Validate the `token` query parameter through the hub's gate
//! 2. Upgrade to WebSocket (refused with 401 if step 1 failed)
//! 3. Admit the connection and start the writer task
//! 4. Route inbound frames until either side closes
//! 5. Disconnect exactly once

use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;

use crate::domain::foundation::{AuthError, AuthenticatedUser, ValidationError};

use super::hub::RideHub;
use super::messages::Delivery;
use super::session::ConnectionSession;

/// Query parameters of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?token=<jwt>`
///
/// The credential is checked before the upgrade so a refused client gets a
/// plain 401 and nothing is registered.
pub async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    Query(params): Query<ConnectParams>,
    State(hub): State<Arc<RideHub>>,
) -> Response {
    let mut session = hub.open_session();

    let user = match hub.authenticate(&mut session, params.token.as_deref()).await {
        Ok(user) => user,
        Err(err) => return auth_rejection(&err),
    };

    let Some(ws) = ws else {
        return (
            StatusCode::UPGRADE_REQUIRED,
            Json(serde_json::json!({
                "error": "WebSocket upgrade required",
                "code": "UPGRADE_REQUIRED"
            })),
        )
            .into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, hub, session, user))
}

/// 401 body for a refused handshake.
pub fn auth_rejection(err: &AuthError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": err.to_string(),
            "code": err.code()
        })),
    )
        .into_response()
}

/// Runs an established connection until either side closes.
async fn handle_socket(
    socket: WebSocket,
    hub: Arc<RideHub>,
    mut session: ConnectionSession,
    user: AuthenticatedUser,
) {
    let (sink, mut stream) = socket.split();

    let mut outbound = match hub.connect(&mut session, user) {
        Ok(rx) => rx,
        Err(e) => {
            tracing::warn!(connection_id = %session.id(), error = %e, "Could not admit connection");
            return;
        }
    };
    let connection_id = session.id();

    // Writer: drain the outbound queue onto the socket
    let mut send_task = tokio::spawn(async move {
        let mut sink = sink;
        while let Some(delivery) = outbound.recv().await {
            if !write_delivery(&mut sink, delivery).await {
                break;
            }
        }
    });

    // Reader: route inbound frames through the hub
    let recv_hub = Arc::clone(&hub);
    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        let max_frame_bytes = recv_hub.max_frame_bytes();
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if text.len() > max_frame_bytes {
                        recv_hub.reject_frame(
                            &recv_session,
                            ValidationError::malformed_frame(format!(
                                "frame of {} bytes exceeds limit of {}",
                                text.len(),
                                max_frame_bytes
                            )),
                        );
                        continue;
                    }
                    recv_hub.dispatch(&recv_session, &text);
                }
                Ok(Message::Binary(_)) => {
                    recv_hub.reject_frame(
                        &recv_session,
                        ValidationError::malformed_frame("binary frames are not supported"),
                    );
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Protocol-level keepalive, answered by axum
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(&mut session);
}

/// Writes one delivery. Returns false once the connection should stop.
async fn write_delivery(sink: &mut SplitSink<WebSocket, Message>, delivery: Delivery) -> bool {
    match delivery {
        Delivery::Event(message) => {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(event = %message.event, error = %e, "Failed to encode event");
                    return true;
                }
            };
            sink.send(Message::Text(text)).await.is_ok()
        }
        Delivery::Close(reason) => {
            let frame = CloseFrame {
                code: reason.code(),
                reason: reason.as_str().into(),
            };
            let _ = sink.send(Message::Close(Some(frame))).await;
            false
        }
    }
}
