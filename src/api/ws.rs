//! Real-time chat websocket.
//!
//! GET /ws upgrades an authenticated request. The server pushes every
//! [`ServerEvent`](crate::services::ServerEvent) addressed to the caller as a
//! `{"type": ..., "data": ...}` text frame and pings every 30 seconds.
//! Clients that cannot set headers pass `?token=` instead.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Extension, Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::{middleware::AuthUser, services::ChatHub, AppState};

const PING_INTERVAL_SECS: u64 = 30;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

#[axum::debug_handler]
async fn ws_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, hub, auth))
}

async fn handle_connection(socket: WebSocket, hub: ChatHub, user: AuthUser) {
    info!(user_id = %user.user_id, "Chat client connected");

    if let Err(e) = run_connection(socket, hub, &user).await {
        error!(error = %e, user_id = %user.user_id, "Chat connection error");
    }

    info!(user_id = %user.user_id, "Chat client disconnected");
}

async fn run_connection(socket: WebSocket, hub: ChatHub, user: &AuthUser) -> anyhow::Result<()> {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut events = hub.subscribe();

    let mut ping_interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    // The first tick completes immediately.
    ping_interval.tick().await;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!(user_id = %user.user_id, "Received pong");
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(user_id = %user.user_id, "Client closed connection");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        // Clients send through the HTTP API.
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, user_id = %user.user_id, "WebSocket error");
                        break;
                    }
                    None => break,
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) if event.is_for(&user.user_id) => {
                        let json = serde_json::to_string(&event.event)?;
                        if let Err(e) = ws_tx.send(Message::Text(json)).await {
                            warn!(error = %e, "Failed to push event to client");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user.user_id, skipped, "Chat client lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                    warn!(error = %e, "Failed to send ping");
                    break;
                }
            }
        }
    }

    Ok(())
}
