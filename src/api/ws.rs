//! WebSocket endpoint streaming lifecycle events to connected clients.
//!
//! Clients connect with their session token as a query parameter (browsers
//! cannot set custom headers on WebSocket upgrades). Each event arrives as
//! one JSON text frame; clients treat it as a signal to refetch the relevant
//! listing, never as an authoritative delta.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

use super::auth::get_current_user;

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: Option<String>,
}

/// WebSocket endpoint for lifecycle events
/// GET /api/events?token=...
pub async fn events_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let token = query.token.ok_or(StatusCode::UNAUTHORIZED)?;
    if get_current_user(&state.db, &token).await.is_err() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(ws.on_upgrade(move |socket| handle_event_stream(socket, state)))
}

async fn handle_event_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            return;
                        }
                    }
                    // A lagging client dropped some events; it reconciles on
                    // its next fetch, so just keep streaming.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event subscriber lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => {
                        return;
                    }
                }
            }

            // Handle incoming messages (for ping/pong or close)
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}
