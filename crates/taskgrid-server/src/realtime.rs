//! WebSocket endpoint and the process-wide room bridge.
//!
//! A socket authenticates with its session token, registers with the
//! [`RoomHub`], then joins rooms on request:
//!
//! - `join_user(id)` only for the authenticated user's own id
//! - `join_list(id)` only for lists the user can at least VIEW
//! - `leave_list(id)` always
//!
//! Membership lives only as long as the socket. Clients re-join after a
//! reconnect and refetch on every event they receive.

use std::sync::OnceLock;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use taskgrid_shared::permissions::can_access;
use taskgrid_shared::protocol::{ClientEvent, ServerEvent};
use taskgrid_shared::{Permission, Snapshot, User};

use crate::api::AppState;
use crate::auth::{bearer_token, resolve_session};
use crate::error::ServerError;
use crate::rooms::{ConnectionId, RoomHub, RoomKey};

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("real-time bridge used before initialization")]
    NotInitialized,

    #[error("real-time bridge already initialized")]
    AlreadyInitialized,
}

/// Holds the [`RoomHub`] once startup has created it.
///
/// Lookups before [`RealtimeBridge::init`] fail with
/// [`BridgeError::NotInitialized`] so a wiring mistake surfaces as an error
/// instead of silently swallowed events.
#[derive(Default)]
pub struct RealtimeBridge {
    hub: OnceLock<RoomHub>,
}

impl RealtimeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&self, queue_capacity: usize) -> Result<&RoomHub, BridgeError> {
        self.hub
            .set(RoomHub::new(queue_capacity))
            .map_err(|_| BridgeError::AlreadyInitialized)?;
        info!(queue_capacity, "Real-time bridge initialized");
        self.hub()
    }

    pub fn hub(&self) -> Result<&RoomHub, BridgeError> {
        self.hub.get().ok_or(BridgeError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.hub.get().is_some()
    }
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Connected and a member of at least one room.
    Joined(usize),
}

impl ConnectionState {
    /// State after the number of joined rooms changes.
    fn with_rooms(self, rooms: usize) -> Self {
        match self {
            ConnectionState::Connected | ConnectionState::Joined(_) if rooms > 0 => {
                ConnectionState::Joined(rooms)
            }
            ConnectionState::Joined(_) => ConnectionState::Connected,
            other => other,
        }
    }
}

/// Decide which room a client request maps to, or why it is refused.
///
/// `snapshot` must belong to the authenticated user.
pub fn authorize(snapshot: &Snapshot, event: &ClientEvent) -> Result<RoomKey, String> {
    let Some(user_id) = snapshot.user_id() else {
        return Err("not authenticated".into());
    };
    match *event {
        ClientEvent::JoinUser(id) if id == user_id => Ok(RoomKey::User(id)),
        ClientEvent::JoinUser(_) => Err("cannot join another user's room".into()),
        ClientEvent::JoinList(id) if can_access(snapshot, id, Permission::View) => {
            Ok(RoomKey::List(id))
        }
        ClientEvent::JoinList(id) => Err(format!("no access to list {id}")),
        ClientEvent::LeaveList(id) => Ok(RoomKey::List(id)),
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// `GET /ws` -- upgrade to a WebSocket after authenticating the session.
///
/// Browsers cannot set headers on WebSocket requests, so the token may come
/// from `?token=` as well as the `Authorization` header.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let token = query
        .token
        .or_else(|| bearer_token(&headers))
        .ok_or(ServerError::Unauthorized)?;
    let user = resolve_session(&state, &token).await?;

    // Fail the upgrade, not the socket, if startup never wired the bridge.
    state.bridge.hub()?;

    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, user)))
}

async fn run_connection(socket: WebSocket, state: AppState, user: User) {
    let mut conn_state = ConnectionState::Connecting;
    debug!(user = %user.id, state = ?conn_state, "Socket upgraded");

    let hub = match state.bridge.hub() {
        Ok(hub) => hub,
        Err(e) => {
            warn!(error = %e, "Dropping socket");
            return;
        }
    };

    let (conn_id, mut events) = hub.register(user.id).await;
    conn_state = ConnectionState::Connected;
    info!(user = %user.id, conn = %conn_id, state = ?conn_state, "Socket connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, event = event.name(), "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        // The hub dropped this connection (e.g. the account was deleted).
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(conn = %conn_id, error = %e, "Socket read error");
                break;
            }
        };

        if let Some(rooms) = on_client_text(&state, hub, conn_id, user.id, &text).await {
            conn_state = conn_state.with_rooms(rooms);
            debug!(conn = %conn_id, state = ?conn_state, "Room membership changed");
        }
    }

    hub.unregister(conn_id).await;
    writer.abort();
    conn_state = ConnectionState::Disconnected;
    info!(user = %user.id, conn = %conn_id, state = ?conn_state, "Socket disconnected");
}

/// Apply one text frame from a client, answering a refusal with an `error`
/// event on that connection. Returns the connection's room count when the
/// message was applied.
async fn on_client_text(
    state: &AppState,
    hub: &RoomHub,
    conn_id: ConnectionId,
    user_id: Uuid,
    text: &str,
) -> Option<usize> {
    match handle_client_message(state, hub, conn_id, user_id, text).await {
        Ok(rooms) => rooms,
        Err(reason) => {
            debug!(conn = %conn_id, %reason, "Refused client message");
            hub.send_to(conn_id, ServerEvent::error(reason)).await;
            None
        }
    }
}

async fn handle_client_message(
    state: &AppState,
    hub: &RoomHub,
    conn_id: ConnectionId,
    user_id: Uuid,
    text: &str,
) -> Result<Option<usize>, String> {
    let event = ClientEvent::from_json(text).map_err(|e| format!("invalid message: {e}"))?;

    let snapshot = {
        let db = state.db.lock().await;
        db.load_snapshot(user_id).map_err(|e| {
            warn!(error = %e, "Snapshot load failed");
            "temporarily unavailable".to_string()
        })?
    };
    let room = authorize(&snapshot, &event)?;

    match event {
        ClientEvent::JoinUser(_) | ClientEvent::JoinList(_) => Ok(hub.join(conn_id, room).await),
        ClientEvent::LeaveList(_) => Ok(Some(hub.leave(conn_id, room).await)),
    }
}
