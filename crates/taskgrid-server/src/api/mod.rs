//! HTTP API: router assembly, shared state and access checks.
//!
//! Every protected handler follows the same shape: lock the store, load the
//! caller's [`Snapshot`], check access, mutate, release the lock, then tell
//! the affected rooms.
//!
//! The store is a single SQLite connection behind an async mutex. Its calls
//! are short indexed queries and run inline; password hashing is the only
//! CPU-heavy step and goes through `spawn_blocking` (see [`crate::auth`]).

mod dashboard;
mod lists;
mod notifications;
mod tasks;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::Method;
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use taskgrid_shared::permissions::{list_permission, task_permission};
use taskgrid_shared::{List, Permission, Snapshot, Task};
use taskgrid_store::Database;

use crate::auth;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::realtime::{ws_handler, RealtimeBridge};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub bridge: Arc<RealtimeBridge>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, bridge: Arc<RealtimeBridge>, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            bridge,
            rate_limiter: RateLimiter::from_config(&config),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(ws_handler))
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/me",
            get(auth::me).patch(auth::update_me).delete(auth::delete_me),
        )
        // Lists
        .route("/lists", get(lists::list_lists).post(lists::create_list))
        .route(
            "/lists/:id",
            get(lists::get_list)
                .put(lists::update_list)
                .delete(lists::delete_list),
        )
        .route("/lists/:id/shares", post(lists::share_list))
        .route(
            "/lists/:id/shares/:user_id",
            put(lists::update_list_share).delete(lists::remove_list_share),
        )
        .route("/lists/:id/tasks", post(tasks::create_task))
        // Tasks
        .route("/tasks", get(tasks::list_tasks))
        .route(
            "/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/:id/shares", post(tasks::share_task))
        .route(
            "/tasks/:id/shares/:user_id",
            axum::routing::delete(tasks::remove_task_share),
        )
        // Inbox and overview
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/dashboard", get(dashboard::dashboard))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Service endpoints
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
    realtime: bool,
    connections: usize,
    rooms: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    let (connections, rooms) = match state.bridge.hub() {
        Ok(hub) => (hub.connection_count().await, hub.room_count().await),
        Err(_) => (0, 0),
    };
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
        realtime: state.bridge.is_initialized(),
        connections,
        rooms,
    })
}

// ---------------------------------------------------------------------------
// Access checks
// ---------------------------------------------------------------------------

/// The list, if the caller holds at least `required` on it.
///
/// A list the caller cannot see at all is reported as missing; a visible
/// list with too low a level is forbidden.
pub(crate) fn require_list(
    snapshot: &Snapshot,
    list_id: Uuid,
    required: Permission,
) -> Result<&List, ServerError> {
    let missing = || ServerError::NotFound(format!("list {list_id}"));
    let held = list_permission(snapshot, list_id).ok_or_else(missing)?;
    if !held.satisfies(required) {
        return Err(ServerError::Forbidden(format!(
            "{required} permission required on list {list_id}"
        )));
    }
    snapshot.list(list_id).ok_or_else(missing)
}

/// Task counterpart of [`require_list`], using the task's effective level.
pub(crate) fn require_task(
    snapshot: &Snapshot,
    task_id: Uuid,
    required: Permission,
) -> Result<&Task, ServerError> {
    let missing = || ServerError::NotFound(format!("task {task_id}"));
    let held = task_permission(snapshot, task_id).ok_or_else(missing)?;
    if !held.satisfies(required) {
        return Err(ServerError::Forbidden(format!(
            "{required} permission required on task {task_id}"
        )));
    }
    snapshot.task(task_id).ok_or_else(missing)
}

/// Deserialize a nullable field so that an absent key stays `None` and an
/// explicit `null` becomes `Some(None)`. Pair with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}
