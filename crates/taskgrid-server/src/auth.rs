//! Account and session endpoints, and the [`AuthUser`] extractor every
//! protected route uses.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use taskgrid_shared::constants::{MAX_NAME_LEN, MIN_PASSWORD_LEN};
use taskgrid_shared::protocol::{ListDeleted, ServerEvent};
use taskgrid_shared::User;
use taskgrid_store::password::{hash_password, verify_password};

use crate::api::AppState;
use crate::error::ServerError;
use crate::rooms::{list_audience, RoomKey};

/// The user behind the request's bearer token.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

pub async fn resolve_session(state: &AppState, token: &str) -> Result<User, ServerError> {
    let db = state.db.lock().await;
    db.session_user(token)?.ok_or(ServerError::Unauthorized)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ServerError::Unauthorized)?;
        let user = resolve_session(state, &token).await?;
        Ok(AuthUser { user, token })
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    name: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct UpdateMeRequest {
    name: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    token: String,
    user: User,
}

pub(crate) fn validate_name(name: &str, what: &str) -> Result<(), ServerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServerError::BadRequest(format!("{what} must not be empty")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServerError::BadRequest(format!(
            "{what} is longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("Registration is closed".into()));
    }
    let email = req.email.trim();
    if !email.contains('@') {
        return Err(ServerError::BadRequest("Invalid email address".into()));
    }
    validate_name(&req.name, "Name")?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServerError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if state.db.lock().await.find_user_by_email(email)?.is_some() {
        return Err(ServerError::Conflict(format!("email already registered: {email}")));
    }

    // Hashing runs on a blocking thread, outside the store lock.
    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let db = state.db.lock().await;
    let user = db.create_user(email, &req.name, &hash)?;
    let token = db.create_session(user.id, state.config.session_ttl())?;

    info!(user = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(SessionResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ServerError> {
    let record = state.db.lock().await.login_record(&req.email)?;
    let Some((user, stored)) = record else {
        debug!("Rejected login for unknown email");
        return Err(ServerError::Unauthorized);
    };

    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await?;
    if !valid {
        debug!(user = %user.id, "Rejected login");
        return Err(ServerError::Unauthorized);
    }
    let token = state
        .db
        .lock()
        .await
        .create_session(user.id, state.config.session_ttl())?;

    info!(user = %user.id, "User logged in");
    Ok(Json(SessionResponse { token, user }))
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode, ServerError> {
    state.db.lock().await.delete_session(&auth.token)?;
    debug!(user = %auth.user.id, "Session ended");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<User>, ServerError> {
    validate_name(&req.name, "Name")?;
    let user = state.db.lock().await.update_user_name(auth.user.id, &req.name)?;
    Ok(Json(user))
}

/// Delete the account. Owned lists go with it, so everyone who could see
/// them is told, and every socket of the deleted user is dropped.
pub async fn delete_me(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode, ServerError> {
    let hub = state.bridge.hub()?;
    let user_id = auth.user.id;

    let owned: Vec<_> = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(user_id)?;
        let owned = snapshot
            .lists
            .iter()
            .filter(|l| l.owner_id == user_id)
            .map(|l| (l.id, list_audience(&snapshot, l.id)))
            .collect();
        db.delete_user(user_id)?;
        owned
    };

    let dropped = hub.disconnect_user(user_id).await;
    for (list_id, audience) in &owned {
        hub.broadcast_many(audience, &ServerEvent::ListDeleted(ListDeleted { id: *list_id }))
            .await;
        hub.close_room(RoomKey::List(*list_id)).await;
    }

    info!(
        user = %user_id,
        lists = owned.len(),
        connections = dropped,
        "Account deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
