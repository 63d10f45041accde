use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskgrid_shared::Notification;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

#[derive(Deserialize)]
pub struct InboxQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
pub struct Inbox {
    notifications: Vec<Notification>,
    unread: usize,
}

/// `GET /notifications`, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Inbox>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let db = state.db.lock().await;
    Ok(Json(Inbox {
        notifications: db.list_notifications(auth.user.id, limit)?,
        unread: db.unread_notification_count(auth.user.id)?,
    }))
}

/// `POST /notifications/:id/read`
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    let marked = state
        .db
        .lock()
        .await
        .mark_notification_read(id, auth.user.id)?;
    if !marked {
        return Err(ServerError::NotFound(format!("notification {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
