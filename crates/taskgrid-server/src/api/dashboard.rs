use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use taskgrid_shared::selectors::{select_accessible_lists, select_accessible_tasks};
use taskgrid_shared::views::DashboardStats;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Serialize)]
pub struct DashboardResponse {
    lists: usize,
    #[serde(flatten)]
    stats: DashboardStats,
}

/// `GET /dashboard`: counts over everything the caller can see.
pub async fn dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<DashboardResponse>, ServerError> {
    let snapshot = state.db.lock().await.load_snapshot(auth.user.id)?;
    let tasks = select_accessible_tasks(&snapshot);

    Ok(Json(DashboardResponse {
        lists: select_accessible_lists(&snapshot).len(),
        stats: DashboardStats::compute(&tasks, Utc::now()),
    }))
}
