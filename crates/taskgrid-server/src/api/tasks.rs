use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use taskgrid_shared::permissions::can_access;
use taskgrid_shared::protocol::{ServerEvent, TaskDeleted};
use taskgrid_shared::selectors::select_accessible_tasks;
use taskgrid_shared::views::{apply_view, SortDirection, TaskFilter, TaskSort, TaskSortKey};
use taskgrid_shared::{NotificationKind, Permission, Priority, Task, TaskStatus};
use taskgrid_store::shares::ShareTarget;
use taskgrid_store::{NewTask, TaskUpdate};

use super::{double_option, require_list, require_task, AppState};
use crate::auth::{validate_name, AuthUser};
use crate::error::ServerError;
use crate::rooms::{task_audience, RoomKey};

/// Query string of `GET /tasks`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    favorite: Option<bool>,
    list_id: Option<Uuid>,
    search: Option<String>,
    sort: Option<TaskSortKey>,
    direction: Option<SortDirection>,
}

impl TaskQuery {
    fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            favorite: self.favorite,
            list_id: self.list_id,
            search: self.search.clone(),
        }
    }

    fn sort(&self) -> Option<TaskSort> {
        match (self.sort, self.direction) {
            (None, None) => None,
            (key, direction) => Some(TaskSort::new(
                key.unwrap_or_default(),
                direction.unwrap_or_default(),
            )),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    name: String,
    description: Option<String>,
    #[serde(default)]
    status: TaskStatus,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    favorite: bool,
    due_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    favorite: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    due_date: Option<Option<DateTime<Utc>>>,
}

impl From<UpdateTaskRequest> for TaskUpdate {
    fn from(req: UpdateTaskRequest) -> Self {
        TaskUpdate {
            name: req.name,
            description: req.description,
            status: req.status,
            priority: req.priority,
            favorite: req.favorite,
            due_date: req.due_date,
        }
    }
}

#[derive(Deserialize)]
pub struct ShareTaskRequest {
    email: String,
    permission: Permission,
}

/// `GET /tasks`: every task the caller can see, filtered and sorted.
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, ServerError> {
    let snapshot = state.db.lock().await.load_snapshot(auth.user.id)?;
    let visible = select_accessible_tasks(&snapshot);
    let tasks = apply_view(visible, &query.filter(), query.sort())
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(tasks))
}

/// `POST /lists/:id/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(list_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ServerError> {
    validate_name(&req.name, "Task name")?;
    let hub = state.bridge.hub()?;

    let (task, audience) = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        require_list(&snapshot, list_id, Permission::Edit)?;

        let new = NewTask {
            name: req.name,
            description: req.description,
            status: req.status,
            priority: req.priority,
            favorite: req.favorite,
            due_date: req.due_date,
        };
        let task = db.create_task(list_id, &new)?;
        let audience = task_audience(&snapshot, &task);
        (task, audience)
    };

    hub.broadcast_many(&audience, &ServerEvent::TaskCreated(task.clone()))
        .await;

    info!(task = %task.id, list = %list_id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /tasks/:id`
pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ServerError> {
    let snapshot = state.db.lock().await.load_snapshot(auth.user.id)?;
    let task = require_task(&snapshot, id, Permission::View)?;
    Ok(Json(task.clone()))
}

/// `PUT /tasks/:id`
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ServerError> {
    if let Some(name) = &req.name {
        validate_name(name, "Task name")?;
    }
    let hub = state.bridge.hub()?;

    let (task, audience) = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        require_task(&snapshot, id, Permission::Edit)?;
        let task = db.update_task(id, req.into())?;
        let audience = task_audience(&snapshot, &task);
        (task, audience)
    };

    hub.broadcast_many(&audience, &ServerEvent::TaskUpdated(task.clone()))
        .await;

    debug!(task = %id, "Task updated");
    Ok(Json(task))
}

/// `DELETE /tasks/:id`. Needs EDIT on the parent list; a direct task share
/// alone is not enough.
pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    let hub = state.bridge.hub()?;

    let (list_id, audience) = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        let task = require_task(&snapshot, id, Permission::View)?;
        if !can_access(&snapshot, task.list_id, Permission::Edit) {
            return Err(ServerError::Forbidden(format!(
                "EDIT permission required on list {}",
                task.list_id
            )));
        }
        let audience = task_audience(&snapshot, task);
        let list_id = task.list_id;
        db.delete_task(id)?;
        (list_id, audience)
    };

    hub.broadcast_many(
        &audience,
        &ServerEvent::TaskDeleted(TaskDeleted { id, list_id }),
    )
    .await;

    info!(task = %id, list = %list_id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Shares
// ---------------------------------------------------------------------------

/// `POST /tasks/:id/shares`
pub async fn share_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ShareTaskRequest>,
) -> Result<Json<Task>, ServerError> {
    let hub = state.bridge.hub()?;

    let (task, audience, grantee, notification) = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        let task = require_task(&snapshot, id, Permission::Admin)?;

        let invitee = db
            .find_user_by_email(&req.email)?
            .ok_or_else(|| ServerError::NotFound("No user with that email".into()))?;
        if invitee.id == auth.user.id {
            return Err(ServerError::BadRequest(
                "Cannot change your own share".into(),
            ));
        }

        let previous = task.share_for(invitee.id).map(|s| s.permission);
        db.upsert_share(ShareTarget::Task(id), invitee.id, req.permission)?;

        let (kind, message) = match previous {
            Some(p) if p == req.permission => (None, String::new()),
            Some(_) => (
                Some(NotificationKind::PermissionChanged),
                format!(
                    "{} changed your access to task \"{}\" to {}",
                    auth.user.name, task.name, req.permission
                ),
            ),
            None => (
                Some(NotificationKind::TaskShared),
                format!(
                    "{} shared task \"{}\" with you ({})",
                    auth.user.name, task.name, req.permission
                ),
            ),
        };
        let notification = match kind {
            Some(kind) => Some(db.create_notification(
                invitee.id,
                kind,
                &message,
                Some(task.list_id),
                Some(id),
            )?),
            None => None,
        };

        let updated = db.get_task(id)?;
        let audience = task_audience(&snapshot, &updated);
        (updated, audience, invitee.id, notification)
    };

    if let Some(notification) = notification {
        hub.broadcast(
            RoomKey::User(grantee),
            &ServerEvent::NotificationCreated(notification),
        )
        .await;
    }
    hub.broadcast_many(&audience, &ServerEvent::TaskUpdated(task.clone()))
        .await;

    info!(task = %id, user = %grantee, permission = %req.permission, "Task shared");
    Ok(Json(task))
}

/// `DELETE /tasks/:id/shares/:user_id`
pub async fn remove_task_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    let hub = state.bridge.hub()?;

    let (task, audience) = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        let before = require_task(&snapshot, id, Permission::Admin)?;
        // Computed before removal so the former sharee hears about it too.
        let audience = task_audience(&snapshot, before);

        if !db.remove_share(ShareTarget::Task(id), user_id)? {
            return Err(ServerError::NotFound(format!(
                "user {user_id} has no share on task {id}"
            )));
        }
        (db.get_task(id)?, audience)
    };

    hub.broadcast_many(&audience, &ServerEvent::TaskUpdated(task))
        .await;

    info!(task = %id, user = %user_id, "Task share removed");
    Ok(StatusCode::NO_CONTENT)
}
