use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use taskgrid_shared::permissions::{is_owner, list_permission};
use taskgrid_shared::protocol::{ListDeleted, ServerEvent};
use taskgrid_shared::selectors::{select_accessible_lists, select_accessible_tasks_in_list};
use taskgrid_shared::{List, NotificationKind, Permission, Task};
use taskgrid_store::shares::ShareTarget;

use super::{double_option, require_list, AppState};
use crate::auth::{validate_name, AuthUser};
use crate::error::ServerError;
use crate::rooms::{list_audience, RoomKey};

#[derive(Deserialize)]
pub struct CreateListRequest {
    name: String,
    description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateListRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
}

#[derive(Deserialize)]
pub struct ShareListRequest {
    email: String,
    permission: Permission,
}

#[derive(Deserialize)]
pub struct UpdateShareRequest {
    permission: Permission,
}

#[derive(Serialize)]
pub struct ListDetail {
    list: List,
    tasks: Vec<Task>,
    permission: Permission,
}

/// `GET /lists`
pub async fn list_lists(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<List>>, ServerError> {
    let snapshot = state.db.lock().await.load_snapshot(auth.user.id)?;
    let lists = select_accessible_lists(&snapshot).into_iter().cloned().collect();
    Ok(Json(lists))
}

/// `POST /lists`
pub async fn create_list(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateListRequest>,
) -> Result<(StatusCode, Json<List>), ServerError> {
    validate_name(&req.name, "List name")?;
    let hub = state.bridge.hub()?;

    let list = state
        .db
        .lock()
        .await
        .create_list(auth.user.id, &req.name, req.description.as_deref())?;

    hub.broadcast(
        RoomKey::User(auth.user.id),
        &ServerEvent::ListCreated(list.clone()),
    )
    .await;

    info!(list = %list.id, owner = %auth.user.id, "List created");
    Ok((StatusCode::CREATED, Json(list)))
}

/// `GET /lists/:id` with the tasks the caller can see in it.
pub async fn get_list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ListDetail>, ServerError> {
    let snapshot = state.db.lock().await.load_snapshot(auth.user.id)?;
    let list = require_list(&snapshot, id, Permission::View)?.clone();
    let permission = list_permission(&snapshot, id).unwrap_or_default();
    let tasks = select_accessible_tasks_in_list(&snapshot, id)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(ListDetail {
        list,
        tasks,
        permission,
    }))
}

/// `PUT /lists/:id`
pub async fn update_list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateListRequest>,
) -> Result<Json<List>, ServerError> {
    if let Some(name) = &req.name {
        validate_name(name, "List name")?;
    }
    let hub = state.bridge.hub()?;

    let list = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        require_list(&snapshot, id, Permission::Admin)?;
        let description = req.description.as_ref().map(|d| d.as_deref());
        db.update_list(id, req.name.as_deref(), description)?
    };

    hub.broadcast(RoomKey::List(id), &ServerEvent::ListUpdated(list.clone()))
        .await;
    Ok(Json(list))
}

/// `DELETE /lists/:id`, owner only. Direct task sharees are told through
/// their user rooms since they never join the list room.
pub async fn delete_list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    let hub = state.bridge.hub()?;

    let audience = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        require_list(&snapshot, id, Permission::View)?;
        if !is_owner(&snapshot, id) {
            return Err(ServerError::Forbidden(
                "Only the owner can delete a list".into(),
            ));
        }
        let audience = list_audience(&snapshot, id);
        db.delete_list(id)?;
        audience
    };

    hub.broadcast_many(&audience, &ServerEvent::ListDeleted(ListDeleted { id }))
        .await;
    hub.close_room(RoomKey::List(id)).await;

    info!(list = %id, "List deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Shares
// ---------------------------------------------------------------------------

/// `POST /lists/:id/shares`: invite a registered user by email. Only list
/// admins get to learn whether the email is registered.
pub async fn share_list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ShareListRequest>,
) -> Result<Json<List>, ServerError> {
    let invitee = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        require_list(&snapshot, id, Permission::Admin)?;
        db.find_user_by_email(&req.email)?
            .ok_or_else(|| ServerError::NotFound("No user with that email".into()))?
    };

    grant_list_share(&state, &auth, id, invitee.id, req.permission, false).await
}

/// `PUT /lists/:id/shares/:user_id`: change an existing share's level.
pub async fn update_list_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateShareRequest>,
) -> Result<Json<List>, ServerError> {
    grant_list_share(&state, &auth, id, user_id, req.permission, true).await
}

async fn grant_list_share(
    state: &AppState,
    auth: &AuthUser,
    list_id: Uuid,
    grantee: Uuid,
    permission: Permission,
    must_exist: bool,
) -> Result<Json<List>, ServerError> {
    let hub = state.bridge.hub()?;

    let (list, notification) = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        let list = require_list(&snapshot, list_id, Permission::Admin)?;

        if grantee == list.owner_id {
            return Err(ServerError::BadRequest(
                "The owner already has full access".into(),
            ));
        }
        if grantee == auth.user.id {
            return Err(ServerError::BadRequest(
                "Cannot change your own share".into(),
            ));
        }

        let previous = list.share_for(grantee).map(|s| s.permission);
        if must_exist && previous.is_none() {
            return Err(ServerError::NotFound(format!(
                "user {grantee} has no share on list {list_id}"
            )));
        }

        db.upsert_share(ShareTarget::List(list_id), grantee, permission)?;
        db.touch_list(list_id)?;

        let notification = match previous {
            Some(p) if p == permission => None,
            Some(_) => Some(db.create_notification(
                grantee,
                NotificationKind::PermissionChanged,
                &format!(
                    "{} changed your access to \"{}\" to {permission}",
                    auth.user.name, list.name
                ),
                Some(list_id),
                None,
            )?),
            None => Some(db.create_notification(
                grantee,
                NotificationKind::ListShared,
                &format!(
                    "{} shared \"{}\" with you ({permission})",
                    auth.user.name, list.name
                ),
                Some(list_id),
                None,
            )?),
        };

        (db.get_list(list_id)?, notification)
    };

    if let Some(notification) = notification {
        hub.broadcast(
            RoomKey::User(grantee),
            &ServerEvent::NotificationCreated(notification),
        )
        .await;
    }
    hub.broadcast_many(
        &[RoomKey::List(list_id), RoomKey::User(grantee)],
        &ServerEvent::ListUpdated(list.clone()),
    )
    .await;

    info!(list = %list_id, user = %grantee, %permission, "List shared");
    Ok(Json(list))
}

/// `DELETE /lists/:id/shares/:user_id`: revoke a share. Admins may revoke
/// anyone's; a sharee may always remove themself.
pub async fn remove_list_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    let hub = state.bridge.hub()?;

    let list = {
        let db = state.db.lock().await;
        let snapshot = db.load_snapshot(auth.user.id)?;
        let required = if user_id == auth.user.id {
            Permission::View
        } else {
            Permission::Admin
        };
        require_list(&snapshot, id, required)?;

        if !db.remove_share(ShareTarget::List(id), user_id)? {
            return Err(ServerError::NotFound(format!(
                "user {user_id} has no share on list {id}"
            )));
        }
        db.touch_list(id)?;
        db.get_list(id)?
    };

    hub.evict_user(user_id, RoomKey::List(id)).await;
    hub.broadcast_many(
        &[RoomKey::List(id), RoomKey::User(user_id)],
        &ServerEvent::ListUpdated(list),
    )
    .await;

    info!(list = %id, user = %user_id, "List share removed");
    Ok(StatusCode::NO_CONTENT)
}
