use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{List, Notification, Task};

/// Messages a connected client sends over the real-time socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Subscribe to direct notifications for this user id
    #[serde(rename = "join_user")]
    JoinUser(Uuid),

    /// Subscribe to change events for a list
    #[serde(rename = "join_list")]
    JoinList(Uuid),

    /// Stop receiving change events for a list
    #[serde(rename = "leave_list")]
    LeaveList(Uuid),
}

/// Messages the server pushes to rooms.
///
/// Receivers treat every event as "your copy may be stale" and refetch;
/// nothing guarantees the stream is complete or ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "task:created")]
    TaskCreated(Task),

    #[serde(rename = "task:updated")]
    TaskUpdated(Task),

    #[serde(rename = "task:deleted")]
    TaskDeleted(TaskDeleted),

    #[serde(rename = "list:created")]
    ListCreated(List),

    #[serde(rename = "list:updated")]
    ListUpdated(List),

    #[serde(rename = "list:deleted")]
    ListDeleted(ListDeleted),

    #[serde(rename = "notification:created")]
    NotificationCreated(Notification),

    /// A client request was rejected
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeleted {
    pub id: Uuid,
    pub list_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDeleted {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ClientEvent {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerEvent {
    /// The wire event name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::TaskCreated(_) => "task:created",
            ServerEvent::TaskUpdated(_) => "task:updated",
            ServerEvent::TaskDeleted(_) => "task:deleted",
            ServerEvent::ListCreated(_) => "list:created",
            ServerEvent::ListUpdated(_) => "list:updated",
            ServerEvent::ListDeleted(_) => "list:deleted",
            ServerEvent::NotificationCreated(_) => "notification:created",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
