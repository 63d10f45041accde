use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Invalid permission level: {0}")]
    InvalidPermission(String),

    #[error("Invalid task status: {0}")]
    InvalidStatus(String),

    #[error("Invalid task priority: {0}")]
    InvalidPriority(String),

    #[error("Invalid notification kind: {0}")]
    InvalidNotificationKind(String),
}
