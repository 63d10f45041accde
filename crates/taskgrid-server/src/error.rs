use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use taskgrid_store::StoreError;

use crate::realtime::BridgeError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Real-time bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Background task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("Record not found".into()),
            StoreError::Conflict(msg) => ServerError::Conflict(msg),
            other => ServerError::Store(other),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::Bridge(_) | ServerError::Store(_) | ServerError::Blocking(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ServerError::NotFound("list".into()), StatusCode::NOT_FOUND),
            (ServerError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServerError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServerError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                ServerError::Bridge(BridgeError::NotInitialized),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_store_errors_map() {
        assert!(matches!(
            ServerError::from(StoreError::NotFound),
            ServerError::NotFound(_)
        ));
        assert!(matches!(
            ServerError::from(StoreError::Conflict("dup".into())),
            ServerError::Conflict(_)
        ));
    }
}
