//! HTTP error type for the API
//!
//! Every handler returns [`ApiResult`]. Errors render as
//! `{"error": {"code": "...", "message": "..."}}`; schedule conflicts add a
//! `conflicts` array.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::services::scheduling::Conflict;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict (409): duplicate key, illegal transition, record in use
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Schedule overlaps (409)
    #[error("Schedule conflict: {} overlapping occurrence(s)", .0.len())]
    ScheduleConflict(Vec<Conflict>),

    /// Request body too large (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<stagehand_common::Error> for ApiError {
    fn from(err: stagehand_common::Error) -> Self {
        use stagehand_common::Error as E;

        if err.is_unique_violation() {
            return ApiError::Conflict("A record with the same unique value already exists".into());
        }

        match err {
            E::NotFound(msg) => ApiError::NotFound(msg),
            E::InvalidInput(msg) => ApiError::BadRequest(msg),
            E::Conflict(msg) => ApiError::Conflict(msg),
            E::Unauthorized(msg) => ApiError::Unauthorized(msg),
            E::Forbidden(msg) => ApiError::Forbidden(msg),
            E::Database(e) => {
                error!("Database error: {}", e);
                ApiError::Internal("Database error".into())
            }
            E::Io(e) => {
                error!("IO error: {}", e);
                ApiError::Internal("IO error".into())
            }
            E::Config(msg) | E::Internal(msg) => {
                error!("Internal error: {}", msg);
                ApiError::Internal(msg)
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        stagehand_common::Error::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, conflicts) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            ApiError::ScheduleConflict(conflicts) => (
                StatusCode::CONFLICT,
                "SCHEDULE_CONFLICT",
                format!("{} overlapping occurrence(s)", conflicts.len()),
                Some(conflicts),
            ),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg, None)
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
                None,
            ),
        };

        let body = match conflicts {
            Some(conflicts) => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                    "conflicts": conflicts,
                }
            }),
            None => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_errors_map_to_status() {
        let cases = [
            (stagehand_common::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (stagehand_common::Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (stagehand_common::Error::Conflict("x".into()), StatusCode::CONFLICT),
            (stagehand_common::Error::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (stagehand_common::Error::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (stagehand_common::Error::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_database_error_hides_details() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        match err {
            ApiError::Internal(msg) => assert_eq!(msg, "Database error"),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }
}
