//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Stored procedure failed or the database is unreachable (500)
    #[error(transparent)]
    Database(#[from] DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Database(err) => {
                tracing::error!(error = %err, "Database execution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database execution failed".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let bad = ApiError::BadRequest("missing field".to_string()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let db = ApiError::from(DbError::link_failure("reset")).into_response();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
