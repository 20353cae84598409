use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub mod catalog;
pub mod health;
pub mod ingest;
pub mod metrics;

/// Failure kinds surfaced by the HTTP boundary. Distinct and documented
/// rather than collapsed into one status code: ownership violations are the
/// caller's problem, internal failures are ours.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("delete partially applied; failed at {failed}")]
    PartialDelete {
        completed: Vec<&'static str>,
        failed: &'static str,
        detail: String,
    },
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, serde_json::json!({ "error": msg }))
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "internal error" }),
                )
            }
            ApiError::PartialDelete {
                completed,
                failed,
                detail,
            } => {
                tracing::error!(failed, error = %detail, "delete partially applied");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({
                        "error": "delete partially applied",
                        "completed": completed,
                        "failed": failed,
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
