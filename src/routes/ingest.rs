use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use garde::Validate;

use super::ApiError;
use crate::app_state::AppState;
use crate::models::api::{IngestNotification, IngestResponse};
use crate::models::event::IngestionEvent;
use crate::services::pipeline;
use crate::services::scope::KEY_NAMESPACE;

/// Header the upload trigger uses to authenticate notifications.
const INGEST_TOKEN_HEADER: &str = "x-ingest-token";

/// POST /api/v1/ingest — object-store "created" notification webhook. The
/// trigger calls this exactly once per successful object write; the key is
/// wrapped in an `IngestionEvent::Created` and enqueued.
pub async fn notify_created(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(notification): Json<IngestNotification>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    if let Some(expected) = &state.ingest_token {
        let presented = headers
            .get(INGEST_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized("invalid ingest token".to_string()));
        }
    }

    notification
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // Notifications only fire for keys under per-principal prefixes.
    if !notification.object_key.starts_with(KEY_NAMESPACE) {
        return Err(ApiError::BadRequest(
            "object key is outside the managed namespace".to_string(),
        ));
    }

    let object_key = notification.object_key;
    pipeline::handle_event(
        &state,
        IngestionEvent::Created {
            object_key: object_key.clone(),
        },
    )
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    metrics::counter!("ingest_notifications_total").increment(1);
    tracing::info!(object_key = %object_key, "upload notification enqueued");

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            object_key,
            status: "queued".to_string(),
        }),
    ))
}
