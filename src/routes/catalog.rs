use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::str::FromStr;

use super::ApiError;
use crate::app_state::AppState;
use crate::auth::Principal;
use crate::db::catalog;
use crate::models::api::{
    CatalogAction, CatalogQuery, DeleteResponse, FetchResponse, ListResponse,
};
use crate::services::scope::OwnershipScope;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

fn parse_action(raw: &str) -> Result<CatalogAction, ApiError> {
    CatalogAction::from_str(raw).map_err(|_| ApiError::BadRequest(format!("unknown action `{raw}`")))
}

fn require_key(query: &CatalogQuery) -> Result<String, ApiError> {
    query
        .key
        .clone()
        .ok_or_else(|| ApiError::BadRequest("missing `key` parameter".to_string()))
}

/// GET /api/v1/catalog — `action=list` or `action=fetch`, scoped to the
/// authenticated caller. A principal with no entries gets an empty list;
/// fetching an unknown key gets `entry: null`. Neither is an error.
pub async fn get_catalog(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<CatalogQuery>,
) -> Result<Response, ApiError> {
    let scope = OwnershipScope::resolve(&principal);

    match parse_action(&query.action)? {
        CatalogAction::List => {
            let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
            // The prefix filter applies regardless of the cursor value, so a
            // forged cursor cannot widen the result set.
            let entries = catalog::list_by_prefix(
                &state.db,
                &scope.key_prefix,
                query.cursor.as_deref(),
                limit,
            )
            .await?;

            let next_cursor = if entries.len() == limit as usize {
                entries.last().map(|e| e.image_key.clone())
            } else {
                None
            };

            Ok(Json(ListResponse {
                entries,
                next_cursor,
            })
            .into_response())
        }
        CatalogAction::Fetch => {
            let key = require_key(&query)?;
            if !scope.permits(&key) {
                return Err(ApiError::Forbidden(
                    "key is outside the caller's namespace".to_string(),
                ));
            }

            let entry = catalog::get_entry(&state.db, &key).await?;
            Ok(Json(FetchResponse { entry }).into_response())
        }
        CatalogAction::Delete => Err(ApiError::BadRequest(
            "delete requires the DELETE method".to_string(),
        )),
    }
}

/// DELETE /api/v1/catalog — `action=delete&key=...`. Removes the source
/// object, the thumbnail (if recorded), then the catalog row. Deleting a key
/// with no entry is idempotent success; a failure partway through is
/// reported explicitly, never swallowed.
pub async fn delete_catalog(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<DeleteResponse>, ApiError> {
    match parse_action(&query.action)? {
        CatalogAction::Delete => {}
        other => {
            return Err(ApiError::BadRequest(format!(
                "action `{other}` requires the GET method"
            )))
        }
    }

    let key = require_key(&query)?;
    let scope = OwnershipScope::resolve(&principal);
    if !scope.permits(&key) {
        return Err(ApiError::Forbidden(
            "key is outside the caller's namespace".to_string(),
        ));
    }

    // All checks precede the first side effect; the request is abortable up
    // to this point.
    let entry = catalog::get_entry(&state.db, &key).await?;
    let mut completed: Vec<&'static str> = Vec::new();

    if let Err(e) = state.images.delete_object(&key).await {
        return Err(ApiError::PartialDelete {
            completed,
            failed: "source object",
            detail: e.to_string(),
        });
    }
    completed.push("source object");

    if let Some(thumbnail_key) = entry.as_ref().and_then(|e| e.thumbnail_key.as_deref()) {
        if let Err(e) = state.thumbnails.delete_object(thumbnail_key).await {
            return Err(ApiError::PartialDelete {
                completed,
                failed: "thumbnail object",
                detail: e.to_string(),
            });
        }
        completed.push("thumbnail object");
    }

    let deleted = catalog::delete_entry(&state.db, &key)
        .await
        .map_err(|e| ApiError::PartialDelete {
            completed: completed.clone(),
            failed: "catalog row",
            detail: e.to_string(),
        })?;

    tracing::info!(image_key = %key, deleted, "catalog delete");

    Ok(Json(DeleteResponse {
        image_key: key,
        deleted,
    }))
}
