use chrono::Utc;
use std::time::Duration;
use tokio::time::timeout;

use crate::app_state::AppState;
use crate::db::catalog;
use crate::models::catalog::{CatalogEntry, EntryState};
use crate::models::event::{IngestionEvent, QueueMessage};
use crate::services::labeler::LabelerError;
use crate::services::queue::QueueError;
use crate::services::storage::StorageError;
use crate::services::thumbnail::{self, ThumbnailError};

/// Upper bound on a single object-store fetch or upload.
const STORAGE_TIMEOUT: Duration = Duration::from_secs(20);
/// Upper bound on one labeling-function invocation. The labeler client has
/// its own HTTP timeout; this guards the whole call path.
const LABELER_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("object store: {0}")]
    Storage(#[from] StorageError),

    #[error("labeling function: {0}")]
    Labeler(#[from] LabelerError),

    #[error("thumbnail rendering: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("catalog store: {0}")]
    Catalog(#[from] sqlx::Error),

    #[error("ingestion queue: {0}")]
    Queue(#[from] QueueError),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl WorkerError {
    /// Best-effort classification, used for logging only. A corrupt object
    /// cannot be told apart from a flaky decoder with certainty, so both
    /// classes follow the same retry-then-dead-letter path.
    pub fn is_transient(&self) -> bool {
        !matches!(self, WorkerError::Thumbnail(_))
    }
}

/// Dispatch one ingestion event: upload notifications are enqueued, queue
/// deliveries run the labeling pipeline.
pub async fn handle_event(state: &AppState, event: IngestionEvent) -> Result<(), WorkerError> {
    match event {
        IngestionEvent::Created { object_key } => {
            state.queue.enqueue(&object_key).await?;
            Ok(())
        }
        IngestionEvent::Queued(message) => process_message(state, &message).await,
    }
}

/// Whether a delivery should run the labeling pipeline. A duplicate delivery
/// for an entry that already labeled successfully is a no-op, not an
/// overwrite, unless reprocessing is explicitly requested.
pub fn should_process(existing: Option<&CatalogEntry>, reprocess: bool) -> bool {
    match existing {
        Some(entry) if entry.state == EntryState::Labeled => reprocess,
        _ => true,
    }
}

/// Run the labeling pipeline for one queue delivery. The caller acks on `Ok`
/// and nacks on `Err`; nothing here touches the queue message itself.
pub async fn process_message(state: &AppState, message: &QueueMessage) -> Result<(), WorkerError> {
    let key = &message.object_key;

    let existing = catalog::get_entry(&state.db, key).await?;
    if !should_process(existing.as_ref(), false) {
        tracing::info!(
            object_key = %key,
            receive_count = message.receive_count,
            "duplicate delivery for labeled entry, skipping"
        );
        return Ok(());
    }

    // The entry exists in `pending` from the first delivery onward, so a
    // dead-lettered message always has a row to mark failed.
    if existing.is_none() {
        catalog::upsert_entry(
            &state.db,
            &CatalogEntry {
                image_key: key.clone(),
                state: EntryState::Pending,
                labels: None,
                thumbnail_key: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        )
        .await?;
    }

    let started = std::time::Instant::now();

    let bytes = timeout(STORAGE_TIMEOUT, state.images.get_object(key))
        .await
        .map_err(|_| WorkerError::Timeout("object fetch"))??;

    let labels = timeout(LABELER_TIMEOUT, state.labeler.label_image(&bytes))
        .await
        .map_err(|_| WorkerError::Timeout("labeling"))??;
    let label_count = labels.len();

    // The derived object is stored before the entry references it; a crash
    // in between leaves a pending entry and a redeliverable message, never a
    // labeled entry pointing at a missing thumbnail.
    let thumb = thumbnail::render(&bytes)?;
    timeout(
        STORAGE_TIMEOUT,
        state.thumbnails.put_object(key, &thumb, "image/jpeg"),
    )
    .await
    .map_err(|_| WorkerError::Timeout("thumbnail upload"))??;

    catalog::upsert_entry(
        &state.db,
        &CatalogEntry {
            image_key: key.clone(),
            state: EntryState::Labeled,
            labels: Some(labels),
            thumbnail_key: Some(key.clone()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
    )
    .await?;

    metrics::histogram!("label_processing_seconds").record(started.elapsed().as_secs_f64());
    metrics::counter!("label_jobs_completed_total").increment(1);

    tracing::info!(
        object_key = %key,
        label_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "image labeled"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(state: EntryState) -> CatalogEntry {
        CatalogEntry {
            image_key: "private/u1/cat.jpg".to_string(),
            state,
            labels: None,
            thumbnail_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn first_delivery_processes() {
        assert!(should_process(None, false));
    }

    #[test]
    fn pending_and_failed_entries_reprocess() {
        assert!(should_process(Some(&entry(EntryState::Pending)), false));
        assert!(should_process(Some(&entry(EntryState::Failed)), false));
    }

    #[test]
    fn labeled_entry_skips_unless_reprocess_requested() {
        assert!(!should_process(Some(&entry(EntryState::Labeled)), false));
        assert!(should_process(Some(&entry(EntryState::Labeled)), true));
    }

    #[test]
    fn decode_failures_classify_as_permanent() {
        let decode_err = thumbnail::render(b"definitely not an image").unwrap_err();
        assert!(!WorkerError::Thumbnail(decode_err).is_transient());
        assert!(WorkerError::Timeout("labeling").is_transient());
    }
}
