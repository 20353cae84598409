use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message payload carried on the ingestion queue.
///
/// `receive_count` increments on every delivery and is the sole input to the
/// dead-letter decision. `message_id` keeps in-flight bookkeeping unambiguous
/// when the same object key is enqueued more than once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueMessage {
    pub message_id: Uuid,
    pub object_key: String,
    pub receive_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// The two ways work enters the pipeline: an object-store "created"
/// notification from the upload trigger, or a delivery from the ingestion
/// queue. Each variant has exactly one handler in `services::pipeline`.
#[derive(Debug, Clone)]
pub enum IngestionEvent {
    Created { object_key: String },
    Queued(QueueMessage),
}
