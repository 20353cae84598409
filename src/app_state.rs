use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::services::{labeler::LabelerClient, queue::IngestionQueue, storage::ObjectStore};

/// Shared application state passed to route handlers and worker tasks.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub images: Arc<ObjectStore>,
    pub thumbnails: Arc<ObjectStore>,
    pub queue: Arc<IngestionQueue>,
    pub labeler: Arc<LabelerClient>,
    pub auth: Arc<TokenVerifier>,
    pub ingest_token: Option<String>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        images: ObjectStore,
        thumbnails: ObjectStore,
        queue: IngestionQueue,
        labeler: LabelerClient,
        auth: TokenVerifier,
        ingest_token: Option<String>,
    ) -> Self {
        Self {
            db,
            images: Arc::new(images),
            thumbnails: Arc::new(thumbnails),
            queue: Arc::new(queue),
            labeler: Arc::new(labeler),
            auth: Arc::new(auth),
            ingest_token,
        }
    }
}
