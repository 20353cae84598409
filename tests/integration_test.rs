use photo_catalog::{
    app_state::AppState,
    auth::TokenVerifier,
    config::AppConfig,
    db::{self, catalog},
    models::catalog::{CatalogEntry, EntryState, Label},
    models::event::IngestionEvent,
    services::{
        labeler::LabelerClient,
        pipeline,
        queue::{Dequeued, IngestionQueue},
        storage::ObjectStore,
    },
};

use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

/// Build the full application state from environment configuration.
///
/// These tests require a running PostgreSQL, Redis, and S3-compatible store
/// (MinIO works), configured via environment variables or `.env`.
/// Run with: cargo test --test integration_test -- --ignored
async fn test_state() -> AppState {
    let config = AppConfig::from_env().expect("Failed to load config");

    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run migrations");

    let images = ObjectStore::new(
        &config.image_bucket,
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize image bucket");

    let thumbnails = ObjectStore::new(
        &config.thumbnail_bucket,
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize thumbnail bucket");

    let queue = IngestionQueue::new(
        &config.redis_url,
        config.max_receive_count,
        Duration::from_secs(config.visibility_timeout_secs),
    )
    .expect("Failed to initialize queue");

    let labeler = LabelerClient::new(
        config.labeler_endpoint.clone(),
        config.labeler_api_token.clone(),
    )
    .expect("Failed to initialize labeler");

    let auth = TokenVerifier::new(&config.auth_jwt_secret);

    AppState::new(
        db_pool,
        images,
        thumbnails,
        queue,
        labeler,
        auth,
        config.ingest_token.clone(),
    )
}

fn unique_key(principal: &str) -> String {
    format!("private/{}/img-{}.jpg", principal, Uuid::new_v4())
}

fn labeled_entry(key: &str, labels: Vec<Label>) -> CatalogEntry {
    CatalogEntry {
        image_key: key.to_string(),
        state: EntryState::Labeled,
        labels: Some(labels),
        thumbnail_key: Some(key.to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A message that keeps failing is redelivered up to the receive cap, then
/// routed to the dead-letter list instead of being handed out again.
#[tokio::test]
#[ignore] // Requires live Redis
async fn test_retry_then_dead_letter() {
    let state = test_state().await;
    let key = unique_key("it-dlq");

    state.queue.enqueue(&key).await.expect("enqueue failed");

    // First delivery fails.
    let first = dequeue_key(&state, &key).await;
    match &first {
        Dequeued::Ready(m) => assert_eq!(m.receive_count, 1),
        other => panic!("expected first delivery, got {other:?}"),
    }
    if let Dequeued::Ready(m) = first {
        state.queue.nack(&m).await.expect("nack failed");
    }

    // Second delivery (the cap with max_receive_count = 2) fails too.
    let second = dequeue_key(&state, &key).await;
    match &second {
        Dequeued::Ready(m) => assert_eq!(m.receive_count, 2),
        other => panic!("expected second delivery, got {other:?}"),
    }
    if let Dequeued::Ready(m) = second {
        state.queue.nack(&m).await.expect("nack failed");
    }

    // The would-be third delivery is routed to the dead-letter list.
    match dequeue_key(&state, &key).await {
        Dequeued::DeadLettered(m) => {
            assert_eq!(m.object_key, key);
            assert_eq!(m.receive_count, 3);
        }
        other => panic!("expected dead-letter routing, got {other:?}"),
    }

    assert!(
        state.queue.dead_letter_depth().await.expect("depth failed") > 0,
        "dead-letter list should hold the message"
    );
}

/// Pull deliveries until one for `key` appears, so the test tolerates
/// leftover messages from earlier runs.
async fn dequeue_key(state: &AppState, key: &str) -> Dequeued {
    for _ in 0..50 {
        match state.queue.dequeue().await.expect("dequeue failed") {
            Some(Dequeued::Ready(m)) if m.object_key == key => return Dequeued::Ready(m),
            Some(Dequeued::DeadLettered(m)) if m.object_key == key => {
                return Dequeued::DeadLettered(m)
            }
            Some(Dequeued::Ready(m)) => {
                // Not ours; put it back.
                state.queue.nack(&m).await.expect("nack failed");
            }
            Some(Dequeued::DeadLettered(_)) | None => {}
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("message for {key} never surfaced");
}

/// The upsert is keyed on `image_key`: redelivery never duplicates rows, and
/// a labeled entry (cat.jpg labeled "cat" at 0.98) reads back intact.
#[tokio::test]
#[ignore] // Requires live PostgreSQL
async fn test_catalog_upsert_idempotent() {
    let state = test_state().await;
    let key = unique_key("it-upsert");

    let entry = labeled_entry(
        &key,
        vec![Label {
            name: "cat".to_string(),
            confidence: 0.98,
        }],
    );

    catalog::upsert_entry(&state.db, &entry)
        .await
        .expect("first upsert failed");
    catalog::upsert_entry(&state.db, &entry)
        .await
        .expect("second upsert failed");

    let fetched = catalog::get_entry(&state.db, &key)
        .await
        .expect("get failed")
        .expect("entry not found");

    assert_eq!(fetched.state, EntryState::Labeled);
    assert_eq!(
        fetched.labels.as_deref(),
        Some(
            &[Label {
                name: "cat".to_string(),
                confidence: 0.98,
            }][..]
        )
    );

    let page = catalog::list_by_prefix(&state.db, "private/it-upsert/", None, 100)
        .await
        .expect("list failed");
    assert_eq!(
        page.iter().filter(|e| e.image_key == key).count(),
        1,
        "duplicate upserts must collapse into one row"
    );

    // Cleanup; the second delete is the idempotent no-op case.
    assert!(catalog::delete_entry(&state.db, &key).await.expect("delete failed"));
    assert!(!catalog::delete_entry(&state.db, &key).await.expect("delete failed"));
}

/// `mark_failed` records abandonment but never downgrades a labeled entry.
#[tokio::test]
#[ignore] // Requires live PostgreSQL
async fn test_mark_failed_preserves_labeled_entries() {
    let state = test_state().await;

    // Dead-letter before any entry exists: a failed row appears.
    let orphan_key = unique_key("it-failed");
    catalog::mark_failed(&state.db, &orphan_key)
        .await
        .expect("mark_failed failed");
    let orphan = catalog::get_entry(&state.db, &orphan_key)
        .await
        .expect("get failed")
        .expect("entry not created");
    assert_eq!(orphan.state, EntryState::Failed);

    // Dead-letter racing a successful duplicate: the label survives.
    let labeled_key = unique_key("it-failed");
    catalog::upsert_entry(
        &state.db,
        &labeled_entry(
            &labeled_key,
            vec![Label {
                name: "dog".to_string(),
                confidence: 0.91,
            }],
        ),
    )
    .await
    .expect("upsert failed");
    catalog::mark_failed(&state.db, &labeled_key)
        .await
        .expect("mark_failed failed");
    let survivor = catalog::get_entry(&state.db, &labeled_key)
        .await
        .expect("get failed")
        .expect("entry missing");
    assert_eq!(survivor.state, EntryState::Labeled);

    catalog::delete_entry(&state.db, &orphan_key).await.ok();
    catalog::delete_entry(&state.db, &labeled_key).await.ok();
}

/// Listing is prefix-scoped and pages restartably via the cursor.
#[tokio::test]
#[ignore] // Requires live PostgreSQL
async fn test_list_scoping_and_pagination() {
    let state = test_state().await;
    let run = Uuid::new_v4().simple().to_string();
    let prefix = format!("private/it-list-{run}/");

    let mut keys: Vec<String> = (0..5)
        .map(|i| format!("{prefix}img-{i}.jpg"))
        .collect();
    keys.sort();

    for key in &keys {
        catalog::upsert_entry(&state.db, &labeled_entry(key, Vec::new()))
            .await
            .expect("upsert failed");
    }

    // Another principal's listing must not see these rows.
    let foreign = catalog::list_by_prefix(&state.db, "private/somebody-else/", None, 100)
        .await
        .expect("list failed");
    assert!(foreign.iter().all(|e| !e.image_key.starts_with(&prefix)));

    // Page through in twos and reassemble the full set.
    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = catalog::list_by_prefix(&state.db, &prefix, cursor.as_deref(), 2)
            .await
            .expect("list failed");
        if page.is_empty() {
            break;
        }
        cursor = page.last().map(|e| e.image_key.clone());
        collected.extend(page.into_iter().map(|e| e.image_key));
    }
    assert_eq!(collected, keys);

    for key in &keys {
        catalog::delete_entry(&state.db, key).await.ok();
    }
}

/// End-to-end minus the external labeler: upload, notify, dequeue, store a
/// result, ack, and verify object-store round trips.
#[tokio::test]
#[ignore] // Requires live PostgreSQL, Redis, and S3
async fn test_upload_notify_dequeue_flow() {
    let state = test_state().await;
    let key = unique_key("it-flow");
    let image_bytes = b"fake image data for testing";

    // 1. Upload the source object.
    state
        .images
        .put_object(&key, image_bytes, "image/jpeg")
        .await
        .expect("upload failed");

    // 2. The trigger notifies; the Created event enqueues a message.
    pipeline::handle_event(
        &state,
        IngestionEvent::Created {
            object_key: key.clone(),
        },
    )
    .await
    .expect("notification handling failed");

    // 3. A consumer picks it up.
    let message = match dequeue_key(&state, &key).await {
        Dequeued::Ready(m) => m,
        other => panic!("expected a ready delivery, got {other:?}"),
    };
    assert_eq!(message.receive_count, 1);

    // 4. Object fetch round-trips.
    let downloaded = state.images.get_object(&key).await.expect("download failed");
    assert_eq!(downloaded, image_bytes);

    // 5. Record the outcome and ack.
    catalog::upsert_entry(
        &state.db,
        &labeled_entry(
            &key,
            vec![Label {
                name: "cat".to_string(),
                confidence: 0.98,
            }],
        ),
    )
    .await
    .expect("upsert failed");
    state.queue.ack(&message).await.expect("ack failed");

    let entry = catalog::get_entry(&state.db, &key)
        .await
        .expect("get failed")
        .expect("entry missing");
    assert_eq!(entry.state, EntryState::Labeled);

    // Cleanup
    state.images.delete_object(&key).await.expect("cleanup failed");
    catalog::delete_entry(&state.db, &key).await.ok();
}
