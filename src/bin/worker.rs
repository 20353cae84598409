use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use photo_catalog::{
    app_state::AppState,
    auth::TokenVerifier,
    config::AppConfig,
    db::{self, catalog},
    models::event::IngestionEvent,
    services::{
        labeler::LabelerClient,
        pipeline,
        queue::{Dequeued, IngestionQueue},
        storage::ObjectStore,
    },
};

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting label worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Expose worker metrics on a standalone scrape address
    let metrics_addr: SocketAddr = config
        .worker_metrics_addr
        .parse()
        .expect("Invalid worker metrics address");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus metrics exporter");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Initializing services");
    let images = ObjectStore::new(
        &config.image_bucket,
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize image bucket client");

    let thumbnails = ObjectStore::new(
        &config.thumbnail_bucket,
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize thumbnail bucket client");

    let queue = IngestionQueue::new(
        &config.redis_url,
        config.max_receive_count,
        Duration::from_secs(config.visibility_timeout_secs),
    )
    .expect("Failed to initialize ingestion queue");

    let labeler = LabelerClient::new(
        config.labeler_endpoint.clone(),
        config.labeler_api_token.clone(),
    )
    .expect("Failed to initialize labeler client");

    let auth = TokenVerifier::new(&config.auth_jwt_secret);

    let state = AppState::new(
        db_pool,
        images,
        thumbnails,
        queue,
        labeler,
        auth,
        config.ingest_token.clone(),
    );

    tracing::info!(
        concurrency = config.worker_concurrency,
        "Worker ready, starting consumers"
    );

    // Independent consumers; the queue's visibility window is the only
    // mutual exclusion between them.
    let mut handles = Vec::new();
    for consumer_id in 0..config.worker_concurrency {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            run_consumer(consumer_id, state).await;
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }
}

/// One queue consumer. Never exits: processing failures convert to a nack
/// (or a lapsed visibility window) and surface through the dead-letter path.
async fn run_consumer(consumer_id: usize, state: AppState) {
    tracing::info!(consumer_id, "consumer polling");

    loop {
        match state.queue.dequeue().await {
            Ok(Some(Dequeued::Ready(message))) => {
                let object_key = message.object_key.clone();
                tracing::info!(
                    consumer_id,
                    object_key = %object_key,
                    receive_count = message.receive_count,
                    "processing delivery"
                );

                match pipeline::handle_event(&state, IngestionEvent::Queued(message.clone())).await
                {
                    Ok(()) => {
                        if let Err(e) = state.queue.ack(&message).await {
                            tracing::error!(
                                consumer_id,
                                object_key = %object_key,
                                error = %e,
                                "ack failed, message will be redelivered"
                            );
                        }
                    }
                    Err(e) => {
                        metrics::counter!("label_jobs_failed_total").increment(1);
                        tracing::warn!(
                            consumer_id,
                            object_key = %object_key,
                            receive_count = message.receive_count,
                            transient = e.is_transient(),
                            error = %e,
                            "processing failed, returning message for retry"
                        );
                        if let Err(nack_err) = state.queue.nack(&message).await {
                            tracing::error!(
                                consumer_id,
                                object_key = %object_key,
                                error = %nack_err,
                                "nack failed, visibility timeout will recover the message"
                            );
                        }
                    }
                }
            }
            Ok(Some(Dequeued::DeadLettered(message))) => {
                tracing::warn!(
                    consumer_id,
                    object_key = %message.object_key,
                    receive_count = message.receive_count,
                    "delivery cap exceeded, message dead-lettered"
                );
                if let Err(e) = catalog::mark_failed(&state.db, &message.object_key).await {
                    tracing::error!(
                        consumer_id,
                        object_key = %message.object_key,
                        error = %e,
                        "failed to mark catalog entry failed"
                    );
                }
            }
            Ok(None) => {
                if let Ok(depth) = state.queue.depth().await {
                    metrics::gauge!("ingest_queue_depth").set(depth as f64);
                }
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(consumer_id, error = %e, "dequeue failed, backing off");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}
