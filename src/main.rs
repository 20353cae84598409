use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use photo_catalog::app_state::AppState;
use photo_catalog::auth::TokenVerifier;
use photo_catalog::config::AppConfig;
use photo_catalog::db;
use photo_catalog::routes;
use photo_catalog::services::{
    labeler::LabelerClient, queue::IngestionQueue, storage::ObjectStore,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing photo-catalog API");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "ingest_notifications_total",
        "Upload notifications accepted by the ingest webhook"
    );
    metrics::describe_counter!(
        "label_jobs_completed_total",
        "Queue deliveries that produced a labeled catalog entry"
    );
    metrics::describe_counter!(
        "label_jobs_failed_total",
        "Queue deliveries that failed and were returned for retry"
    );
    metrics::describe_counter!(
        "catalog_dead_letters_total",
        "Messages routed to the dead-letter queue"
    );
    metrics::describe_histogram!(
        "label_processing_seconds",
        "Time to label one image end to end"
    );
    metrics::describe_gauge!(
        "ingest_queue_depth",
        "Messages waiting on the ingestion queue"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Object-store clients for the source and thumbnail buckets
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

    tracing::info!("Connecting to Redis ingestion queue");
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

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/ingest", post(routes::ingest::notify_created))
        .route(
            "/api/v1/catalog",
            get(routes::catalog::get_catalog).delete(routes::catalog::delete_catalog),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // notifications are tiny

    tracing::info!("Starting photo-catalog on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
