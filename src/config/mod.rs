use serde::Deserialize;

/// Runtime configuration, loaded once at startup and handed to each
/// component at construction. Business logic never reads the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string for the catalog store
    pub database_url: String,

    /// Redis connection string for the ingestion queue
    pub redis_url: String,

    /// Bucket holding uploaded source images
    pub image_bucket: String,

    /// Bucket receiving rendered thumbnails
    pub thumbnail_bucket: String,

    /// S3-compatible endpoint URL (MinIO, R2, AWS)
    pub s3_endpoint: String,

    /// S3 access key ID
    pub s3_access_key: String,

    /// S3 secret access key
    pub s3_secret_key: String,

    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// Labeling-function endpoint (image bytes in, labels out)
    pub labeler_endpoint: String,

    /// Bearer token for the labeling function
    pub labeler_api_token: String,

    /// HS256 secret shared with the identity provider's token issuer
    pub auth_jwt_secret: String,

    /// Shared token the upload trigger must present on the ingest webhook.
    /// Unset disables the check (trusted-network deployments).
    #[serde(default)]
    pub ingest_token: Option<String>,

    /// Deliveries beyond this count are routed to the dead-letter queue
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,

    /// Seconds a dequeued message stays hidden from other consumers
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Independent consumer tasks per worker process
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Prometheus scrape address for worker processes
    #[serde(default = "default_worker_metrics_addr")]
    pub worker_metrics_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_s3_region() -> String {
    "auto".to_string()
}

fn default_max_receive_count() -> u32 {
    2
}

fn default_visibility_timeout_secs() -> u64 {
    30
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_worker_metrics_addr() -> String {
    "0.0.0.0:9100".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
