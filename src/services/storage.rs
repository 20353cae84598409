use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Client for one S3-compatible bucket (MinIO, R2, AWS).
///
/// The pipeline uses two instances: the source-image bucket (whose "created"
/// notifications feed the ingest webhook) and the thumbnail bucket.
pub struct ObjectStore {
    bucket: Box<Bucket>,
}

impl ObjectStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    /// Store object bytes under `key`.
    pub async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await?;
        Ok(())
    }

    /// Fetch object bytes for `key`.
    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(key).await?;
        Ok(response.to_vec())
    }

    /// Delete the object under `key`. Deleting a missing key succeeds.
    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.bucket.delete_object(key).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
