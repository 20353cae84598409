use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::models::catalog::Label;

/// Upper bound on labels requested per image.
const MAX_LABELS: u32 = 10;
/// Labels below this confidence (percent) are not returned.
const MIN_CONFIDENCE: f64 = 50.0;
/// Bound on one labeling call; a stuck call must never outlive the queue
/// message's visibility window by much.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the external labeling function: image bytes in, detected
/// labels (ordered by descending confidence) out.
pub struct LabelerClient {
    http: Client,
    endpoint: String,
    api_token: String,
}

#[derive(Deserialize)]
struct LabelResponse {
    labels: Vec<Label>,
}

impl LabelerClient {
    pub fn new(endpoint: String, api_token: String) -> Result<Self, LabelerError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint,
            api_token,
        })
    }

    /// Send image bytes to the labeling function. An image in which nothing
    /// is detected yields an empty vector, which the caller records as an
    /// explicit "no labels found" result.
    pub async fn label_image(&self, image_bytes: &[u8]) -> Result<Vec<Label>, LabelerError> {
        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(image_bytes),
            "max_labels": MAX_LABELS,
            "min_confidence": MIN_CONFIDENCE,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LabelerError::Status(response.status().as_u16()));
        }

        let body: LabelResponse = response.json().await?;
        Ok(body.labels)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LabelerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("labeling function returned status {0}")]
    Status(u16),
}
