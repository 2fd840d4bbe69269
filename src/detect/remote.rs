//! RemoteDetector - inference server adapter
//!
//! ## Responsibilities
//!
//! - Send detection requests to the inference server
//! - Handle response parsing
//! - Connection management

use super::{BBox, Detections, Detector};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;

/// Remote inference client
pub struct RemoteDetector {
    client: reqwest::Client,
    base_url: String,
}

/// Detection response (matches the inference server /v1/detect schema)
#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    bboxes: Vec<BBox>,
}

impl RemoteDetector {
    /// Create a new client with the default 30s timeout
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a new client with a custom timeout
    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Detector for RemoteDetector {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn detect(&self, image: &[u8], confidence: f32) -> Result<Detections> {
        let url = format!("{}/v1/detect", self.base_url);

        let form = Form::new()
            .part(
                "infer_image",
                Part::bytes(image.to_vec())
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            )
            .text("confidence", confidence.to_string());

        let resp = self.client.post(&url).multipart(form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Detector(format!(
                "inference failed: {status} - {body}"
            )));
        }

        let result: DetectResponse = resp.json().await?;

        tracing::debug!(
            objects = result.bboxes.len(),
            confidence = confidence,
            "inference completed"
        );

        Ok(Detections {
            boxes: result.bboxes,
        })
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
