//! Object detection client
//!
//! Client for the fruit ripeness detection microservice. The service runs the
//! trained model and replies with class indices; labels are resolved here from
//! the configured class vocabulary.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::Detection;

use crate::config::DetectorConfig;
use crate::error::{AppError, AppResult};

/// Detections for one image plus the service's annotated rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionOutput {
    pub detections: Vec<Detection>,
    pub annotated_image: Option<Vec<u8>>,
}

/// Runs object detection on a single image
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(
        &self,
        image: &[u8],
        filename: &str,
        confidence_threshold: f64,
    ) -> AppResult<DetectionOutput>;
}

/// HTTP client for the detection microservice
#[derive(Clone)]
pub struct DetectorClient {
    endpoint: String,
    api_key: Option<String>,
    class_names: Vec<String>,
    http_client: Client,
}

/// Request to detect fruit in an image
#[derive(Debug, Serialize)]
pub struct DetectRequest<'a> {
    pub filename: &'a str,
    pub image_base64: String,
    pub confidence_threshold: f64,
}

/// Response from the detection API
#[derive(Debug, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub boxes: Vec<DetectedBox>,
    #[serde(default)]
    pub annotated_image_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetectedBox {
    pub class_index: usize,
    pub confidence: f64,
}

/// Class name for a model index; unknown indices get a placeholder label
pub fn resolve_label(class_names: &[String], class_index: usize) -> String {
    class_names
        .get(class_index)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", class_index))
}

impl DetectResponse {
    /// Resolve labels and drop boxes below the threshold
    pub fn into_output(
        self,
        class_names: &[String],
        confidence_threshold: f64,
    ) -> AppResult<DetectionOutput> {
        let detections = self
            .boxes
            .into_iter()
            .map(|b| Detection::new(resolve_label(class_names, b.class_index), b.confidence))
            .filter(|d| d.meets_threshold(confidence_threshold))
            .collect();

        let annotated_image = self
            .annotated_image_base64
            .map(|encoded| STANDARD.decode(encoded))
            .transpose()
            .map_err(|e| {
                AppError::DetectionService(format!("Invalid annotated image: {}", e))
            })?;

        Ok(DetectionOutput {
            detections,
            annotated_image,
        })
    }
}

impl DetectorClient {
    /// Create a new detection client
    pub fn new(config: &DetectorConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            class_names: config.class_names.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl ObjectDetector for DetectorClient {
    async fn detect(
        &self,
        image: &[u8],
        filename: &str,
        confidence_threshold: f64,
    ) -> AppResult<DetectionOutput> {
        let request = DetectRequest {
            filename,
            image_base64: STANDARD.encode(image),
            confidence_threshold,
        };

        let mut builder = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::DetectionService(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::DetectionService(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let result: DetectResponse = response
            .json()
            .await
            .map_err(|e| AppError::DetectionService(format!("Failed to parse response: {}", e)))?;

        tracing::debug!(filename, boxes = result.boxes.len(), "detector responded");
        result.into_output(&self.class_names, confidence_threshold)
    }
}
