//! Error handling for the Harvesta ripeness forecasting server
//!
//! Every error is rendered as `{"error": "<message>"}`, the shape the mobile
//! client reads.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::ForecastError;
use thiserror::Error;

use crate::external::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Client input errors
    #[error("No files uploaded")]
    NoFilesUploaded,

    #[error("No files provided")]
    NoFilesProvided,

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("No data found")]
    NoDataFound,

    // Forecasting errors
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    // External service errors
    #[error("Detection service error: {0}")]
    DetectionService(String),

    #[error("Failed to fetch historical data")]
    HistoricalFetchFailed(#[source] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Image storage error: {0}")]
    ImageStorage(#[from] std::io::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoFilesUploaded
            | AppError::NoFilesProvided
            | AppError::Validation { .. }
            | AppError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::NoDataFound => StatusCode::NOT_FOUND,
            AppError::Forecast(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DetectionService(_) => StatusCode::BAD_GATEWAY,
            AppError::HistoricalFetchFailed(_)
            | AppError::Storage(_)
            | AppError::ImageStorage(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client; internal details stay in the logs
    fn public_message(&self) -> String {
        match self {
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::Storage(_) => "A storage error occurred".to_string(),
            AppError::ImageStorage(_) => "Failed to store image".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
