//! Harvest prediction HTTP handlers

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{ClassVocabulary, DeviceId};

use crate::error::{AppError, AppResult};
use crate::services::{
    GrowthRateService, ImageStorage, ImageUpload, PredictOutcome, RipenessService,
};
use crate::AppState;

/// Multipart field carrying the images
const FILES_FIELD: &str = "files";
/// Optional multipart field naming the capture device
const DEVICE_FIELD: &str = "device_id";

fn growth_rate_service(state: &AppState) -> GrowthRateService {
    GrowthRateService::new(
        state.store.clone(),
        state.config.store.collection.clone(),
        state.config.forecast.default_growth_speed,
    )
}

fn image_storage(state: &AppState) -> ImageStorage {
    ImageStorage::new(&state.config.storage.predictions_dir)
}

/// Run ripeness prediction on an uploaded image batch
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<PredictOutcome>> {
    let mut device = DeviceId::default();
    let mut saw_files = false;
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidUpload(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILES_FIELD) => {
                saw_files = true;
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidUpload(e.to_string()))?;
                if !bytes.is_empty() {
                    uploads.push(ImageUpload {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            Some(DEVICE_FIELD) => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidUpload(e.to_string()))?;
                device = DeviceId::new(raw);
            }
            _ => {}
        }
    }

    if !saw_files {
        return Err(AppError::NoFilesUploaded);
    }
    if uploads.is_empty() {
        return Err(AppError::NoFilesProvided);
    }

    let service = RipenessService::new(
        state.detector.clone(),
        growth_rate_service(&state),
        state.velocity.clone(),
        image_storage(&state),
        state.config.forecast.settings(),
    )
    .with_vocabulary(ClassVocabulary::from_class_names(
        &state.config.detector.class_names,
    ));

    let outcome = service.process_images(&device, uploads).await?;
    Ok(Json(outcome))
}

/// Serve a stored (original or annotated) image
pub async fn get_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<impl IntoResponse> {
    let bytes = image_storage(&state).read(&filename).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}

/// Ripeness history of the configured window (7 days by default)
pub async fn historical_data(State(state): State<AppState>) -> impl IntoResponse {
    let service = growth_rate_service(&state);

    match service
        .get_historical_ripeness_data(state.config.forecast.history_window_days)
        .await
    {
        Ok(entries) => (
            StatusCode::OK,
            Json(serde_json::json!({ "historical_data": entries })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Most recent growth-rate record
pub async fn latest_data(State(state): State<AppState>) -> impl IntoResponse {
    let service = growth_rate_service(&state);

    match service.get_latest_ripeness_data().await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "latest_data": record })),
        )
            .into_response(),
        Ok(None) => AppError::NoDataFound.into_response(),
        Err(e) => {
            tracing::error!("Failed to fetch latest data: {}", e);
            AppError::NoDataFound.into_response()
        }
    }
}

/// Input for recording a growth speed
#[derive(Debug, Deserialize)]
pub struct GrowthSpeedInput {
    pub ripe_percentage: f64,
    pub growth_speed_ripe: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct GrowthSpeedResponse {
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub growth_speed_ripe: f64,
}

/// Record a bare growth-speed measurement
pub async fn record_growth_speed(
    State(state): State<AppState>,
    Json(input): Json<GrowthSpeedInput>,
) -> AppResult<impl IntoResponse> {
    shared::validate_percentage(input.ripe_percentage)
        .map_err(|e| AppError::validation("ripe_percentage", e))?;
    if let Some(speed) = input.growth_speed_ripe {
        shared::validate_growth_speed(speed)
            .map_err(|e| AppError::validation("growth_speed_ripe", e))?;
    }

    let service = growth_rate_service(&state);
    let (growth_speed, outcome) = service
        .save_growth_speed(input.ripe_percentage, input.growth_speed_ripe)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(GrowthSpeedResponse {
            saved: outcome.is_saved(),
            id: outcome.id().map(str::to_string),
            growth_speed_ripe: growth_speed,
        }),
    ))
}
