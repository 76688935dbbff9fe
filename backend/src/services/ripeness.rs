//! Ripeness forecasting pipeline
//!
//! Runs one uploaded image batch through detection, aggregation, the
//! velocity stability gate and the harvest forecaster.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use shared::{
    CategoryResult, ClassVocabulary, DeviceId, EnvironmentalSetpoints, ForecastSettings, RipenessPercentages,
    FORECAST_DELAYED_MESSAGE,
};

use super::growth_rate::GrowthRateService;
use super::image_storage::{annotated_filename, sanitize_filename, ImageStorage};
use super::velocity::VelocityRegistry;
use crate::error::AppResult;
use crate::external::ObjectDetector;

/// One uploaded image
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Forecast payload returned to the mobile client
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub predictions: CategoryResult,
    pub ripeness_percentages: RipenessPercentages,
    pub optimal_harvest_time_days: f64,
    pub estimated_harvest_date: Option<NaiveDate>,
    pub growth_speed_rate: f64,
    pub growth_speed_source: &'static str,
    pub environmental_recommendations: EnvironmentalSetpoints,
    pub yolo_images: Vec<String>,
    pub ripening_velocity: f64,
}

/// Result of processing a batch
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PredictOutcome {
    /// The ripening trend is unstable; nothing was forecast or stored
    Delayed { message: String },
    Forecast(Box<ForecastResponse>),
}

/// Ripeness service orchestrating one prediction request
pub struct RipenessService {
    detector: Arc<dyn ObjectDetector>,
    growth_rates: GrowthRateService,
    velocity: VelocityRegistry,
    images: ImageStorage,
    settings: ForecastSettings,
    vocabulary: ClassVocabulary,
}

impl RipenessService {
    pub fn new(
        detector: Arc<dyn ObjectDetector>,
        growth_rates: GrowthRateService,
        velocity: VelocityRegistry,
        images: ImageStorage,
        settings: ForecastSettings,
    ) -> Self {
        Self {
            detector,
            growth_rates,
            velocity,
            images,
            settings,
            vocabulary: ClassVocabulary::default(),
        }
    }

    /// Map detector labels through the deployed model's class names
    pub fn with_vocabulary(mut self, vocabulary: ClassVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Process a batch of images captured by one device
    pub async fn process_images(
        &self,
        device: &DeviceId,
        uploads: Vec<ImageUpload>,
    ) -> AppResult<PredictOutcome> {
        let mut detections = Vec::new();
        let mut yolo_images = Vec::with_capacity(uploads.len());

        for (index, upload) in uploads.into_iter().enumerate() {
            let filename = sanitize_filename(&upload.filename, index);
            self.images.save(&filename, &upload.bytes).await?;

            let output = self
                .detector
                .detect(&upload.bytes, &filename, self.settings.confidence_threshold)
                .await?;

            let annotated = annotated_filename(&filename);
            let annotated_bytes = output.annotated_image.as_deref().unwrap_or(&upload.bytes);
            self.images.save(&annotated, annotated_bytes).await?;
            yolo_images.push(annotated);

            detections.extend(output.detections);
        }

        let predictions = CategoryResult::from_detections_in(&self.vocabulary, &detections);
        let percentages = predictions.percentages();

        let reading = self.velocity.track(
            device,
            percentages.ripe,
            self.settings.stability_threshold,
        )?;

        tracing::info!(
            device = %device,
            images = yolo_images.len(),
            detections = detections.len(),
            ripe = percentages.ripe,
            velocity = reading.velocity,
            "batch processed"
        );

        if !reading.stable {
            tracing::info!(device = %device, "forecast delayed, ripening trend unstable");
            return Ok(PredictOutcome::Delayed {
                message: FORECAST_DELAYED_MESSAGE.to_string(),
            });
        }

        let growth_speed = self.growth_rates.fetch_growth_speed().await;
        let forecast =
            self.settings
                .forecast(&percentages, growth_speed.value, Utc::now().date_naive())?;

        let saved = self
            .growth_rates
            .save_ripeness_data(&percentages, &forecast)
            .await;
        if !saved.is_saved() {
            tracing::warn!(device = %device, "forecast served without being persisted");
        }

        Ok(PredictOutcome::Forecast(Box::new(ForecastResponse {
            predictions,
            ripeness_percentages: percentages,
            optimal_harvest_time_days: forecast.harvest_time_days,
            estimated_harvest_date: forecast.estimated_harvest_date,
            growth_speed_rate: forecast.growth_speed,
            growth_speed_source: growth_speed.source.as_str(),
            environmental_recommendations: forecast.setpoints,
            yolo_images,
            ripening_velocity: reading.velocity,
        })))
    }
}
