//! WebAssembly module for the Harvesta ripeness forecasting platform
//!
//! Provides client-side computation for:
//! - Ripeness category mapping and batch aggregation
//! - Harvest time projection
//! - Environmental setpoint recommendations
//! - Ripening velocity stability checks

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("harvesta-wasm loaded"));
}

fn to_js_error(message: String) -> JsValue {
    web_sys::console::error_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

#[derive(Serialize)]
struct BatchSummary {
    predictions: CategoryResult,
    ripeness_percentages: RipenessPercentages,
}

fn summarize_detections(detections_json: &str, confidence_threshold: f64) -> Result<String, String> {
    let detections: Vec<Detection> = serde_json::from_str(detections_json)
        .map_err(|e| format!("Invalid detections JSON: {}", e))?;

    let confident = filter_confident(detections, confidence_threshold);
    let predictions = CategoryResult::from_detections(&confident);
    let summary = BatchSummary {
        ripeness_percentages: predictions.percentages(),
        predictions,
    };

    serde_json::to_string(&summary).map_err(|e| e.to_string())
}

/// Ripeness bucket of a detector class label
#[wasm_bindgen]
pub fn category_for_label(label: &str) -> String {
    RipenessCategory::from_label(label).to_string()
}

/// Aggregate `[{class_label, confidence}]` into per-category stats and percentages
#[wasm_bindgen]
pub fn aggregate_detections(detections_json: &str, confidence_threshold: f64) -> Result<String, JsValue> {
    summarize_detections(detections_json, confidence_threshold).map_err(to_js_error)
}

/// Ripeness percentages of bucket counts, as JSON
#[wasm_bindgen]
pub fn ripeness_percentages(unripe: u32, half_ripe: u32, ripe: u32) -> Result<String, JsValue> {
    serde_json::to_string(&RipenessPercentages::from_counts(unripe, half_ripe, ripe))
        .map_err(|e| to_js_error(e.to_string()))
}

/// Days until the ripe share reaches 85%
#[wasm_bindgen]
pub fn harvest_time_days(ripe_percentage: f64, growth_speed: f64) -> Result<f64, JsValue> {
    calculate_harvest_time(ripe_percentage, growth_speed).map_err(|e| to_js_error(e.to_string()))
}

/// Recommended temperature, light and humidity setpoints, as JSON
#[wasm_bindgen]
pub fn recommended_setpoints(unripe: f64, half_ripe: f64, ripe: f64) -> Result<String, JsValue> {
    let setpoints = environmental_setpoints(&RipenessPercentages::new(unripe, half_ripe, ripe));
    serde_json::to_string(&setpoints).map_err(|e| to_js_error(e.to_string()))
}

/// Setpoints formatted for display ("22.5 °C, 4500 lux, 78.75 %RH")
#[wasm_bindgen]
pub fn format_setpoints(unripe: f64, half_ripe: f64, ripe: f64) -> String {
    environmental_setpoints(&RipenessPercentages::new(unripe, half_ripe, ripe)).to_string()
}

/// Whether a ripening velocity passes the stability gate
#[wasm_bindgen]
pub fn is_velocity_stable(velocity: f64, stability_threshold: f64) -> bool {
    is_stable_velocity(velocity, stability_threshold)
}

fn harvest_date_from(today: NaiveDate, harvest_time_days: f64) -> Option<String> {
    estimate_harvest_date(today, harvest_time_days).map(|date| date.format("%Y-%m-%d").to_string())
}

/// Forecast harvest date (YYYY-MM-DD) counted from the device clock
#[wasm_bindgen]
pub fn estimated_harvest_date(harvest_time_days: f64) -> Option<String> {
    let now_ms = js_sys::Date::now() as i64;
    let today = DateTime::from_timestamp_millis(now_ms)?.date_naive();
    harvest_date_from(today, harvest_time_days)
}
