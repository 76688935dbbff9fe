//! Route definitions for the Harvesta ripeness forecasting server

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Harvest prediction routes, mounted under `server.base_path`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(handlers::predict))
        .route("/get_image/:filename", get(handlers::get_image))
        .route("/historical-data", get(handlers::historical_data))
        .route("/latest-data", get(handlers::latest_data))
        .route("/growth-speed", post(handlers::record_growth_speed))
}
