//! HTTP request handlers

pub mod harvest;
pub mod health;

pub use harvest::{get_image, historical_data, latest_data, predict, record_growth_speed};
pub use health::{health_check, root};
