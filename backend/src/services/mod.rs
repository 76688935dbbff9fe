//! Business logic services for the Harvesta ripeness forecasting server

pub mod growth_rate;
pub mod image_storage;
pub mod ripeness;
pub mod velocity;

pub use growth_rate::GrowthRateService;
pub use image_storage::ImageStorage;
pub use ripeness::{ImageUpload, PredictOutcome, RipenessService};
pub use velocity::VelocityRegistry;
