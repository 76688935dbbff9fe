//! Shared types and models for the Harvesta ripeness forecasting platform
//!
//! This crate holds the pure forecasting core (category mapping, aggregation,
//! ripening velocity, harvest forecasting) shared between the backend and the
//! WASM client bindings. Nothing in here performs I/O.

pub mod models;
pub mod rounding;
pub mod types;
pub mod validation;

pub use models::*;
pub use rounding::*;
pub use types::*;
pub use validation::*;
