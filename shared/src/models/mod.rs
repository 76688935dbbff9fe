//! Domain models for the Harvesta ripeness forecasting platform

mod forecast;
mod growth;
mod ripeness;
mod velocity;

pub use forecast::*;
pub use growth::*;
pub use ripeness::*;
pub use velocity::*;
