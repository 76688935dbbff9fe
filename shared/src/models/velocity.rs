//! Ripening velocity tracking
//!
//! Ripening velocity is the signed change in ripe percentage between two
//! consecutive processed batches of the same device. It is a plain delta,
//! no time normalization is applied.

use serde::{Deserialize, Serialize};

/// Largest velocity (percentage points) still considered a stable trend
pub const DEFAULT_STABILITY_THRESHOLD: f64 = 10.0;

/// Velocity state carried between batches of one device
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityState {
    /// Ripe percentage of the most recently processed batch
    pub previous_ripeness: Option<f64>,
    pub last_velocity: Option<f64>,
}

/// Outcome of tracking one batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityReading {
    pub velocity: f64,
    pub stable: bool,
}

impl VelocityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the batch's ripe percentage with the previous batch and move the baseline.
    ///
    /// The baseline moves on every call, including batches whose forecast is
    /// later suppressed as unstable.
    pub fn track(&mut self, current_ripeness: f64, stability_threshold: f64) -> VelocityReading {
        let velocity = match self.previous_ripeness {
            Some(previous) => current_ripeness - previous,
            None => 0.0,
        };

        self.previous_ripeness = Some(current_ripeness);
        self.last_velocity = Some(velocity);

        VelocityReading {
            velocity,
            stable: is_stable_velocity(velocity, stability_threshold),
        }
    }

    /// Stability of the last tracked velocity; no history counts as stable
    pub fn is_stable(&self, stability_threshold: f64) -> bool {
        self.last_velocity
            .map_or(true, |v| is_stable_velocity(v, stability_threshold))
    }
}

pub fn is_stable_velocity(velocity: f64, stability_threshold: f64) -> bool {
    velocity.abs() <= stability_threshold
}
