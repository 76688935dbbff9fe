//! Harvest forecasting and environmental setpoint models

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ripeness::{RipenessPercentages, DEFAULT_CONFIDENCE_THRESHOLD};
use super::velocity::DEFAULT_STABILITY_THRESHOLD;
use crate::rounding::round2;

/// Ripe percentage at which a crop is considered ready to harvest
pub const HARVEST_READY_PERCENTAGE: f64 = 85.0;

/// Growth speed (ripe percent per day) used when none is stored
pub const DEFAULT_GROWTH_SPEED: f64 = 5.0;

/// Returned instead of a forecast while the ripening trend is unstable
pub const FORECAST_DELAYED_MESSAGE: &str = "Forecast temporarily delayed due to unstable ripening trend. Capture new images over the next two days for a more accurate forecast.";

/// Errors raised while forecasting
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Growth speed must be a positive number, got {0}")]
    InvalidGrowthSpeed(f64),
}

/// Tunable thresholds of the forecasting pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    pub harvest_ready_percentage: f64,
    pub stability_threshold: f64,
    pub default_growth_speed: f64,
    pub confidence_threshold: f64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            harvest_ready_percentage: HARVEST_READY_PERCENTAGE,
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
            default_growth_speed: DEFAULT_GROWTH_SPEED,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Recommended greenhouse conditions for a ripeness mix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalSetpoints {
    /// Air temperature in °C
    pub temperature_setpoint: f64,
    /// Light intensity in lux
    pub light_intensity_setpoint: f64,
    /// Relative humidity in %RH
    pub humidity_setpoint: f64,
}

impl std::fmt::Display for EnvironmentalSetpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} °C, {} lux, {} %RH",
            self.temperature_setpoint, self.light_intensity_setpoint, self.humidity_setpoint
        )
    }
}

/// Reference conditions for one ripeness bucket
struct ReferenceConditions {
    temperature: f64,
    light: f64,
    humidity: f64,
}

const UNRIPE_CONDITIONS: ReferenceConditions = ReferenceConditions {
    temperature: 20.0,
    light: 7000.0,
    humidity: 90.0,
};

const HALF_RIPE_CONDITIONS: ReferenceConditions = ReferenceConditions {
    temperature: 22.0,
    light: 5000.0,
    humidity: 80.0,
};

const RIPE_CONDITIONS: ReferenceConditions = ReferenceConditions {
    temperature: 24.0,
    light: 3000.0,
    humidity: 72.5,
};

/// Blend the per-bucket reference conditions, weighted by each bucket's percentage
pub fn environmental_setpoints(percentages: &RipenessPercentages) -> EnvironmentalSetpoints {
    let blend = |pick: fn(&ReferenceConditions) -> f64| {
        round2(
            (percentages.unripe * pick(&UNRIPE_CONDITIONS)
                + percentages.half_ripe * pick(&HALF_RIPE_CONDITIONS)
                + percentages.ripe * pick(&RIPE_CONDITIONS))
                / 100.0,
        )
    };

    EnvironmentalSetpoints {
        temperature_setpoint: blend(|c| c.temperature),
        light_intensity_setpoint: blend(|c| c.light),
        humidity_setpoint: blend(|c| c.humidity),
    }
}

/// Days until the ripe share reaches the harvest-ready percentage (85%)
pub fn calculate_harvest_time(ripe_percentage: f64, growth_speed: f64) -> Result<f64, ForecastError> {
    calculate_harvest_time_with_target(ripe_percentage, growth_speed, HARVEST_READY_PERCENTAGE)
}

/// Days until `ripe_percentage` reaches `target`, rounded to 2 decimals.
///
/// Negative results mean the target was already passed.
pub fn calculate_harvest_time_with_target(
    ripe_percentage: f64,
    growth_speed: f64,
    target: f64,
) -> Result<f64, ForecastError> {
    if !growth_speed.is_finite() || growth_speed <= 0.0 {
        return Err(ForecastError::InvalidGrowthSpeed(growth_speed));
    }
    Ok(round2((target - ripe_percentage) / growth_speed))
}

/// Calendar date of the forecast harvest; overdue forecasts map to `today`
pub fn estimate_harvest_date(today: NaiveDate, harvest_time_days: f64) -> Option<NaiveDate> {
    if !harvest_time_days.is_finite() {
        return None;
    }
    let days = harvest_time_days.max(0.0).ceil();
    if days > u32::MAX as f64 {
        return None;
    }
    today.checked_add_days(Days::new(days as u64))
}

/// Forecast for one accepted batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestForecast {
    pub harvest_time_days: f64,
    pub estimated_harvest_date: Option<NaiveDate>,
    pub growth_speed: f64,
    pub setpoints: EnvironmentalSetpoints,
}

impl ForecastSettings {
    /// Forecast harvest time and setpoints for a batch
    pub fn forecast(
        &self,
        percentages: &RipenessPercentages,
        growth_speed: f64,
        today: NaiveDate,
    ) -> Result<HarvestForecast, ForecastError> {
        let harvest_time_days = calculate_harvest_time_with_target(
            percentages.ripe,
            growth_speed,
            self.harvest_ready_percentage,
        )?;

        Ok(HarvestForecast {
            harvest_time_days,
            estimated_harvest_date: estimate_harvest_date(today, harvest_time_days),
            growth_speed,
            setpoints: environmental_setpoints(percentages),
        })
    }
}
