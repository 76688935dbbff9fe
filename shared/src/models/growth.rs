//! Growth-rate records kept in the document store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::forecast::HarvestForecast;
use super::ripeness::RipenessPercentages;

/// Environment reported with bare growth-speed records (°C, lux, %RH)
pub const BASELINE_TEMPERATURE: f64 = 22.0;
pub const BASELINE_LIGHT_INTENSITY: f64 = 5000.0;
pub const BASELINE_HUMIDITY: f64 = 80.0;

/// A document in the `growth_rates` collection.
///
/// Two shapes share the collection: full ripeness records written for every
/// accepted forecast, and bare growth-speed records carrying only the ripe
/// percentage, growth speed and the measured environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRateRecord {
    #[serde(with = "crate::types::iso_timestamp")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub ripe_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unripe_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub half_ripe_percentage: Option<f64>,
    #[serde(default)]
    pub growth_speed_ripe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harvest_time_days: Option<f64>,
    #[serde(
        default,
        deserialize_with = "measurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature_setpoint: Option<f64>,
    #[serde(
        default,
        deserialize_with = "measurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub light_intensity_setpoint: Option<f64>,
    #[serde(
        default,
        deserialize_with = "measurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub humidity_setpoint: Option<f64>,
    #[serde(
        default,
        deserialize_with = "measurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f64>,
    #[serde(
        default,
        deserialize_with = "measurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub light_intensity: Option<f64>,
    #[serde(
        default,
        deserialize_with = "measurement",
        skip_serializing_if = "Option::is_none"
    )]
    pub humidity: Option<f64>,
}

impl GrowthRateRecord {
    /// Record written after an accepted forecast
    pub fn ripeness(
        date: DateTime<Utc>,
        percentages: &RipenessPercentages,
        forecast: &HarvestForecast,
    ) -> Self {
        Self {
            date,
            ripe_percentage: Some(percentages.ripe),
            unripe_percentage: Some(percentages.unripe),
            half_ripe_percentage: Some(percentages.half_ripe),
            growth_speed_ripe: Some(forecast.growth_speed),
            harvest_time_days: Some(forecast.harvest_time_days),
            temperature_setpoint: Some(forecast.setpoints.temperature_setpoint),
            light_intensity_setpoint: Some(forecast.setpoints.light_intensity_setpoint),
            humidity_setpoint: Some(forecast.setpoints.humidity_setpoint),
            temperature: None,
            light_intensity: None,
            humidity: None,
        }
    }

    /// Bare growth-speed record with the baseline environment
    pub fn growth_speed(date: DateTime<Utc>, ripe_percentage: f64, growth_speed: f64) -> Self {
        Self {
            date,
            ripe_percentage: Some(ripe_percentage),
            unripe_percentage: None,
            half_ripe_percentage: None,
            growth_speed_ripe: Some(growth_speed),
            harvest_time_days: None,
            temperature_setpoint: None,
            light_intensity_setpoint: None,
            humidity_setpoint: None,
            temperature: Some(BASELINE_TEMPERATURE),
            light_intensity: Some(BASELINE_LIGHT_INTENSITY),
            humidity: Some(BASELINE_HUMIDITY),
        }
    }

    pub fn is_forecast(&self) -> bool {
        self.harvest_time_days.is_some()
    }
}

/// Deserialize a measurement stored either as a number or as a unit-suffixed
/// string such as `"22.0 °C"`. Text without a leading number reads as absent.
fn measurement<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Stored>::deserialize(deserializer)? {
        Some(Stored::Number(value)) => Some(value),
        Some(Stored::Text(text)) => leading_number(&text),
        None => None,
    })
}

fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

/// One point of the historical ripeness chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEntry {
    #[serde(with = "crate::types::iso_timestamp")]
    pub date: DateTime<Utc>,
    pub unripe_percentage: f64,
    pub half_ripe_percentage: f64,
    pub ripe_percentage: f64,
    pub growth_speed_ripe: f64,
    pub temperature: Option<f64>,
    pub light_intensity: Option<f64>,
    pub humidity: Option<f64>,
    pub harvest_time_days: Option<f64>,
}

impl From<&GrowthRateRecord> for HistoricalEntry {
    fn from(record: &GrowthRateRecord) -> Self {
        Self {
            date: record.date,
            unripe_percentage: record.unripe_percentage.unwrap_or(0.0),
            half_ripe_percentage: record.half_ripe_percentage.unwrap_or(0.0),
            ripe_percentage: record.ripe_percentage.unwrap_or(0.0),
            growth_speed_ripe: record.growth_speed_ripe.unwrap_or(0.0),
            temperature: record.temperature_setpoint.or(record.temperature),
            light_intensity: record.light_intensity_setpoint.or(record.light_intensity),
            humidity: record.humidity_setpoint.or(record.humidity),
            harvest_time_days: record.harvest_time_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forecast::{environmental_setpoints, HarvestForecast};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_ripeness_record_fields() {
        let percentages = RipenessPercentages::new(20.0, 30.0, 50.0);
        let forecast = HarvestForecast {
            harvest_time_days: 7.0,
            estimated_harvest_date: None,
            growth_speed: 5.0,
            setpoints: environmental_setpoints(&percentages),
        };
        let record = GrowthRateRecord::ripeness(at(1), &percentages, &forecast);

        assert!(record.is_forecast());
        assert_eq!(record.ripe_percentage, Some(50.0));
        assert_eq!(record.temperature_setpoint, Some(22.6));
        assert_eq!(record.temperature, None);
    }

    #[test]
    fn test_record_json_round_trip_keeps_date_format() {
        let record = GrowthRateRecord::growth_speed(at(2), 42.0, 4.5);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["date"], "2025-03-02T09:30:00.000000Z");
        assert_eq!(json["temperature"], 22.0);
        assert!(json.get("harvest_time_days").is_none());

        let back: GrowthRateRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_historical_entry_prefers_setpoints() {
        let percentages = RipenessPercentages::new(100.0, 0.0, 0.0);
        let forecast = HarvestForecast {
            harvest_time_days: 17.0,
            estimated_harvest_date: None,
            growth_speed: 5.0,
            setpoints: environmental_setpoints(&percentages),
        };
        let entry = HistoricalEntry::from(&GrowthRateRecord::ripeness(at(3), &percentages, &forecast));
        assert_eq!(entry.temperature, Some(20.0));
        assert_eq!(entry.humidity, Some(90.0));
        assert_eq!(entry.harvest_time_days, Some(17.0));
    }

    #[test]
    fn test_historical_entry_from_bare_record() {
        let entry = HistoricalEntry::from(&GrowthRateRecord::growth_speed(at(4), 30.0, 6.0));
        assert_eq!(entry.unripe_percentage, 0.0);
        assert_eq!(entry.temperature, Some(BASELINE_TEMPERATURE));
        assert_eq!(entry.harvest_time_days, None);
    }

    #[test]
    fn test_legacy_document_with_unit_setpoints() {
        let json = serde_json::json!({
            "date": "2025-03-05T10:00:00.123456",
            "ripe_percentage": 50.0,
            "unripe_percentage": 20.0,
            "half_ripe_percentage": 30.0,
            "growth_speed_ripe": 5.0,
            "harvest_time_days": 7.0,
            "temperature_setpoint": "22.6 °C",
            "light_intensity_setpoint": "4600.0 lux",
            "humidity_setpoint": "82.0%"
        });
        let record: GrowthRateRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.temperature_setpoint, Some(22.6));
        assert_eq!(record.light_intensity_setpoint, Some(4600.0));
        assert_eq!(record.humidity_setpoint, Some(82.0));
        assert!(record.is_forecast());
    }

    #[test]
    fn test_unreadable_measurement_is_absent() {
        let json = serde_json::json!({
            "date": "2025-03-05T10:00:00",
            "temperature": "warm",
            "humidity": null
        });
        let record: GrowthRateRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.temperature, None);
        assert_eq!(record.humidity, None);
    }

    #[test]
    fn test_legacy_document_without_optional_fields() {
        let json = serde_json::json!({
            "date": "2025-03-05T10:00:00.123456",
            "growth_speed_ripe": 5
        });
        let record: GrowthRateRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.growth_speed_ripe, Some(5.0));
        assert_eq!(record.ripe_percentage, None);
    }
}
