//! Persistence gateway for growth-rate records
//!
//! Writes and the growth-speed lookup are best-effort: a store failure is
//! logged and turned into a typed fallback so a forecast can still be served.
//! The chart reads surface failures to the caller.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use shared::{
    format_timestamp, GrowthRateRecord, HarvestForecast, HistoricalEntry, RipenessPercentages,
};

use crate::error::{AppError, AppResult};
use crate::external::{DocumentQuery, DocumentStore};

/// Where a growth speed came from
#[derive(Debug, Clone, PartialEq)]
pub enum GrowthSpeedSource {
    Stored,
    Fallback { reason: String },
}

impl GrowthSpeedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrowthSpeedSource::Stored => "stored",
            GrowthSpeedSource::Fallback { .. } => "fallback",
        }
    }
}

/// Growth speed (ripe percent per day) used for a forecast
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthSpeed {
    pub value: f64,
    pub source: GrowthSpeedSource,
}

impl GrowthSpeed {
    #[cfg(test)]
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, GrowthSpeedSource::Fallback { .. })
    }
}

/// Result of a best-effort write
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved { id: String },
    Failed { reason: String },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            SaveOutcome::Saved { id } => Some(id),
            SaveOutcome::Failed { .. } => None,
        }
    }
}

/// Growth-rate service backed by a document store
#[derive(Clone)]
pub struct GrowthRateService {
    store: Arc<dyn DocumentStore>,
    collection: String,
    default_growth_speed: f64,
}

impl GrowthRateService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        default_growth_speed: f64,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            default_growth_speed,
        }
    }

    fn fallback(&self, reason: String) -> GrowthSpeed {
        tracing::warn!(
            "Using default growth speed {}: {}",
            self.default_growth_speed,
            reason
        );
        GrowthSpeed {
            value: self.default_growth_speed,
            source: GrowthSpeedSource::Fallback { reason },
        }
    }

    /// Growth speed of the most recent record, or the default
    pub async fn fetch_growth_speed(&self) -> GrowthSpeed {
        let query = DocumentQuery::new(&self.collection, "date")
            .descending()
            .limit(1);

        let latest = match self.store.query(&query).await {
            Ok(mut docs) if !docs.is_empty() => docs.swap_remove(0),
            Ok(_) => return self.fallback("no growth-rate records".to_string()),
            Err(e) => return self.fallback(format!("store query failed: {}", e)),
        };

        // A stored non-positive speed is passed through; the forecaster rejects it.
        match latest.get("growth_speed_ripe").and_then(Value::as_f64) {
            Some(value) => GrowthSpeed {
                value,
                source: GrowthSpeedSource::Stored,
            },
            None => self.fallback("latest record has no numeric growth_speed_ripe".to_string()),
        }
    }

    async fn append(&self, record: &GrowthRateRecord) -> SaveOutcome {
        let document = match serde_json::to_value(record) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("Failed to encode growth-rate record: {}", e);
                return SaveOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match self.store.add(&self.collection, document).await {
            Ok(id) => {
                tracing::debug!(id = %id, "growth-rate record saved");
                SaveOutcome::Saved { id }
            }
            Err(e) => {
                tracing::error!("Failed to save growth-rate record: {}", e);
                SaveOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Append a bare growth-speed record; the speed is looked up when not given
    pub async fn save_growth_speed(
        &self,
        ripe_percentage: f64,
        growth_speed: Option<f64>,
    ) -> (f64, SaveOutcome) {
        let growth_speed = match growth_speed {
            Some(value) => value,
            None => self.fetch_growth_speed().await.value,
        };

        let record = GrowthRateRecord::growth_speed(Utc::now(), ripe_percentage, growth_speed);
        (growth_speed, self.append(&record).await)
    }

    /// Append the full record of an accepted forecast
    pub async fn save_ripeness_data(
        &self,
        percentages: &RipenessPercentages,
        forecast: &HarvestForecast,
    ) -> SaveOutcome {
        let record = GrowthRateRecord::ripeness(Utc::now(), percentages, forecast);
        self.append(&record).await
    }

    /// Records of the last `window_days` days, oldest first
    pub async fn get_historical_ripeness_data(
        &self,
        window_days: i64,
    ) -> AppResult<Vec<HistoricalEntry>> {
        let since = Utc::now() - Duration::days(window_days);
        let query = DocumentQuery::new(&self.collection, "date").start_at(format_timestamp(&since));

        let docs = self
            .store
            .query(&query)
            .await
            .map_err(AppError::HistoricalFetchFailed)?;

        let mut entries: Vec<HistoricalEntry> = docs
            .into_iter()
            .filter_map(|doc| decode_record(doc).map(|r| HistoricalEntry::from(&r)))
            .collect();
        entries.sort_by_key(|entry| entry.date);
        Ok(entries)
    }

    /// The single most recent record, if any
    pub async fn get_latest_ripeness_data(&self) -> AppResult<Option<GrowthRateRecord>> {
        let query = DocumentQuery::new(&self.collection, "date")
            .descending()
            .limit(1);
        let docs = self.store.query(&query).await?;
        Ok(docs.into_iter().next().and_then(decode_record))
    }
}

/// Decode a stored document, skipping ones that do not fit the record shape
fn decode_record(doc: Value) -> Option<GrowthRateRecord> {
    match serde_json::from_value(doc) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Skipping malformed growth-rate document: {}", e);
            None
        }
    }
}
