//! Configuration management for the Harvesta ripeness forecasting server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with HARVESTA_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{ForecastSettings, DEFAULT_CLASS_NAMES};

use crate::services::velocity::DEFAULT_MAX_TRACKED_DEVICES;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Document store configuration
    pub store: StoreConfig,

    /// Object detection service configuration
    pub detector: DetectorConfig,

    /// Local image storage
    pub storage: StorageConfig,

    /// Forecasting thresholds
    pub forecast: ForecastConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,

    /// Prefix the prediction routes are mounted under ("" mounts them at the root)
    pub base_path: String,

    /// Largest accepted multipart upload in bytes
    pub max_upload_bytes: usize,
}

/// Which document store implementation backs the persistence gateway
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Firestore,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Firestore REST base URL
    pub base_url: String,

    /// Google Cloud project id
    pub project_id: Option<String>,

    /// Web API key, sent as the `key` query parameter
    pub api_key: Option<String>,

    /// OAuth2 access token, sent as a bearer token
    pub access_token: Option<String>,

    /// Collection holding growth-rate records
    pub collection: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// Detection microservice endpoint
    pub endpoint: String,

    /// Optional API key sent as `x-api-key`
    pub api_key: Option<String>,

    /// Class names in model index order
    #[serde(default = "default_class_names")]
    pub class_names: Vec<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory uploads and annotated images are written to
    pub predictions_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    /// Ripe percentage considered ready to harvest
    pub harvest_ready_percentage: f64,

    /// Largest day-over-day velocity still considered stable
    pub stability_threshold: f64,

    /// Growth speed used when none can be fetched
    pub default_growth_speed: f64,

    /// Minimum detector confidence
    pub confidence_threshold: f64,

    /// Days of history returned by the historical data endpoint
    pub history_window_days: i64,

    /// Devices whose velocity baseline is kept in memory
    pub max_tracked_devices: usize,
}

fn default_class_names() -> Vec<String> {
    DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("HARVESTA_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 5000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.base_path", "/harvesta-api/harvestingpredict")?
            .set_default("server.max_upload_bytes", 50 * 1024 * 1024)?
            .set_default("store.backend", "memory")?
            .set_default("store.base_url", "https://firestore.googleapis.com/v1")?
            .set_default("store.collection", "growth_rates")?
            .set_default("store.timeout_secs", 15)?
            .set_default("detector.endpoint", "http://localhost:8001/detect")?
            .set_default("detector.timeout_secs", 60)?
            .set_default("storage.predictions_dir", "static/predictions")?
            .set_default("forecast.harvest_ready_percentage", 85.0)?
            .set_default("forecast.stability_threshold", 10.0)?
            .set_default("forecast.default_growth_speed", 5.0)?
            .set_default("forecast.confidence_threshold", 0.5)?
            .set_default("forecast.history_window_days", 7)?
            .set_default("forecast.max_tracked_devices", 10_000)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (HARVESTA_ prefix)
            .add_source(
                Environment::with_prefix("HARVESTA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        shared::validate_class_names(&self.detector.class_names)
            .map_err(|e| ConfigError::Message(format!("detector.class_names: {}", e)))?;
        shared::validate_growth_speed(self.forecast.default_growth_speed)
            .map_err(|e| ConfigError::Message(format!("forecast.default_growth_speed: {}", e)))?;
        shared::validate_confidence(self.forecast.confidence_threshold)
            .map_err(|e| ConfigError::Message(format!("forecast.confidence_threshold: {}", e)))?;
        if self.forecast.max_tracked_devices == 0 {
            return Err(ConfigError::Message(
                "forecast.max_tracked_devices must be at least 1".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Firestore && self.store.project_id.is_none() {
            return Err(ConfigError::Message(
                "store.project_id is required for the firestore backend".to_string(),
            ));
        }
        if !self.server.base_path.is_empty() && !self.server.base_path.starts_with('/') {
            return Err(ConfigError::Message(
                "server.base_path must start with '/'".to_string(),
            ));
        }
        Ok(())
    }
}

impl ForecastConfig {
    pub fn settings(&self) -> ForecastSettings {
        ForecastSettings {
            harvest_ready_percentage: self.harvest_ready_percentage,
            stability_threshold: self.stability_threshold,
            default_growth_speed: self.default_growth_speed,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "0.0.0.0".to_string(),
            base_path: "/harvesta-api/harvestingpredict".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        let settings = ForecastSettings::default();
        Self {
            harvest_ready_percentage: settings.harvest_ready_percentage,
            stability_threshold: settings.stability_threshold,
            default_growth_speed: settings.default_growth_speed,
            confidence_threshold: settings.confidence_threshold,
            history_window_days: 7,
            max_tracked_devices: DEFAULT_MAX_TRACKED_DEVICES,
        }
    }
}

impl Default for Config {
    /// Local development configuration: in-memory store, default thresholds
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            store: StoreConfig {
                backend: StoreBackend::Memory,
                base_url: "https://firestore.googleapis.com/v1".to_string(),
                project_id: None,
                api_key: None,
                access_token: None,
                collection: "growth_rates".to_string(),
                timeout_secs: 15,
            },
            detector: DetectorConfig {
                endpoint: "http://localhost:8001/detect".to_string(),
                api_key: None,
                class_names: default_class_names(),
                timeout_secs: 60,
            },
            storage: StorageConfig {
                predictions_dir: "static/predictions".to_string(),
            },
            forecast: ForecastConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector.class_names.len(), 6);
        assert_eq!(config.forecast.settings(), ForecastSettings::default());
    }

    #[test]
    fn test_firestore_requires_project() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Firestore;
        assert!(config.validate().is_err());

        config.store.project_id = Some("harvesta".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_class_names_need_every_bucket() {
        let mut config = Config::default();
        config.detector.class_names = ["ripe_b", "half_b", "green_b", "ripe_l", "half_l", "green_l"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(config.validate().is_ok());

        config.detector.class_names.truncate(5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_default_growth_speed() {
        let mut config = Config::default();
        config.forecast.default_growth_speed = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_velocity_registry_needs_room() {
        let mut config = Config::default();
        assert_eq!(config.forecast.max_tracked_devices, DEFAULT_MAX_TRACKED_DEVICES);
        config.forecast.max_tracked_devices = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_path_must_be_absolute() {
        let mut config = Config::default();
        config.server.base_path = "api".to_string();
        assert!(config.validate().is_err());
        config.server.base_path = String::new();
        assert!(config.validate().is_ok());
    }
}
