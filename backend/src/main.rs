//! Harvesta - Ripeness Forecasting Server
//!
//! Accepts batches of crop images, classifies fruit ripeness through an
//! object detection service and forecasts the optimal harvest time.

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod external;
mod handlers;
mod routes;
mod services;

pub use crate::config::Config;

use crate::config::StoreBackend;
use crate::external::{DetectorClient, DocumentStore, FirestoreStore, MemoryStore, ObjectDetector};
use crate::services::VelocityRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub detector: Arc<dyn ObjectDetector>,
    pub velocity: VelocityRegistry,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harvesta_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Harvesta Ripeness Forecasting Server");
    tracing::info!("Environment: {}", config.environment);

    // Connect the document store
    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Firestore => {
            tracing::info!("Using Firestore collection '{}'", config.store.collection);
            Arc::new(FirestoreStore::new(&config.store)?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let detector: Arc<dyn ObjectDetector> = Arc::new(DetectorClient::new(&config.detector)?);
    tracing::info!("Detection service: {}", config.detector.endpoint);

    tokio::fs::create_dir_all(&config.storage.predictions_dir).await?;

    // Create application state
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        detector,
        velocity: VelocityRegistry::with_capacity(config.forecast.max_tracked_devices),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let base_path = state.config.server.base_path.trim_end_matches('/');
    let router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check));

    let router = if base_path.is_empty() {
        router.merge(routes::api_routes())
    } else {
        router.nest(base_path, routes::api_routes())
    };

    router
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
