//! Accessibility Scanner API
//!
//! Accepts a URL, runs the accessibility checker against it in the
//! background, stores its findings with remediation advice, and serves
//! the results as JSON or PDF reports.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod recommend;
pub mod routes;
pub mod workers;

use a11y_tools::{Pa11y, ScanRunner, ToolStatus};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use config::AppConfig;
use db::ScanStore;
use error::StartupError;
use recommend::{openai::provider_from_config, RecommendationProvider, RecommendationResolver};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use workers::{ScanContext, ScanCoordinator};

/// Application state shared across handlers
pub struct AppState {
    pub store: ScanStore,
    pub coordinator: ScanCoordinator,
    pub config: AppConfig,
    /// Checker availability, checked once at startup
    pub scanner: Option<ToolStatus>,
}

/// Connect the store and wire the real checker and provider
pub async fn build_state(config: AppConfig) -> Result<Arc<AppState>, StartupError> {
    let store = ScanStore::connect(&config.database_url).await?;
    let pa11y = Arc::new(Pa11y::new(config.tool.clone())?);
    let provider = provider_from_config(&config)?;

    let scanner = ToolStatus::check(pa11y.as_ref()).await;
    if !scanner.available {
        warn!("Accessibility checker is not runnable; scans will fail");
    }

    Ok(assemble_state(config, store, pa11y, Some(scanner), provider))
}

/// Build state from explicit parts; spawns the scan dispatcher
pub fn assemble_state(
    config: AppConfig,
    store: ScanStore,
    runner: Arc<dyn ScanRunner>,
    scanner: Option<ToolStatus>,
    provider: Arc<dyn RecommendationProvider>,
) -> Arc<AppState> {
    let resolver = RecommendationResolver::new(
        store.clone(),
        provider,
        Duration::from_secs(config.recommendation_timeout_secs),
    );
    let context = Arc::new(ScanContext::new(store.clone(), runner, resolver));
    let coordinator = ScanCoordinator::start(context, config.max_concurrent_scans);

    Arc::new(AppState {
        store,
        coordinator,
        config,
        scanner,
    })
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/scan", post(routes::scans::start_scan))
        .route("/scan/start", post(routes::scans::start_scan))
        .route("/scans", get(routes::scans::list_scans))
        .route("/scan/results", get(routes::scans::list_scans))
        .route("/scan/results/download", get(routes::reports::download_all_pdf))
        .route("/scan/:id", delete(routes::scans::delete_scan))
        .route("/scan/:id/status", get(routes::scans::scan_status))
        .route("/scan/:id/report", get(routes::reports::get_report))
        .route("/scan/:id/report/pdf", get(routes::reports::download_report_pdf));

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health_check))
        .route("/info", get(routes::info))
        .route("/cors-info", get(routes::cors_info))
        .nest("/api/v1", api)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .expose_headers([header::CONTENT_DISPOSITION])
}
