//! API routes

pub mod reports;
pub mod scans;

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

const SERVICE_NAME: &str = "AdaptiveTest API";

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
    pub version: String,
    pub environment: String,
    pub cors_origins_count: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub environment: String,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct CorsInfoResponse {
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub frontend_url: Option<String>,
    pub backend_url: Option<String>,
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub environment: String,
    pub database_type: String,
    pub frontend_url: Option<String>,
    pub backend_url: Option<String>,
    pub openai_configured: bool,
    pub scanner_available: bool,
    pub scanner_version: Option<String>,
    pub scanner_path: Option<String>,
    pub cors_origins: usize,
    pub version: String,
}

pub async fn root(State(state): State<Arc<AppState>>) -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("{} is running", SERVICE_NAME),
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        cors_origins_count: state.config.allowed_origins().len(),
    })
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database, error) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "connected", None),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable", Some(e.to_string()))
        }
    };

    let health = if status.is_success() { "healthy" } else { "unhealthy" };
    (
        status,
        Json(HealthResponse {
            status: health.to_string(),
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: state.config.environment.clone(),
            database: database.to_string(),
            error,
        }),
    )
}

pub async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let scanner = state.scanner.as_ref();

    Json(InfoResponse {
        environment: state.config.environment.clone(),
        database_type: state.config.store_kind().to_string(),
        frontend_url: state.config.frontend_url.clone(),
        backend_url: state.config.backend_url.clone(),
        openai_configured: state.config.provider_configured(),
        scanner_available: scanner.map_or(false, |s| s.available),
        scanner_version: scanner.and_then(|s| s.version.clone()),
        scanner_path: scanner.and_then(|s| s.path.as_ref().map(|p| p.display().to_string())),
        cors_origins: state.config.allowed_origins().len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn cors_info(State(state): State<Arc<AppState>>) -> Json<CorsInfoResponse> {
    Json(CorsInfoResponse {
        allowed_origins: state.config.allowed_origins(),
        environment: state.config.environment.clone(),
        frontend_url: state.config.frontend_url.clone(),
        backend_url: state.config.backend_url.clone(),
    })
}
