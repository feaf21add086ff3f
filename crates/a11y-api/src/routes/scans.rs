//! Scan management routes

use crate::error::{ApiError, ApiResult};
use crate::models::{
    ListQuery, Pagination, ScanListItem, ScanListResponse, ScanStatusResponse, StartScanRequest,
    StartScanResponse,
};
use crate::AppState;
use a11y_core::ScanId;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use reqwest::Url;
use std::sync::Arc;
use tracing::info;

/// Accept only absolute http(s) URLs with a host; returns the normalized form
pub fn validate_url(raw: &str) -> ApiResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::Validation("URL is required".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| ApiError::Validation(format!("Invalid URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::Validation(format!(
            "Unsupported URL scheme: {}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ApiError::Validation("URL must include a host".to_string()));
    }

    Ok(url.to_string())
}

pub(crate) fn scan_id(path: Result<Path<ScanId>, PathRejection>) -> ApiResult<ScanId> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

pub async fn start_scan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartScanRequest>, JsonRejection>,
) -> ApiResult<Json<StartScanResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let url = validate_url(&request.url)?;

    let scan = state.coordinator.submit(&url).await?;
    info!(scan_id = scan.id, url = %scan.url, "Scan started");

    Ok(Json(StartScanResponse {
        scan_id: scan.id,
        status: "started".to_string(),
        message: format!("Accessibility scan initiated for {}", scan.url),
    }))
}

pub async fn scan_status(
    State(state): State<Arc<AppState>>,
    path: Result<Path<ScanId>, PathRejection>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let id = scan_id(path)?;
    let scan = state.store.get_scan(id).await?.ok_or(ApiError::NotFound)?;

    Ok(Json(ScanStatusResponse {
        scan_id: scan.id,
        status: scan.status,
        phase: scan.status.phase().to_string(),
        url: scan.url,
        created_at: scan.created_at,
    }))
}

pub async fn list_scans(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ScanListResponse>> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    let (skip, limit) = query.bounds();

    let (listings, count) = state.store.list_scans(skip, limit).await?;
    let results = listings
        .into_iter()
        .map(|listing| {
            let id = listing.scan.id;
            ScanListItem {
                scan_id: id,
                url: listing.scan.url,
                status: listing.scan.status,
                document_title: listing.scan.document_title,
                created_at: listing.scan.created_at,
                issue_count: listing.issue_count,
                report_url: format!("/api/v1/scan/{}/report", id),
                download_url: format!("/api/v1/scan/{}/report/pdf", id),
            }
        })
        .collect();

    Ok(Json(ScanListResponse {
        results,
        download_all_url: "/api/v1/scan/results/download".to_string(),
        pagination: Pagination { skip, limit, count },
    }))
}

pub async fn delete_scan(
    State(state): State<Arc<AppState>>,
    path: Result<Path<ScanId>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = scan_id(path)?;
    let scan = state.store.get_scan(id).await?.ok_or(ApiError::NotFound)?;

    if !scan.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Scan {} is still {}",
            id, scan.status
        )));
    }

    if state.store.delete_scan(id).await? {
        info!(scan_id = id, "Scan deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_normalizes() {
        assert_eq!(validate_url(" https://example.com ").unwrap(), "https://example.com/");
        assert_eq!(
            validate_url("http://Example.com/a?b=1").unwrap(),
            "http://example.com/a?b=1"
        );
    }

    #[test]
    fn test_validate_url_rejects() {
        for bad in ["", "not a url", "ftp://example.com", "file:///etc/passwd", "example.com"] {
            assert!(
                matches!(validate_url(bad), Err(ApiError::Validation(_))),
                "accepted {:?}",
                bad
            );
        }
    }
}
