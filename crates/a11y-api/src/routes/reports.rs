//! Report generation routes

use super::scans::scan_id;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use a11y_core::{
    report::{generate_report, pdf},
    ReportFormat, ScanDigest, ScanId, ScanReport, ScanStatus,
};
use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Url;
use std::sync::Arc;

/// Load a report; only completed scans have one
async fn load_report(state: &AppState, id: ScanId) -> ApiResult<ScanReport> {
    let scan = state.store.get_scan(id).await?.ok_or(ApiError::NotFound)?;

    match scan.status {
        ScanStatus::Pending | ScanStatus::Scanning => Err(ApiError::NotReady),
        ScanStatus::Failed => Err(ApiError::ScanFailed),
        ScanStatus::Completed => {
            let issues = state.store.issues_for_scan(id).await?;
            Ok(ScanReport::assemble(&scan, &issues))
        }
    }
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    path: Result<Path<ScanId>, PathRejection>,
) -> ApiResult<Json<ScanReport>> {
    let id = scan_id(path)?;
    Ok(Json(load_report(&state, id).await?))
}

pub async fn download_report_pdf(
    State(state): State<Arc<AppState>>,
    path: Result<Path<ScanId>, PathRejection>,
) -> ApiResult<Response> {
    let id = scan_id(path)?;
    let report = load_report(&state, id).await?;
    let bytes = generate_report(&report, ReportFormat::Pdf)?;

    let filename = report_filename(&report.url, report.scan_id);

    Ok(pdf_attachment(bytes, &filename))
}

/// Every stored scan in one PDF, oldest first
pub async fn download_all_pdf(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let digests: Vec<ScanDigest> = state
        .store
        .all_scans()
        .await?
        .iter()
        .map(|listing| ScanDigest::new(&listing.scan, listing.issue_count))
        .collect();
    let bytes = pdf::generate_digest(&digests)?;

    Ok(pdf_attachment(bytes, SCAN_RESULTS_FILENAME))
}

const SCAN_RESULTS_FILENAME: &str = "scan_results.pdf";

fn pdf_attachment(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
            (
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                "Content-Disposition".to_string(),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// `accessibility-report-{host}-{id}.pdf`, dots in the host replaced
pub fn report_filename(url: &str, id: ScanId) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.replace('.', "_")))
        .unwrap_or_else(|| "site".to_string());
    format!("accessibility-report-{}-{}.pdf", host, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_filename() {
        assert_eq!(
            report_filename("https://www.example.com/page", 7),
            "accessibility-report-www_example_com-7.pdf"
        );
        assert_eq!(report_filename("garbage", 1), "accessibility-report-site-1.pdf");
    }
}
