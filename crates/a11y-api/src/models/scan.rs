//! Scan request and response models

use a11y_core::{ScanId, ScanStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Serialize, Deserialize)]
pub struct StartScanRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartScanResponse {
    pub scan_id: ScanId,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanStatusResponse {
    pub scan_id: ScanId,
    pub status: ScanStatus,
    pub phase: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    /// `(skip, limit)` clamped to sane bounds
    pub fn bounds(&self) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (skip, limit)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanListItem {
    pub scan_id: ScanId,
    pub url: String,
    pub status: ScanStatus,
    pub document_title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub issue_count: i64,
    pub report_url: String,
    pub download_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    pub skip: i64,
    pub limit: i64,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanListResponse {
    pub results: Vec<ScanListItem>,
    /// One PDF covering every stored scan
    pub download_all_url: String,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_bounds() {
        assert_eq!(ListQuery::default().bounds(), (0, 10));
        let query = ListQuery {
            skip: Some(-4),
            limit: Some(1000),
        };
        assert_eq!(query.bounds(), (0, 100));
        let query = ListQuery {
            skip: Some(20),
            limit: Some(0),
        };
        assert_eq!(query.bounds(), (20, 1));
    }
}
