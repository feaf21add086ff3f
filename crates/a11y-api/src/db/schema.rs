//! Database row types

use super::{StoreError, StoreResult};
use a11y_core::{IssueRecord, ScanRecord};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct ScanRow {
    pub id: i64,
    pub url: String,
    pub document_title: Option<String>,
    pub page_url: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ScanRow> for ScanRecord {
    type Error = StoreError;

    fn try_from(row: ScanRow) -> StoreResult<Self> {
        let status = row
            .status
            .parse()
            .map_err(|e| StoreError::Decode(format!("scan {}: {}", row.id, e)))?;

        Ok(ScanRecord {
            id: row.id,
            url: row.url,
            status,
            document_title: row.document_title,
            page_url: row.page_url,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ScanListRow {
    pub id: i64,
    pub url: String,
    pub document_title: Option<String>,
    pub page_url: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub issue_count: i64,
}

impl ScanListRow {
    pub fn split(self) -> (ScanRow, i64) {
        (
            ScanRow {
                id: self.id,
                url: self.url,
                document_title: self.document_title,
                page_url: self.page_url,
                status: self.status,
                created_at: self.created_at,
                completed_at: self.completed_at,
            },
            self.issue_count,
        )
    }
}

#[derive(Debug, FromRow)]
pub struct IssueRow {
    pub id: i64,
    pub scan_result_id: i64,
    pub code: String,
    pub message: String,
    pub context: Option<String>,
    pub selector: Option<String>,
    pub issue_type: String,
    pub recommendation_text: Option<String>,
}

impl TryFrom<IssueRow> for IssueRecord {
    type Error = StoreError;

    fn try_from(row: IssueRow) -> StoreResult<Self> {
        let issue_type = row
            .issue_type
            .parse()
            .map_err(|e| StoreError::Decode(format!("issue {}: {}", row.id, e)))?;

        Ok(IssueRecord {
            id: row.id,
            scan_id: row.scan_result_id,
            code: row.code,
            message: row.message,
            context: row.context,
            selector: row.selector,
            issue_type,
            recommendation_text: row.recommendation_text,
        })
    }
}
