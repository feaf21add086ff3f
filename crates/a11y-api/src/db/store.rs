//! SQLite-backed scan store
//!
//! Every operation is a single short statement; nothing holds a
//! transaction open across the external tool run.

use super::schema::{IssueRow, ScanListRow, ScanRow};
use super::{StoreError, StoreResult};
use a11y_core::{IssueId, IssueRecord, NewIssue, ScanId, ScanRecord, ScanStatus};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const SCAN_COLUMNS: &str = "id, url, document_title, page_url, status, created_at, completed_at";
const ISSUE_COLUMNS: &str =
    "id, scan_result_id, code, message, context, selector, type AS issue_type, recommendation_text";

/// A scan with its issue count, as listed by the API
#[derive(Debug, Clone)]
pub struct ScanListing {
    pub scan: ScanRecord,
    pub issue_count: i64,
}

#[derive(Clone)]
pub struct ScanStore {
    pool: SqlitePool,
}

impl ScanStore {
    /// Open (creating if missing) the database and apply migrations
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a new scan in the `pending` state
    pub async fn create_scan(&self, url: &str) -> StoreResult<ScanRecord> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO scan_results (url, status, created_at) VALUES (?, ?, ?)",
        )
        .bind(url)
        .bind(ScanStatus::Pending.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_scan(id).await?.ok_or(StoreError::ScanNotFound(id))
    }

    pub async fn get_scan(&self, id: ScanId) -> StoreResult<Option<ScanRecord>> {
        let row = sqlx::query_as::<_, ScanRow>(&format!(
            "SELECT {} FROM scan_results WHERE id = ?",
            SCAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ScanRecord::try_from).transpose()
    }

    /// Newest first, with total count
    pub async fn list_scans(&self, skip: i64, limit: i64) -> StoreResult<(Vec<ScanListing>, i64)> {
        let rows = sqlx::query_as::<_, ScanListRow>(&format!(
            "SELECT {}, (SELECT COUNT(*) FROM scan_issues WHERE scan_result_id = scan_results.id) AS issue_count
             FROM scan_results
             ORDER BY id DESC
             LIMIT ? OFFSET ?",
            SCAN_COLUMNS
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scan_results")
            .fetch_one(&self.pool)
            .await?;

        Ok((into_listings(rows)?, total))
    }

    /// Every scan, oldest first
    pub async fn all_scans(&self) -> StoreResult<Vec<ScanListing>> {
        let rows = sqlx::query_as::<_, ScanListRow>(&format!(
            "SELECT {}, (SELECT COUNT(*) FROM scan_issues WHERE scan_result_id = scan_results.id) AS issue_count
             FROM scan_results
             ORDER BY id ASC",
            SCAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        into_listings(rows)
    }

    /// Move a scan forward in its lifecycle.
    ///
    /// The UPDATE only matches rows in a legal predecessor state, so a
    /// terminal scan can never be moved again.
    pub async fn transition(&self, id: ScanId, to: ScanStatus) -> StoreResult<()> {
        let from = to.predecessors();
        let placeholders = vec!["?"; from.len().max(1)].join(", ");
        let sql = format!(
            "UPDATE scan_results
             SET status = ?, completed_at = COALESCE(?, completed_at)
             WHERE id = ? AND status IN ({})",
            placeholders
        );

        let completed_at = to.is_terminal().then(Utc::now);
        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(completed_at)
            .bind(id);
        if from.is_empty() {
            // pending has no predecessor; match nothing
            query = query.bind("");
        }
        for status in from {
            query = query.bind(status.as_str());
        }

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.get_scan(id).await? {
            Some(scan) => Err(StoreError::InvalidTransition {
                id,
                from: scan.status,
                to,
            }),
            None => Err(StoreError::ScanNotFound(id)),
        }
    }

    pub async fn set_page_metadata(
        &self,
        id: ScanId,
        document_title: Option<&str>,
        page_url: Option<&str>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE scan_results
             SET document_title = COALESCE(?, document_title), page_url = COALESCE(?, page_url)
             WHERE id = ?",
        )
        .bind(document_title)
        .bind(page_url)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ScanNotFound(id));
        }
        Ok(())
    }

    pub async fn insert_issue(&self, scan_id: ScanId, issue: &NewIssue) -> StoreResult<IssueId> {
        let result = sqlx::query(
            "INSERT INTO scan_issues (scan_result_id, code, message, context, selector, type)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(scan_id)
        .bind(&issue.code)
        .bind(&issue.message)
        .bind(&issue.context)
        .bind(&issue.selector)
        .bind(issue.issue_type.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn set_recommendation(&self, issue_id: IssueId, text: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE scan_issues SET recommendation_text = ? WHERE id = ?")
            .bind(text)
            .bind(issue_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::IssueNotFound(issue_id));
        }
        Ok(())
    }

    /// A recommendation previously stored for the same rule code, if any.
    ///
    /// Rows holding `exclude` are skipped.
    pub async fn cached_recommendation(
        &self,
        code: &str,
        exclude: &str,
    ) -> StoreResult<Option<String>> {
        let text = sqlx::query_scalar::<_, String>(
            "SELECT recommendation_text FROM scan_issues
             WHERE code = ? AND recommendation_text IS NOT NULL AND recommendation_text <> ?
             ORDER BY id
             LIMIT 1",
        )
        .bind(code)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await?;

        Ok(text)
    }

    pub async fn get_issue(&self, id: IssueId) -> StoreResult<Option<IssueRecord>> {
        let row = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {} FROM scan_issues WHERE id = ?",
            ISSUE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IssueRecord::try_from).transpose()
    }

    /// Issues of a scan in discovery order
    pub async fn issues_for_scan(&self, scan_id: ScanId) -> StoreResult<Vec<IssueRecord>> {
        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {} FROM scan_issues WHERE scan_result_id = ? ORDER BY id",
            ISSUE_COLUMNS
        ))
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IssueRecord::try_from).collect()
    }

    /// Delete a scan and, by cascade, its issues
    pub async fn delete_scan(&self, id: ScanId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM scan_results WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fail out scans left non-terminal by a previous process.
    ///
    /// Queued jobs live in memory only, so after a restart nothing will
    /// ever pick these up again.
    pub async fn reap_interrupted(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE scan_results SET status = ?, completed_at = ?
             WHERE status IN (?, ?)",
        )
        .bind(ScanStatus::Failed.as_str())
        .bind(Utc::now())
        .bind(ScanStatus::Pending.as_str())
        .bind(ScanStatus::Scanning.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// `(name, type)` of every column of the issue table
    pub async fn issue_columns(&self) -> StoreResult<Vec<(String, String)>> {
        let columns = sqlx::query_as::<_, (String, String)>(
            "SELECT name, type FROM pragma_table_info('scan_issues') ORDER BY cid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(columns)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn into_listings(rows: Vec<ScanListRow>) -> StoreResult<Vec<ScanListing>> {
    rows.into_iter()
        .map(|row| {
            let (row, issue_count) = row.split();
            Ok(ScanListing {
                scan: ScanRecord::try_from(row)?,
                issue_count,
            })
        })
        .collect()
}
