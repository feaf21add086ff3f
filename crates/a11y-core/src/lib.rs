//! Accessibility Scanner Core
//!
//! This crate holds the domain model shared by the scan runner, the issue
//! store and the HTTP surface: scan lifecycle states, issue types, persisted
//! records and the read-side report assembly (JSON and PDF).

pub mod report;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub use report::{
    accessibility_score, ReportFormat, ReportIssue, ReportSummary, ScanDigest, ScanReport,
};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Report error: {0}")]
    Report(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Identifier of a persisted scan
pub type ScanId = i64;

/// Identifier of a persisted issue
pub type IssueId = i64;

/// Lifecycle state of a scan.
///
/// Transitions only move forward: `pending -> scanning -> completed`, with
/// `failed` reachable from either non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Scanning,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// Display phase shown to polling clients
    pub fn phase(&self) -> &'static str {
        match self {
            ScanStatus::Pending | ScanStatus::Scanning => "crawling",
            ScanStatus::Completed => "reporting",
            ScanStatus::Failed => "failed",
        }
    }

    /// States from which a scan may legally move into `self`
    pub fn predecessors(&self) -> &'static [ScanStatus] {
        match self {
            ScanStatus::Pending => &[],
            ScanStatus::Scanning => &[ScanStatus::Pending],
            ScanStatus::Completed => &[ScanStatus::Scanning],
            ScanStatus::Failed => &[ScanStatus::Pending, ScanStatus::Scanning],
        }
    }

    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "scanning" => Ok(ScanStatus::Scanning),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            other => Err(CoreError::Parse(format!("unknown scan status: {}", other))),
        }
    }
}

/// Kind of finding reported by the accessibility checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Error,
    Warning,
    Notice,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Error => "error",
            IssueType::Warning => "warning",
            IssueType::Notice => "notice",
        }
    }

    /// Parse a tool-provided type, treating anything missing or unknown as an error
    pub fn from_tool(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
            .unwrap_or(IssueType::Error)
    }

    pub fn severity(&self) -> &'static str {
        match self {
            IssueType::Error => "high",
            IssueType::Warning | IssueType::Notice => "medium",
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(IssueType::Error),
            "warning" => Ok(IssueType::Warning),
            "notice" => Ok(IssueType::Notice),
            other => Err(CoreError::Parse(format!("unknown issue type: {}", other))),
        }
    }
}

/// A persisted scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: ScanId,
    pub url: String,
    pub status: ScanStatus,
    pub document_title: Option<String>,
    pub page_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScanRecord {
    /// Seconds between creation and reaching a terminal state
    pub fn duration_secs(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.created_at).num_seconds().max(0))
    }
}

/// A normalized finding, ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIssue {
    pub code: String,
    pub message: String,
    pub context: Option<String>,
    pub selector: Option<String>,
    pub issue_type: IssueType,
}

/// A persisted finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: IssueId,
    pub scan_id: ScanId,
    pub code: String,
    pub message: String,
    pub context: Option<String>,
    pub selector: Option<String>,
    pub issue_type: IssueType,
    pub recommendation_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_forward_only() {
        assert!(ScanStatus::Pending.can_transition_to(ScanStatus::Scanning));
        assert!(ScanStatus::Pending.can_transition_to(ScanStatus::Failed));
        assert!(ScanStatus::Scanning.can_transition_to(ScanStatus::Completed));
        assert!(ScanStatus::Scanning.can_transition_to(ScanStatus::Failed));

        assert!(!ScanStatus::Pending.can_transition_to(ScanStatus::Completed));
        assert!(!ScanStatus::Scanning.can_transition_to(ScanStatus::Pending));
        for terminal in [ScanStatus::Completed, ScanStatus::Failed] {
            for next in [
                ScanStatus::Pending,
                ScanStatus::Scanning,
                ScanStatus::Completed,
                ScanStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_phase_mapping() {
        assert_eq!(ScanStatus::Pending.phase(), "crawling");
        assert_eq!(ScanStatus::Scanning.phase(), "crawling");
        assert_eq!(ScanStatus::Completed.phase(), "reporting");
        assert_eq!(ScanStatus::Failed.phase(), "failed");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("scanning".parse::<ScanStatus>().unwrap(), ScanStatus::Scanning);
        assert!("running".parse::<ScanStatus>().is_err());
    }

    #[test]
    fn test_issue_type_defaults_to_error() {
        assert_eq!(IssueType::from_tool(None), IssueType::Error);
        assert_eq!(IssueType::from_tool(Some("bogus")), IssueType::Error);
        assert_eq!(IssueType::from_tool(Some("Warning")), IssueType::Warning);
        assert_eq!(IssueType::from_tool(Some(" notice ")), IssueType::Notice);
    }

    #[test]
    fn test_duration() {
        let created_at = Utc::now();
        let record = ScanRecord {
            id: 1,
            url: "https://example.com".to_string(),
            status: ScanStatus::Completed,
            document_title: None,
            page_url: None,
            created_at,
            completed_at: Some(created_at + chrono::Duration::seconds(42)),
        };
        assert_eq!(record.duration_secs(), Some(42));
    }
}
