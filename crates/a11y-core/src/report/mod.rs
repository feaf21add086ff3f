//! Report generation
//!
//! Pure read-side assembly over a scan and its issues. Readiness checks
//! (pending, failed) are the caller's concern.

pub mod json;
pub mod pdf;

use crate::{CoreResult, IssueId, IssueRecord, IssueType, ScanId, ScanRecord, ScanStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const NO_RECOMMENDATION: &str = "No recommendation available";

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Pdf,
}

impl std::str::FromStr for ReportFormat {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "pdf" => Ok(ReportFormat::Pdf),
            other => Err(crate::CoreError::Parse(format!("unknown report format: {}", other))),
        }
    }
}

/// Aggregate counts for a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub notices: usize,
    pub accessibility_score: u32,
}

impl ReportSummary {
    pub fn from_issues(issues: &[IssueRecord]) -> Self {
        let count = |t: IssueType| issues.iter().filter(|i| i.issue_type == t).count();
        let errors = count(IssueType::Error);
        let warnings = count(IssueType::Warning);
        let notices = count(IssueType::Notice);

        Self {
            total_issues: issues.len(),
            errors,
            warnings,
            notices,
            accessibility_score: accessibility_score(errors, warnings, notices),
        }
    }
}

/// `max(0, 100 - 5*errors - 2*warnings - notices)`
pub fn accessibility_score(errors: usize, warnings: usize, notices: usize) -> u32 {
    let penalty = errors
        .saturating_mul(5)
        .saturating_add(warnings.saturating_mul(2))
        .saturating_add(notices);
    100usize.saturating_sub(penalty) as u32
}

/// One issue as presented in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportIssue {
    pub id: IssueId,
    pub code: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub message: String,
    pub context: Option<String>,
    pub selector: Option<String>,
    pub recommendation: String,
    pub severity: String,
}

impl From<&IssueRecord> for ReportIssue {
    fn from(issue: &IssueRecord) -> Self {
        Self {
            id: issue.id,
            code: issue.code.clone(),
            issue_type: issue.issue_type,
            message: issue.message.clone(),
            context: issue.context.clone(),
            selector: issue.selector.clone(),
            recommendation: issue
                .recommendation_text
                .clone()
                .unwrap_or_else(|| NO_RECOMMENDATION.to_string()),
            severity: issue.issue_type.severity().to_string(),
        }
    }
}

/// Aggregated accessibility report for one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: ScanId,
    pub url: String,
    pub status: ScanStatus,
    pub document_title: Option<String>,
    pub page_url: Option<String>,
    pub issues: Vec<ReportIssue>,
    pub summary: ReportSummary,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds from creation to completion
    pub scan_duration: Option<i64>,
}

impl ScanReport {
    pub fn assemble(scan: &ScanRecord, issues: &[IssueRecord]) -> Self {
        Self {
            scan_id: scan.id,
            url: scan.url.clone(),
            status: scan.status,
            document_title: scan.document_title.clone(),
            page_url: scan.page_url.clone(),
            issues: issues.iter().map(ReportIssue::from).collect(),
            summary: ReportSummary::from_issues(issues),
            created_at: scan.created_at,
            completed_at: scan.completed_at,
            scan_duration: scan.duration_secs(),
        }
    }
}

/// Render a report in the requested format
/// One stored scan as listed in the all-scans PDF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDigest {
    pub scan_id: ScanId,
    pub url: String,
    pub status: ScanStatus,
    pub document_title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub issue_count: i64,
}

impl ScanDigest {
    pub fn new(scan: &ScanRecord, issue_count: i64) -> Self {
        Self {
            scan_id: scan.id,
            url: scan.url.clone(),
            status: scan.status,
            document_title: scan.document_title.clone(),
            created_at: scan.created_at,
            issue_count,
        }
    }
}

pub fn generate_report(report: &ScanReport, format: ReportFormat) -> CoreResult<Vec<u8>> {
    match format {
        ReportFormat::Json => json::generate(report),
        ReportFormat::Pdf => pdf::generate(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: IssueId, issue_type: IssueType, recommendation: Option<&str>) -> IssueRecord {
        IssueRecord {
            id,
            scan_id: 7,
            code: "color-contrast".to_string(),
            message: "Low contrast".to_string(),
            context: Some("<p>hi</p>".to_string()),
            selector: Some("p".to_string()),
            issue_type,
            recommendation_text: recommendation.map(str::to_string),
        }
    }

    fn scan() -> ScanRecord {
        ScanRecord {
            id: 7,
            url: "https://example.com".to_string(),
            status: ScanStatus::Completed,
            document_title: Some("Example".to_string()),
            page_url: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_score_formula() {
        assert_eq!(accessibility_score(0, 0, 0), 100);
        assert_eq!(accessibility_score(2, 3, 4), 100 - 10 - 6 - 4);
        assert_eq!(accessibility_score(30, 0, 0), 0);
        assert_eq!(accessibility_score(usize::MAX, usize::MAX, 1), 0);
    }

    #[test]
    fn test_summary_counts_add_up() {
        let issues = vec![
            issue(1, IssueType::Error, None),
            issue(2, IssueType::Error, None),
            issue(3, IssueType::Warning, None),
            issue(4, IssueType::Notice, None),
        ];
        let summary = ReportSummary::from_issues(&issues);

        assert_eq!(summary.total_issues, 4);
        assert_eq!(summary.errors + summary.warnings + summary.notices, summary.total_issues);
        assert_eq!(summary.accessibility_score, 100 - 10 - 2 - 1);
    }

    #[test]
    fn test_empty_report_scores_100() {
        let report = ScanReport::assemble(&scan(), &[]);
        assert_eq!(report.summary.total_issues, 0);
        assert_eq!(report.summary.accessibility_score, 100);
    }

    #[test]
    fn test_report_issue_fields() {
        let report = ScanReport::assemble(
            &scan(),
            &[
                issue(1, IssueType::Error, Some("Fix it")),
                issue(2, IssueType::Warning, None),
            ],
        );

        assert_eq!(report.issues[0].recommendation, "Fix it");
        assert_eq!(report.issues[0].severity, "high");
        assert_eq!(report.issues[1].recommendation, NO_RECOMMENDATION);
        assert_eq!(report.issues[1].severity, "medium");
    }

    #[test]
    fn test_report_format_parse() {
        assert_eq!("PDF".parse::<ReportFormat>().unwrap(), ReportFormat::Pdf);
        assert!("markdown".parse::<ReportFormat>().is_err());
    }
}
