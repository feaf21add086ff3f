//! JSON report generation

use super::ScanReport;
use crate::{CoreError, CoreResult};

pub fn generate(report: &ScanReport) -> CoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(report)
        .map_err(|e| CoreError::Report(format!("JSON serialization failed: {}", e)))
}
