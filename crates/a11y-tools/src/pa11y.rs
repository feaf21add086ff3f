//! pa11y integration for page accessibility checks
//!
//! pa11y loads a page in a headless browser and reports WCAG violations.
//! Its JSON reporter prints either a bare array of issues or an object
//! carrying `documentTitle`, `pageUrl` and `issues`.
//!
//! Output is classified by parseability alone: parseable output is a
//! result whatever the exit code (pa11y exits non-zero when it finds
//! issues), unparseable output is an error whatever the exit code.

use crate::{
    run_command, ExternalTool, ScanOutcome, ScanRunner, ToolConfig, ToolError, ToolResult,
};
use a11y_core::{IssueType, NewIssue};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DIAGNOSTIC_CHARS: usize = 500;
const VERSION_TIMEOUT_SECS: u64 = 30;

/// pa11y runner
pub struct Pa11y {
    config: ToolConfig,
    program: String,
    base_args: Vec<String>,
    executable: Option<PathBuf>,
}

impl Pa11y {
    pub fn new(config: ToolConfig) -> ToolResult<Self> {
        let (program, base_args) = config
            .command
            .split_first()
            .map(|(program, rest)| (program.clone(), rest.to_vec()))
            .ok_or_else(|| ToolError::Config("empty pa11y command".to_string()))?;

        let executable = crate::get_command_path(&program);

        Ok(Self {
            config,
            program,
            base_args,
            executable,
        })
    }

    /// Arguments for one scan of `url`
    fn scan_args(&self, url: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend(
            ["--reporter", "json", "--include-warnings", "--include-notices"]
                .iter()
                .map(|s| s.to_string()),
        );
        if let Some(standard) = &self.config.standard {
            args.push("--standard".to_string());
            args.push(standard.clone());
        }
        for runner in &self.config.runners {
            args.push("--runner".to_string());
            args.push(runner.clone());
        }
        args.push(url.to_string());
        args
    }

    /// Scan a single page
    pub async fn scan(&self, url: &str) -> ToolResult<ScanOutcome> {
        if !has_http_scheme(url) {
            return Err(ToolError::InvalidUrl(url.to_string()));
        }

        info!(url, "Starting pa11y scan");
        let args = self.scan_args(url);

        let (stdout, stderr, code) =
            match run_command(&self.program, &args, self.config.timeout_secs).await {
                Ok(output) => output,
                Err(ToolError::Timeout(secs)) => {
                    warn!(url, secs, "pa11y timed out, continuing with no findings");
                    return Ok(ScanOutcome::timed_out());
                }
                Err(e) => return Err(e),
            };

        match parse_output(&stdout) {
            Some(outcome) => {
                if code != 0 {
                    warn!(
                        url,
                        code,
                        stderr = %truncate(&stderr),
                        "pa11y exited with non-zero status, using its report"
                    );
                }
                info!(url, issues = outcome.issues.len(), "pa11y scan finished");
                Ok(outcome)
            }
            None => {
                debug!(url, stdout = %truncate(&stdout), "unparseable pa11y output");
                Err(ToolError::ParseError(format!(
                    "pa11y exited with {} and produced no JSON report: {}",
                    code,
                    truncate(if stderr.trim().is_empty() { &stdout } else { &stderr })
                )))
            }
        }
    }
}

#[async_trait]
impl ScanRunner for Pa11y {
    async fn run(&self, url: &str) -> ToolResult<ScanOutcome> {
        self.scan(url).await
    }
}

#[async_trait]
impl ExternalTool for Pa11y {
    fn name(&self) -> &str {
        "pa11y"
    }

    /// The launcher being on PATH is not enough (`npx` without pa11y
    /// installed), so availability means `--version` succeeds.
    async fn is_available(&self) -> bool {
        self.version().await.is_ok()
    }

    async fn version(&self) -> ToolResult<String> {
        if self.executable.is_none() {
            return Err(ToolError::NotFound(self.program.clone()));
        }

        let mut args = self.base_args.clone();
        args.push("--version".to_string());
        let (stdout, stderr, code) = run_command(&self.program, &args, VERSION_TIMEOUT_SECS).await?;
        if code != 0 {
            return Err(ToolError::ExecutionFailed(format!(
                "{} --version exited with {}: {}",
                self.program,
                code,
                truncate(&stderr)
            )));
        }

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ToolError::ParseError("empty version output".to_string()))
    }

    fn executable_path(&self) -> Option<&Path> {
        self.executable.as_deref()
    }
}

/// One finding as printed by the JSON reporter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIssue {
    pub code: Option<String>,
    pub rule: Option<String>,
    pub message: Option<String>,
    pub context: Option<String>,
    pub selector: Option<String>,
    #[serde(rename = "type")]
    pub issue_type: Option<String>,
}

impl RawIssue {
    pub fn normalize(self) -> NewIssue {
        let code = self
            .code
            .or(self.rule)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "No message".to_string());

        NewIssue {
            code,
            message,
            context: self.context,
            selector: self.selector,
            issue_type: IssueType::from_tool(self.issue_type.as_deref()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReporterOutput {
    Issues(Vec<RawIssue>),
    Results {
        #[serde(rename = "documentTitle")]
        document_title: Option<String>,
        #[serde(rename = "pageUrl")]
        page_url: Option<String>,
        issues: Vec<RawIssue>,
    },
}

/// Parse reporter output; `None` when it is not one of the expected shapes
pub fn parse_output(stdout: &str) -> Option<ScanOutcome> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }

    let outcome = match serde_json::from_str::<ReporterOutput>(trimmed).ok()? {
        ReporterOutput::Issues(issues) => ScanOutcome {
            issues: issues.into_iter().map(RawIssue::normalize).collect(),
            ..ScanOutcome::default()
        },
        ReporterOutput::Results {
            document_title,
            page_url,
            issues,
        } => ScanOutcome {
            issues: issues.into_iter().map(RawIssue::normalize).collect(),
            document_title,
            page_url,
            timed_out: false,
        },
    };
    Some(outcome)
}

fn has_http_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn truncate(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > DIAGNOSTIC_CHARS {
        let head: String = text.chars().take(DIAGNOSTIC_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
