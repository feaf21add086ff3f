//! External Tool Integration for Accessibility Scanning
//!
//! The actual page evaluation is delegated to an external command-line
//! checker. This crate spawns it with a hard timeout, parses its JSON
//! reporter output and normalizes the findings into [`NewIssue`]s.

pub mod pa11y;

use a11y_core::NewIssue;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tracing::{debug, warn};

pub use pa11y::{Pa11y, RawIssue};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool timeout after {0} seconds")]
    Timeout(u64),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Trait for external tool integrations
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Get tool name
    fn name(&self) -> &str;

    /// Check if tool is available
    async fn is_available(&self) -> bool;

    /// Get tool version
    async fn version(&self) -> ToolResult<String>;

    /// Get tool executable path
    fn executable_path(&self) -> Option<&Path>;
}

/// Availability snapshot of an external tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    /// Ask the tool for its version; any failure marks it unavailable
    pub async fn check(tool: &dyn ExternalTool) -> Self {
        let version = match tool.version().await {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(tool = tool.name(), error = %e, "Tool unavailable");
                None
            }
        };

        Self {
            name: tool.name().to_string(),
            available: version.is_some(),
            version,
            path: tool.executable_path().map(Path::to_path_buf),
        }
    }
}

/// Something that can evaluate a single URL and report its findings.
///
/// A timed-out run is not an error: it yields an empty, `timed_out`
/// outcome so the scan can still reach a terminal state.
#[async_trait]
pub trait ScanRunner: Send + Sync {
    async fn run(&self, url: &str) -> ToolResult<ScanOutcome>;
}

/// Findings produced by one run of the checker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    pub issues: Vec<NewIssue>,
    pub document_title: Option<String>,
    pub page_url: Option<String>,
    pub timed_out: bool,
}

impl ScanOutcome {
    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }
}

/// Tool configuration
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Program and leading arguments, e.g. `["npx", "pa11y"]`
    pub command: Vec<String>,

    /// Hard wall-clock bound for one run (seconds)
    pub timeout_secs: u64,

    /// Accessibility standard passed to the checker
    pub standard: Option<String>,

    /// Test runners to enable; empty keeps the checker's default
    pub runners: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            command: vec!["npx".to_string(), "pa11y".to_string()],
            timeout_secs: 60,
            standard: Some("WCAG2AA".to_string()),
            runners: Vec::new(),
        }
    }
}

/// Run a command with timeout, returning `(stdout, stderr, exit_code)`.
///
/// On unix the child leads its own process group, and the whole group is
/// killed when the timeout elapses, so helpers it spawned (a headless
/// browser under `npx pa11y`) do not outlive the run.
pub async fn run_command(
    cmd: &str,
    args: &[String],
    timeout_secs: u64,
) -> ToolResult<(String, String, i32)> {
    use tokio::process::Command;
    use tokio::time::{timeout, Duration};

    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command
        .spawn()
        .map_err(|e| ToolError::ExecutionFailed(format!("{}: {}", cmd, e)))?;
    let pid = child.id();

    match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let code = output.status.code().unwrap_or(-1);
            Ok((stdout, stderr, code))
        }
        Ok(Err(e)) => Err(ToolError::Io(e)),
        Err(_) => {
            kill_process_group(cmd, pid);
            Err(ToolError::Timeout(timeout_secs))
        }
    }
}

/// SIGKILL every process in the group led by `pid`. The leader itself is
/// reaped by tokio once its handle is dropped.
#[cfg(unix)]
fn kill_process_group(cmd: &str, pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => debug!(cmd, pid, "Killed timed-out process group"),
        Err(e) => warn!(cmd, pid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_cmd: &str, _pid: Option<u32>) {}

/// Get command path
pub fn get_command_path(cmd: &str) -> Option<PathBuf> {
    which::which(cmd).ok()
}
