//! Background scan worker
//!
//! Jobs are queued on an in-memory channel and drained by a dispatcher
//! that runs at most `max_concurrent` scans at a time. Every job ends
//! with its scan in a terminal state, including when the worker panics.

use crate::db::{ScanStore, StoreError};
use crate::recommend::RecommendationResolver;
use a11y_core::{ScanId, ScanRecord, ScanStatus};
use a11y_tools::ScanRunner;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Scan queue is closed")]
    QueueClosed,
}

/// Everything a worker needs to carry a scan to completion
pub struct ScanContext {
    pub store: ScanStore,
    pub runner: Arc<dyn ScanRunner>,
    pub resolver: RecommendationResolver,
}

impl ScanContext {
    pub fn new(store: ScanStore, runner: Arc<dyn ScanRunner>, resolver: RecommendationResolver) -> Self {
        Self {
            store,
            runner,
            resolver,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanJob {
    pub scan_id: ScanId,
    pub url: String,
}

#[derive(Clone)]
pub struct ScanCoordinator {
    context: Arc<ScanContext>,
    jobs: mpsc::UnboundedSender<ScanJob>,
}

impl ScanCoordinator {
    /// Spawn the dispatcher; must be called inside a tokio runtime
    pub fn start(context: Arc<ScanContext>, max_concurrent: usize) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(context.clone(), queue, max_concurrent.max(1)));
        Self { context, jobs }
    }

    /// Create a pending scan and queue it. The record is committed
    /// before this returns, so its status is immediately queryable.
    pub async fn submit(&self, url: &str) -> Result<ScanRecord, CoordinatorError> {
        let scan = self.context.store.create_scan(url).await?;
        info!(scan_id = scan.id, url = %scan.url, "Scan queued");

        let job = ScanJob {
            scan_id: scan.id,
            url: scan.url.clone(),
        };
        if self.jobs.send(job).is_err() {
            error!(scan_id = scan.id, "Scan queue closed, failing scan");
            mark_failed(&self.context, scan.id).await;
            return Err(CoordinatorError::QueueClosed);
        }
        Ok(scan)
    }
}

async fn dispatch(context: Arc<ScanContext>, mut queue: mpsc::UnboundedReceiver<ScanJob>, max_concurrent: usize) {
    let permits = Arc::new(Semaphore::new(max_concurrent));

    while let Some(job) = queue.recv().await {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let context = context.clone();

        tokio::spawn(async move {
            let scan_id = job.scan_id;
            let worker = {
                let context = context.clone();
                tokio::spawn(async move { execute(&context, job).await })
            };

            if let Err(e) = worker.await {
                error!(scan_id, error = %e, "Scan worker aborted");
                mark_failed(&context, scan_id).await;
            }
            drop(permit);
        });
    }

    debug!("Scan queue closed, dispatcher exiting");
}

/// Run one scan to a terminal state and return that state
pub async fn execute(context: &ScanContext, job: ScanJob) -> ScanStatus {
    let ScanJob { scan_id, url } = job;
    info!(scan_id, %url, "Starting scan");

    if let Err(e) = context.store.transition(scan_id, ScanStatus::Scanning).await {
        error!(scan_id, error = %e, "Could not start scan");
        return mark_failed(context, scan_id).await;
    }

    let outcome = match context.runner.run(&url).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(scan_id, error = %e, "Accessibility checker failed");
            return mark_failed(context, scan_id).await;
        }
    };

    if outcome.timed_out {
        warn!(scan_id, "Checker timed out, completing with no issues");
    }

    if outcome.document_title.is_some() || outcome.page_url.is_some() {
        if let Err(e) = context
            .store
            .set_page_metadata(scan_id, outcome.document_title.as_deref(), outcome.page_url.as_deref())
            .await
        {
            warn!(scan_id, error = %e, "Failed to store page metadata");
        }
    }

    let mut stored = 0usize;
    for issue in &outcome.issues {
        let issue_id = match context.store.insert_issue(scan_id, issue).await {
            Ok(id) => id,
            Err(e) => {
                warn!(scan_id, code = %issue.code, error = %e, "Skipping issue");
                continue;
            }
        };
        stored += 1;

        context
            .resolver
            .resolve(&issue.code, Some(&issue.message), Some(issue_id))
            .await;
    }

    match context.store.transition(scan_id, ScanStatus::Completed).await {
        Ok(()) => {
            info!(scan_id, issues = stored, "Scan completed");
            ScanStatus::Completed
        }
        Err(e) => {
            error!(scan_id, error = %e, "Could not complete scan");
            mark_failed(context, scan_id).await
        }
    }
}

/// Fail a scan if it is still in flight; returns the status actually stored
async fn mark_failed(context: &ScanContext, scan_id: ScanId) -> ScanStatus {
    if let Err(e) = context.store.transition(scan_id, ScanStatus::Failed).await {
        warn!(scan_id, error = %e, "Could not mark scan failed");
    }

    match context.store.get_scan(scan_id).await {
        Ok(Some(scan)) => scan.status,
        _ => ScanStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::temp_store;
    use crate::recommend::{
        fallback_recommendation, static_recommendation, DisabledProvider, ProviderError,
        RecommendationProvider,
    };
    use a11y_core::{IssueType, NewIssue, ReportSummary};
    use a11y_tools::{ScanOutcome, ToolError, ToolResult};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    enum Behavior {
        Issues(Vec<NewIssue>),
        Fail,
        TimedOut,
        Panic,
    }

    struct StubRunner(Behavior);

    #[async_trait]
    impl ScanRunner for StubRunner {
        async fn run(&self, _url: &str) -> ToolResult<ScanOutcome> {
            match &self.0 {
                Behavior::Issues(issues) => Ok(ScanOutcome {
                    issues: issues.clone(),
                    document_title: Some("Example Domain".to_string()),
                    page_url: Some("https://example.com/".to_string()),
                    timed_out: false,
                }),
                Behavior::Fail => Err(ToolError::ParseError("not json".to_string())),
                Behavior::TimedOut => Ok(ScanOutcome::timed_out()),
                Behavior::Panic => panic!("checker crashed"),
            }
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl RecommendationProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok("Generated advice.".to_string())
        }
    }

    fn issue(code: &str, issue_type: IssueType) -> NewIssue {
        NewIssue {
            code: code.to_string(),
            message: format!("{} problem", code),
            context: Some("<img src=\"a.png\">".to_string()),
            selector: Some("html > body > img".to_string()),
            issue_type,
        }
    }

    async fn context(
        behavior: Behavior,
        provider: Arc<dyn RecommendationProvider>,
    ) -> (TempDir, Arc<ScanContext>) {
        let (dir, store) = temp_store().await;
        let resolver = RecommendationResolver::new(store.clone(), provider, Duration::from_secs(1));
        let context = ScanContext::new(store, Arc::new(StubRunner(behavior)), resolver);
        (dir, Arc::new(context))
    }

    async fn run_job(context: &ScanContext) -> (ScanId, ScanStatus) {
        let scan = context.store.create_scan("https://example.com/").await.unwrap();
        let status = execute(
            context,
            ScanJob {
                scan_id: scan.id,
                url: scan.url,
            },
        )
        .await;
        (scan.id, status)
    }

    async fn wait_for_terminal(store: &ScanStore, id: ScanId) -> ScanRecord {
        for _ in 0..200 {
            let scan = store.get_scan(id).await.unwrap().unwrap();
            if scan.status.is_terminal() {
                return scan;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("scan {} never reached a terminal state", id);
    }

    #[tokio::test]
    async fn test_zero_issues_completes_with_full_score() {
        let (_dir, ctx) = context(Behavior::Issues(Vec::new()), Arc::new(DisabledProvider)).await;
        let (id, status) = run_job(&ctx).await;

        assert_eq!(status, ScanStatus::Completed);
        let scan = ctx.store.get_scan(id).await.unwrap().unwrap();
        assert!(scan.completed_at.is_some());
        assert_eq!(scan.document_title.as_deref(), Some("Example Domain"));

        let issues = ctx.store.issues_for_scan(id).await.unwrap();
        assert_eq!(ReportSummary::from_issues(&issues).accessibility_score, 100);
    }

    #[tokio::test]
    async fn test_issues_are_stored_with_recommendations() {
        let issues = vec![
            issue("color-contrast", IssueType::Error),
            issue("WCAG2AA.Principle1.Guideline1_1.1_1_1.H37", IssueType::Warning),
        ];
        let (_dir, ctx) = context(Behavior::Issues(issues), Arc::new(EchoProvider)).await;
        let (id, status) = run_job(&ctx).await;

        assert_eq!(status, ScanStatus::Completed);
        let stored = ctx.store.issues_for_scan(id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(
            stored[0].recommendation_text.as_deref(),
            static_recommendation("color-contrast")
        );
        assert_eq!(stored[1].recommendation_text.as_deref(), Some("Generated advice."));
        assert_eq!(stored[1].issue_type, IssueType::Warning);
    }

    #[tokio::test]
    async fn test_provider_failure_still_completes() {
        let code = "WCAG2AA.Principle3.Guideline3_1.3_1_1.H57.2";
        let (_dir, ctx) = context(
            Behavior::Issues(vec![issue(code, IssueType::Error)]),
            Arc::new(DisabledProvider),
        )
        .await;
        let (id, status) = run_job(&ctx).await;

        assert_eq!(status, ScanStatus::Completed);
        let stored = ctx.store.issues_for_scan(id).await.unwrap();
        let text = stored[0].recommendation_text.clone().unwrap();
        assert_eq!(text, fallback_recommendation(code));
        assert!(text.contains(code));
    }

    #[tokio::test]
    async fn test_runner_error_fails_scan() {
        let (_dir, ctx) = context(Behavior::Fail, Arc::new(DisabledProvider)).await;
        let (id, status) = run_job(&ctx).await;

        assert_eq!(status, ScanStatus::Failed);
        let scan = ctx.store.get_scan(id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::Failed);
        assert!(ctx.store.issues_for_scan(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_completes_empty() {
        let (_dir, ctx) = context(Behavior::TimedOut, Arc::new(DisabledProvider)).await;
        let (id, status) = run_job(&ctx).await;

        assert_eq!(status, ScanStatus::Completed);
        assert!(ctx.store.issues_for_scan(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_scan_is_not_rerun() {
        let (_dir, ctx) = context(
            Behavior::Issues(vec![issue("label", IssueType::Notice)]),
            Arc::new(DisabledProvider),
        )
        .await;
        let (id, _) = run_job(&ctx).await;

        let again = execute(
            &ctx,
            ScanJob {
                scan_id: id,
                url: "https://example.com/".to_string(),
            },
        )
        .await;
        assert_eq!(again, ScanStatus::Completed);
        assert_eq!(ctx.store.issues_for_scan(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_reaches_terminal_state() {
        let (_dir, ctx) = context(
            Behavior::Issues(vec![issue("image-alt", IssueType::Error)]),
            Arc::new(DisabledProvider),
        )
        .await;
        let coordinator = ScanCoordinator::start(ctx.clone(), 2);

        let scan = coordinator.submit("https://example.com/").await.unwrap();
        assert!(!scan.status.is_terminal());

        let done = wait_for_terminal(&ctx.store, scan.id).await;
        assert_eq!(done.status, ScanStatus::Completed);
    }

    #[tokio::test]
    async fn test_panicking_worker_fails_scan() {
        let (_dir, ctx) = context(Behavior::Panic, Arc::new(DisabledProvider)).await;
        let coordinator = ScanCoordinator::start(ctx.clone(), 1);

        let scan = coordinator.submit("https://example.com/").await.unwrap();
        let done = wait_for_terminal(&ctx.store, scan.id).await;
        assert_eq!(done.status, ScanStatus::Failed);
    }

    #[tokio::test]
    async fn test_many_jobs_with_single_permit() {
        let (_dir, ctx) = context(Behavior::Issues(Vec::new()), Arc::new(DisabledProvider)).await;
        let coordinator = ScanCoordinator::start(ctx.clone(), 1);

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(coordinator.submit("https://example.com/").await.unwrap().id);
        }
        for id in ids {
            assert_eq!(wait_for_terminal(&ctx.store, id).await.status, ScanStatus::Completed);
        }
    }
}
