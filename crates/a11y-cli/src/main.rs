//! Accessibility Scanner CLI

use a11y_api::{
    config::AppConfig,
    db::ScanStore,
    recommend::{openai::provider_from_config, RecommendationResolver},
    routes::scans::validate_url,
    workers::{execute, ScanContext, ScanJob},
};
use a11y_core::{report::generate_report, ReportFormat, ScanId, ScanReport, ScanStatus};
use a11y_tools::{ExternalTool, Pa11y};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "a11y-scan")]
#[command(about = "Automated web accessibility scanner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a URL and print its report
    Scan {
        /// Page to scan
        #[arg(short, long)]
        url: String,

        /// Report format (json, pdf)
        #[arg(short, long, default_value = "json")]
        format: ReportFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the report of a stored scan
    Report {
        /// Scan id
        #[arg(short, long)]
        id: ScanId,

        /// Report format (json, pdf)
        #[arg(short, long, default_value = "json")]
        format: ReportFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply database migrations and show the issue table layout
    Migrate,

    /// Mark scans interrupted by a previous run as failed
    Reap,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    let config = AppConfig::from_env();
    let store = ScanStore::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open store at {}", config.database_url))?;

    let result = match cli.command {
        Commands::Scan { url, format, output } => cmd_scan(&config, &store, &url, format, output).await,
        Commands::Report { id, format, output } => cmd_report(&store, id, format, output).await,
        Commands::Migrate => cmd_migrate(&store).await,
        Commands::Reap => cmd_reap(&store).await,
    };

    store.close().await;
    result
}

async fn cmd_scan(
    config: &AppConfig,
    store: &ScanStore,
    url: &str,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let url = validate_url(url).map_err(|e| anyhow!("{}", e))?;

    let pa11y = Arc::new(Pa11y::new(config.tool.clone())?);
    if !pa11y.is_available().await {
        warn!("Accessibility checker not found; the scan will likely fail");
    }

    let resolver = RecommendationResolver::new(
        store.clone(),
        provider_from_config(config)?,
        Duration::from_secs(config.recommendation_timeout_secs),
    );
    let context = ScanContext::new(store.clone(), pa11y, resolver);

    let scan = store.create_scan(&url).await?;
    info!("Scanning {} (scan {})", scan.url, scan.id);

    let status = execute(
        &context,
        ScanJob {
            scan_id: scan.id,
            url: scan.url,
        },
    )
    .await;

    if status != ScanStatus::Completed {
        bail!("Scan {} ended as {}", scan.id, status);
    }

    cmd_report(store, scan.id, format, output).await
}

async fn cmd_report(
    store: &ScanStore,
    id: ScanId,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let scan = store
        .get_scan(id)
        .await?
        .ok_or_else(|| anyhow!("Scan {} not found", id))?;
    if scan.status != ScanStatus::Completed {
        bail!("Scan {} is {}, no report available", id, scan.status);
    }

    let issues = store.issues_for_scan(id).await?;
    let report = ScanReport::assemble(&scan, &issues);
    info!(
        "Scan {}: {} issues, score {}/100",
        id, report.summary.total_issues, report.summary.accessibility_score
    );

    let bytes = generate_report(&report, format)?;
    write_output(&bytes, output, format)
}

async fn cmd_migrate(store: &ScanStore) -> Result<()> {
    store.migrate().await?;

    println!("scan_issues columns:");
    for (name, kind) in store.issue_columns().await? {
        println!("  {:<22} {}", name, kind);
    }
    Ok(())
}

async fn cmd_reap(store: &ScanStore) -> Result<()> {
    let reaped = store.reap_interrupted().await?;
    println!("Marked {} interrupted scan(s) as failed", reaped);
    Ok(())
}

fn write_output(bytes: &[u8], output: Option<PathBuf>, format: ReportFormat) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None if format == ReportFormat::Pdf => {
            bail!("PDF output needs --output <file>");
        }
        None => {
            println!("{}", String::from_utf8_lossy(bytes));
        }
    }
    Ok(())
}
