//! `glass-fruit-shorts` - scheduled glass-fruit ASMR short pipeline.
//!
//! ## Commands
//!
//! - `run`: one automation cycle (the default)
//! - `daemon`: repeat cycles on the `Schedule_Hours` cadence until Ctrl-C
//! - `setup`: create the tracker, catalog and settings tables
//! - `check`: verify every table can be read

use anyhow::Result;
use clap::{Parser, Subcommand};
use glass_fruit_shorts::backend::{Workspace, build_producer, build_publisher, http_client};
use glass_fruit_shorts::config::{Config, ProducerKind};
use glass_fruit_shorts::cycle::{AutomationCycle, CycleOptions, CycleReport};
use glass_fruit_shorts::init;
use glass_fruit_shorts::producer::{ArtifactProducer, PlaceholderProducer};
use glass_fruit_shorts::provision;
use glass_fruit_shorts::publisher::{PlaceholderPublisher, Publisher};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const RETRY_AFTER_FAILURE: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(name = "glass-fruit-shorts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate, publish and log glass-fruit ASMR shorts", long_about = None)]
struct Cli {
    /// JSON config file (default: ./config.json when present)
    #[arg(short, long, global = true, env = "GLASS_FRUIT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single automation cycle
    Run {
        /// Use in-memory tables and placeholder production/publishing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run cycles on a schedule until interrupted
    Daemon,

    /// Create missing tables with headers and seed rows
    Setup,

    /// Read every table and report row counts
    Check,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::resolve(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration error: {}", err);
            std::process::exit(1);
        }
    };
    let http = http_client()?;

    let code = match cli.command.unwrap_or(Commands::Run { dry_run: false }) {
        Commands::Run { dry_run } => run(&config, &http, dry_run).await,
        Commands::Daemon => daemon(&config, &http).await,
        Commands::Setup => setup(&config, &http).await,
        Commands::Check => check(&config, &http).await,
    };
    std::process::exit(code);
}

async fn prepare(config: &Config) -> Result<()> {
    init::ensure_directories(config).await?;
    if config.producer == ProducerKind::Ffmpeg && !init::check_ffmpeg().await {
        warn!("FFmpeg not found in PATH. Video generation will fail until it is installed.");
    }
    Ok(())
}

/// Runs one cycle and returns its report plus the configured schedule.
async fn run_cycle(config: &Config, http: &Client, dry_run: bool) -> Result<(CycleReport, u64)> {
    let ws = if dry_run {
        let ws = Workspace::in_memory(config);
        provision::provision(&ws).await?;
        ws
    } else {
        Workspace::open(config, http)?
    };
    info!("Using {} backend", ws.kind);

    let settings = ws.load_settings().await;
    let ledger = ws.ledger(&settings);
    let (producer, publisher): (Box<dyn ArtifactProducer>, Box<dyn Publisher>) = if dry_run {
        (
            Box::new(PlaceholderProducer),
            Box::new(PlaceholderPublisher::new("dry run")),
        )
    } else {
        (build_producer(config, &settings), build_publisher(config, http))
    };

    let options = CycleOptions {
        max_recent: settings.max_recent(),
        upload_enabled: settings.upload_enabled(),
        keep_artifacts: config.keep_artifacts,
    };
    let report = AutomationCycle::new(&ledger, ws.catalog.as_ref(), producer.as_ref(), publisher.as_ref())
        .with_options(options)
        .run()
        .await;

    info!(
        "Cycle result: subject={} status={} ref={} logged={}",
        report.subject, report.status, report.artifact_ref, report.logged
    );
    Ok((report, settings.schedule_hours()))
}

async fn run(config: &Config, http: &Client, dry_run: bool) -> i32 {
    if !dry_run {
        if let Err(err) = prepare(config).await {
            error!("{:#}", err);
            return 1;
        }
    }
    match run_cycle(config, http, dry_run).await {
        Ok((report, _)) => report.exit_code(),
        Err(err) => {
            error!("Cycle aborted: {:#}", err);
            1
        }
    }
}

fn schedule_wait(hours: u64) -> Duration {
    Duration::from_secs(hours.max(1).saturating_mul(60 * 60))
}

async fn daemon(config: &Config, http: &Client) -> i32 {
    if let Err(err) = prepare(config).await {
        error!("{:#}", err);
        return 1;
    }
    info!("Starting scheduler");

    loop {
        let wait = match run_cycle(config, http, false).await {
            Ok((report, hours)) if report.succeeded() => schedule_wait(hours),
            Ok(_) => RETRY_AFTER_FAILURE,
            Err(err) => {
                error!("Cycle aborted: {:#}", err);
                RETRY_AFTER_FAILURE
            }
        };
        info!("Next cycle in {:.1} hours", wait.as_secs_f64() / 3600.0);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, stopping scheduler");
                return 0;
            }
        }
    }
}

async fn setup(config: &Config, http: &Client) -> i32 {
    if let Err(err) = init::ensure_directories(config).await {
        error!("{:#}", err);
        return 1;
    }
    let ws = match Workspace::open(config, http) {
        Ok(ws) => ws,
        Err(err) => {
            error!("{:#}", err);
            return 1;
        }
    };
    match provision::provision(&ws).await {
        Ok(report) => {
            info!(
                "Setup complete on {} backend: {} created, {} already present",
                ws.kind,
                report.created.len(),
                report.existing.len()
            );
            0
        }
        Err(err) => {
            error!("Setup failed: {}", err);
            1
        }
    }
}

async fn check(config: &Config, http: &Client) -> i32 {
    let ws = match Workspace::open(config, http) {
        Ok(ws) => ws,
        Err(err) => {
            error!("{:#}", err);
            return 1;
        }
    };
    info!("Backend: {}", ws.kind);

    let health = provision::check(&ws).await;
    for table in &health {
        match (table.rows, &table.error) {
            (Some(rows), _) => info!("  {}: {} rows", table.name, rows),
            (None, Some(err)) => error!("  {}: {}", table.name, err),
            (None, None) => error!("  {}: unreadable", table.name),
        }
    }
    if health.iter().all(|t| t.ok()) { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_wait_is_at_least_an_hour_and_never_overflows() {
        assert_eq!(schedule_wait(0), Duration::from_secs(3600));
        assert_eq!(schedule_wait(8), Duration::from_secs(8 * 3600));
        assert_eq!(schedule_wait(u64::MAX), Duration::from_secs(u64::MAX));
    }
}
