//! memestash-ingest - Meme ingest service
//!
//! Fetches meme images from Discord threads and remote URLs, deduplicates
//! them by content hash, captions them with a vision model and stores the
//! results. Runs are started by the built-in interval loops or through the
//! trigger endpoints.

use anyhow::{Context, Result};
use clap::Parser;
use memestash_common::config::{ScheduleConfig, TomlConfig};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::signal;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use memestash_ingest::config::ResolvedSecrets;
use memestash_ingest::error::PipelineError;
use memestash_ingest::services::{
    build_http_client, AnalysisClient, PipelineOrchestrator, PipelineSettings, ProgressTracker,
    RemoteFetcher, RetryLedger, ThreadFetcher,
};
use memestash_ingest::AppState;

#[derive(Parser, Debug)]
#[command(name = "memestash-ingest")]
#[command(about = "Meme image ingest service for memestash")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MEMESTASH_PORT")]
    port: Option<u16>,

    /// Disable the built-in interval triggers
    #[arg(long)]
    no_schedule: bool,
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Fetch sweep at startup and every `fetch_interval_minutes`; retry sweep
/// every `retry_interval_minutes`. A tick that finds a run active is skipped.
fn spawn_schedules(orchestrator: Arc<PipelineOrchestrator>, schedule: &ScheduleConfig) {
    let fetch_every = Duration::from_secs(schedule.fetch_interval_minutes.max(1) * 60);
    let retry_every = Duration::from_secs(schedule.retry_interval_minutes.max(1) * 60);

    let sweep_orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        let mut ticker = interval(fetch_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_orchestrator.run_scheduled_sweep().await {
                Ok(summary) => info!("Scheduled sweep finished: {}", summary.log_line()),
                Err(PipelineError::Busy { task }) => {
                    info!("Skipping scheduled sweep, '{}' is running", task)
                }
                Err(e) => error!("Scheduled sweep failed: {}", e),
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + retry_every, retry_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match orchestrator.run_retry_sweep().await {
                Ok(summary) => info!("Scheduled retry finished: {}", summary.log_line()),
                Err(PipelineError::Busy { task }) => {
                    info!("Skipping scheduled retry, '{}' is running", task)
                }
                Err(e) => error!("Scheduled retry failed: {}", e),
            }
        }
    });

    info!(
        "Schedules: fetch every {} min, retry every {} min",
        schedule.fetch_interval_minutes, schedule.retry_interval_minutes
    );
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = memestash_common::config::load_or_default(args.config.as_deref(), "MEMESTASH_CONFIG")?;
    init_tracing(&config)?;

    info!("Starting memestash-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let secrets = ResolvedSecrets::resolve(&config);

    let upload_dir = config.paths.upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .with_context(|| format!("Failed to create upload directory {}", upload_dir.display()))?;
    info!("Upload directory: {}", upload_dir.display());

    info!("Database: {}", config.database_path.display());
    let db_pool = memestash_ingest::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let http_client = build_http_client(secrets.proxy_url.as_deref())?;

    let thread_source = Arc::new(ThreadFetcher::new(
        http_client.clone(),
        secrets.discord_token.clone(),
        &config.discord.api_base,
        &upload_dir,
        Duration::from_millis(config.discord.page_delay_ms),
        Duration::from_millis(config.discord.download_delay_ms),
    ));
    let remote_source = Arc::new(RemoteFetcher::new(
        http_client.clone(),
        &upload_dir,
        Duration::from_secs(config.network.remote_timeout_secs),
    ));
    let analyzer = Arc::new(AnalysisClient::new(
        http_client,
        secrets.ai_api_key.clone(),
        &config.ai.api_base,
        &config.ai.model,
        Duration::from_secs(config.ai.timeout_secs),
    ));

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        db_pool.clone(),
        Arc::new(ProgressTracker::new()),
        thread_source,
        remote_source,
        analyzer,
        RetryLedger::new(config.schedule.max_retry_attempts),
        PipelineSettings {
            upload_dir,
            prompt_file: config.paths.prompt_file.clone(),
            thread_list_file: config.paths.thread_list_file.clone(),
        },
    ));

    if args.no_schedule {
        info!("Interval triggers disabled");
    } else {
        spawn_schedules(orchestrator.clone(), &config.schedule);
    }

    let state = AppState::new(db_pool, orchestrator);
    let app = memestash_ingest::build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr = format!("{}:{}", config.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
