/// Version injected at compile time via GCP_NUKE_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("GCP_NUKE_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use gcp_nuke::config::{RunConfig, Settings};
use gcp_nuke::gcp::auth::validate_project_id;
use gcp_nuke::gcp::client::GcpClient;
use gcp_nuke::gcp::http::format_gcp_error;
use gcp_nuke::gcp::projects::ProjectDeleter;
use gcp_nuke::gcp::zones::discover_locations;
use gcp_nuke::orchestrator::Orchestrator;
use gcp_nuke::resource::Registry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Delete every resource in a GCP project
#[derive(Parser, Debug)]
#[command(name = "gcp-nuke", version = VERSION, about, long_about = None)]
struct Args {
    /// GCP project to empty
    #[arg(short, long)]
    project: Option<String>,

    /// Actually delete (default is a dry run)
    #[arg(short = 'd', long)]
    no_dryrun: bool,

    /// Timeout in seconds for each bounded wait
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Seconds between polls
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    polltime: Option<u64>,

    /// Delete the project once it is empty
    #[arg(short = 'k', long)]
    no_keep_project: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Settings file (default ~/.config/gcp-nuke/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_max_level(tracing_level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcp-nuke {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    let settings = Settings::load(args.config.as_deref())?;
    let Some(project) = settings.effective_project(args.project.as_deref()) else {
        bail!("No project given; pass --project or set project_id in the settings file");
    };
    if !validate_project_id(&project) {
        bail!("Invalid project id: {}", project);
    }

    let client = GcpClient::new(&project).await?;
    let (zones, regions) = discover_locations(&client).await;

    let mut config = RunConfig::new(&project);
    config.dry_run = !args.no_dryrun;
    config.keep_project = !args.no_keep_project;
    config.timeout = settings.effective_timeout(args.timeout)?;
    config.poll_interval = settings.effective_poll_interval(args.polltime)?;
    config.validate()?;
    config.zones = zones;
    config.regions = regions;

    tracing::info!(
        "-- Starting deletion for project {} (dry-run: {}) (keep-project: {}) (timeout: {}s) (polltime: {}s) --",
        config.project,
        config.dry_run,
        config.keep_project,
        config.timeout.as_secs(),
        config.poll_interval.as_secs()
    );

    let cancel = config.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling outstanding waits");
            cancel.cancel();
        }
    });

    let config = Arc::new(config);
    let resources = Registry::with_defaults(&client).configured(Arc::clone(&config))?;
    if let Err(e) = Orchestrator::new(config, resources)
        .run(&ProjectDeleter::new(client))
        .await
    {
        tracing::error!("[Error] {}", format_gcp_error(&e));
        return Err(e);
    }

    Ok(())
}
