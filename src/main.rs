//! API host daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   OS signals ──┐
//!                ├──▶ event intake ──▶ lifecycle controller ──▶ HTTP server
//!   --watch ─────┘    (one queue)      (one event at a time)    (current instance)
//!                                             │
//!                                             └──▶ config resolver (defaults → file → env)
//! ```
//!
//! SIGHUP reloads the configuration and restarts the server, SIGTERM, SIGINT
//! and SIGABRT shut down gracefully, SIGUSR1 writes the server state to stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use api_host::config::loader::DEFAULT_CONFIG_FILE;
use api_host::config::watcher::ConfigWatcher;
use api_host::config::FileConfigSource;
use api_host::http::HttpServerFactory;
use api_host::lifecycle::events::{self, DEFAULT_QUEUE_CAPACITY};
use api_host::lifecycle::{Controller, LifecycleError, SignalRegistry};
use api_host::observability::logging::{self, LevelHandle, LogFormat};
use api_host::version;

#[derive(Parser)]
#[command(name = "apihostd")]
#[command(about = "API host daemon", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Path to config file. Falls back to the default location when it exists.
    #[arg(short, long, value_name = "PATH", long_help = format!(
        "Path to config file. apihostd will look for a config at {DEFAULT_CONFIG_FILE} by default."
    ))]
    config: Option<PathBuf>,

    /// Reload when the config file changes.
    #[arg(long)]
    watch: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Print the version and exit.
    #[arg(long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the version and exit
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version || matches!(cli.command, Some(Command::Version)) {
        println!("Version: {}", version::VERSION);
        println!("Git hash: {}", version::GIT_HASH);
        println!("Build timestamp: {}", version::BUILT_TIMESTAMP);
        return ExitCode::SUCCESS;
    }

    let log_level = logging::init(cli.log_format);

    tracing::info!(
        version = version::VERSION,
        git_hash = version::GIT_HASH,
        build_time = version::BUILT_TIMESTAMP,
        log_level_pinned = log_level.is_pinned(),
        "apihostd starting"
    );

    match run(cli, log_level).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("apihostd: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli, log_level: LevelHandle) -> Result<(), LifecycleError> {
    let source = FileConfigSource::new(cli.config);
    let (events, intake) = events::channel(DEFAULT_QUEUE_CAPACITY);

    // Handlers go in before startup so a signal during startup is queued, not fatal.
    let _signal_tasks = SignalRegistry::default()
        .listen(&events)
        .map_err(LifecycleError::Signals)?;

    let _watcher = if cli.watch {
        match source.config_path() {
            Some(path) => match ConfigWatcher::new(&path, events.clone()).run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::error!(path = ?path, error = %e, "Failed to watch config file");
                    None
                }
            },
            None => {
                tracing::warn!("No config file to watch");
                None
            }
        }
    } else {
        None
    };

    let mut controller = Controller::new(source, HttpServerFactory).with_log_level(log_level);
    controller.startup().await?;
    controller.run(intake).await
}
