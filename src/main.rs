// SPDX-License-Identifier: MIT
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use reviewd::config::WorkerConfig;
use reviewd::gitlab::GitlabClient;
use reviewd::jira::JiraClient;
use reviewd::model::ModelGateway;
use reviewd::queue::SqsQueue;
use reviewd::worker::Worker;

#[derive(Parser)]
#[command(
    name = "reviewd",
    about = "Automated merge-request review worker",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a TOML config file (env vars take precedence)
    #[arg(long, env = "REVIEWD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REVIEWD_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "REVIEWD_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker in the foreground (default when no subcommand given).
    Serve,
    /// Load and validate the configuration, then exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = WorkerConfig::load(args.config.as_deref())?;

    // Init once — must happen before any tracing calls.
    let log_level = args.log.clone().unwrap_or_else(|| config.log.clone());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &config.log_format);

    match args.command {
        Some(Command::Check) => {
            println!("configuration ok");
            println!("  queue:    {}", config.queue_url);
            println!("  host:     {}", config.gitlab_url);
            println!("  primary:  {}", config.primary_model.id);
            println!("  fallback: {}", config.fallback_model.id);
            println!(
                "  tracker:  {}",
                config
                    .issue_tracker
                    .as_ref()
                    .map(|t| t.url.as_str())
                    .unwrap_or("disabled")
            );
            Ok(())
        }
        Some(Command::Serve) | None => serve(config).await,
    }
}

async fn serve(config: WorkerConfig) -> Result<()> {
    let config = Arc::new(config);

    let queue = Arc::new(
        SqsQueue::new(&config.queue_url, config.receive_wait_secs)
            .context("building queue client")?,
    );
    let host = Arc::new(
        GitlabClient::new(&config.gitlab_url, &config.gitlab_token)
            .context("building repository host client")?,
    );
    let tracker = match &config.issue_tracker {
        Some(t) => Some(Arc::new(
            JiraClient::new(&t.url, &t.username, &t.token)
                .context("building issue tracker client")?,
        ) as Arc<dyn reviewd::jira::IssueTracker>),
        None => None,
    };
    let backend = Arc::new(
        ModelGateway::new(
            &config.model_endpoint,
            std::time::Duration::from_secs(config.call_timeout_secs),
        )
        .context("building model gateway client")?,
    ) as Arc<dyn reviewd::model::ModelBackend>;

    let worker = Worker::new(config, queue, host, tracker, backend);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("reviewd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            init_stdout_only(log_level, use_json);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else {
        init_stdout_only(log_level, use_json);
        None
    }
}

fn init_stdout_only(log_level: &str, use_json: bool) {
    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
}
