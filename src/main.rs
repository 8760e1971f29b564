//! ycrawler main entry point
//!
//! This is the command-line interface for the ycrawler news archiver.

use anyhow::Context;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use ycrawler::config::{resolve_config, Overrides};
use ycrawler::crawler::crawl;

/// ycrawler: downloads news from news.ycombinator.com
///
/// Checks the front page every DOWNLOAD_INTERVAL seconds. For every story not
/// archived yet it saves the article and every external page linked from the
/// story's comments under SAVE_PATH/<story id>/.
#[derive(Parser, Debug)]
#[command(name = "ycrawler")]
#[command(version)]
#[command(about = "Downloads news from news.ycombinator.com", long_about = None)]
struct Cli {
    /// Path to save downloaded news
    #[arg(value_name = "SAVE_PATH")]
    save_path: PathBuf,

    /// Period between new entries check, in seconds
    #[arg(value_name = "DOWNLOAD_INTERVAL")]
    download_interval: u64,

    /// Optional TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of downloads in flight at once
    #[arg(long, value_name = "N")]
    max_concurrent_fetches: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet, cli.log_output.as_deref())?;

    let overrides = Overrides {
        data_dir: Some(cli.save_path),
        poll_interval: Some(cli.download_interval),
        max_concurrent_fetches: cli.max_concurrent_fetches,
    };
    let config =
        resolve_config(cli.config.as_deref(), overrides).context("Invalid configuration")?;

    std::fs::create_dir_all(&config.output.data_dir).with_context(|| {
        format!(
            "Cannot create output directory {}",
            config.output.data_dir.display()
        )
    })?;

    tracing::info!("ycrawler is about to start!");
    tracing::info!(
        "Saving into {}, at most {} downloads at once",
        config.output.data_dir.display(),
        config.crawler.max_concurrent_fetches
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    crawl(config, shutdown)
        .await
        .context("Crawler failed to start")?;

    tracing::info!("Crawler is shut down");
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence over the flags when set.
fn setup_logging(verbose: u8, quiet: bool, log_output: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            // Only show errors
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("ycrawler=info,warn"),
                1 => EnvFilter::new("ycrawler=debug,info"),
                2 => EnvFilter::new("ycrawler=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    match log_output {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }

    Ok(())
}

/// Cancels `shutdown` on the first SIGINT, SIGTERM or SIGHUP
async fn cancel_on_signal(shutdown: CancellationToken) {
    match shutdown_signal().await {
        Ok(name) => {
            tracing::info!("Received {}, resolving current downloads before exit", name);
            shutdown.cancel();
        }
        Err(e) => tracing::error!("Unable to listen for shutdown signals: {}", e),
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    let name = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            "SIGINT"
        }
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
