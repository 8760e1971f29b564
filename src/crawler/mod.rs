//! Crawler module for polling, fetching and archiving
//!
//! This module contains the core crawling logic, including:
//! - A process-wide gate bounding concurrent fetches
//! - HTTP fetching with timeouts and error classification
//! - Front page and discussion parsing
//! - Per-item archiving with fault isolation per fetch
//! - The poll loop tying it all together

mod fetcher;
mod gate;
mod parser;
mod report;
mod scheduler;
mod thread;

pub use fetcher::{build_http_client, Fetcher, Page};
pub use gate::{FetchGate, GatePermit};
pub use parser::{extract_links, parse_listing};
pub use report::{CycleReport, CycleStatus, ItemOutcome};
pub use scheduler::{PollScheduler, SchedulerState};
pub use thread::ThreadFetcher;

use crate::config::Config;
use crate::CrawlerError;
use tokio_util::sync::CancellationToken;

/// Runs the crawler until `shutdown` is cancelled
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the processed-item record from the data directory
/// 2. Build the HTTP client and the shared fetch gate
/// 3. Poll the front page on the configured interval
/// 4. Archive every fresh item
///
/// Only setup can fail; once polling has started every error is logged and
/// absorbed.
///
/// # Example
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use ycrawler::config::Config;
/// use ycrawler::crawler::crawl;
///
/// # async fn example() -> Result<(), ycrawler::CrawlerError> {
/// let shutdown = CancellationToken::new();
/// crawl(Config::default(), shutdown).await?;
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config, shutdown: CancellationToken) -> Result<(), CrawlerError> {
    let scheduler = PollScheduler::from_config(&config, shutdown)?;
    scheduler.run().await;
    Ok(())
}
