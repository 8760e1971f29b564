//! Poll scheduler: the crawler's outer loop
//!
//! This module handles:
//! - Polling the front page on a fixed interval
//! - Filtering the listing against the processed-item record
//! - Dispatching one item fetch per fresh item, bounded per cycle
//! - Draining a cycle before the next one starts
//! - Graceful shutdown with a bounded grace period

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::gate::FetchGate;
use crate::crawler::parser::parse_listing;
use crate::crawler::report::{CycleReport, CycleStatus};
use crate::crawler::thread::ThreadFetcher;
use crate::item::Item;
use crate::storage::{self, ArtifactWriter, DataLayout, DirectoryStore, SharedStore};
use crate::CrawlerError;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What the scheduler is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,

    /// Fetching the listing or draining dispatched items
    Polling,
}

/// Polls the front page and archives every item not seen before
///
/// Cycles never overlap: a cycle waits for all of its items before the
/// scheduler goes back to idle, so the processed-item check for one cycle
/// always sees the results of the previous one.
pub struct PollScheduler {
    config: CrawlerConfig,
    base_url: Url,
    fetcher: Fetcher,
    threads: ThreadFetcher,
    store: SharedStore,
    shutdown: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

impl PollScheduler {
    /// Creates a scheduler from already built parts
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fetcher` - Gated fetcher; its gate is shared by every request of every cycle
    /// * `store` - Processed-item record
    /// * `writer` - Where item content is written
    /// * `shutdown` - Cancelled to stop the loop
    pub fn new(
        config: &Config,
        fetcher: Fetcher,
        store: SharedStore,
        writer: ArtifactWriter,
        shutdown: CancellationToken,
    ) -> Result<Self, CrawlerError> {
        let base_url = Url::parse(&config.source.base_url)?;
        let threads = ThreadFetcher::new(fetcher.clone(), writer, store.clone(), base_url.clone());
        let (state, _) = watch::channel(SchedulerState::Idle);

        Ok(Self {
            config: config.crawler.clone(),
            base_url,
            fetcher,
            threads,
            store,
            shutdown,
            state,
        })
    }

    /// Builds the gate, HTTP client, store and writer described by `config`
    ///
    /// Loading the store scans the data directory; a scan failure is logged
    /// and the crawler starts with an empty record.
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Result<Self, CrawlerError> {
        let gate = FetchGate::new(config.crawler.max_concurrent_fetches as usize);
        let fetcher = Fetcher::from_config(config, gate)?;

        let layout = DataLayout::new(&config.output.data_dir);
        let store = storage::shared(DirectoryStore::load(layout.clone()));
        let writer = ArtifactWriter::new(layout);

        Self::new(config, fetcher, store, writer, shutdown)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn gate(&self) -> &FetchGate {
        self.fetcher.gate()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watches state transitions
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Runs poll cycles until the shutdown token is cancelled
    ///
    /// The first cycle starts immediately. A cycle that overruns the interval
    /// delays the next tick instead of causing a burst.
    pub async fn run(&self) {
        let interval = self.config.poll_interval();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Polling {} every {:?}", self.base_url, interval);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.poll_once().await.log();

            if self.shutdown.is_cancelled() {
                break;
            }
        }

        tracing::info!("Poll scheduler stopped");
    }

    /// Runs a single poll cycle: listing, dispatch, drain
    pub async fn poll_once(&self) -> CycleReport {
        self.state.send_replace(SchedulerState::Polling);
        let report = self.poll_cycle().await;
        self.state.send_replace(SchedulerState::Idle);
        report
    }

    /// Fetches and parses the front page
    pub async fn fetch_listing(&self) -> Result<Vec<Item>, CrawlerError> {
        let page = self.fetcher.fetch(&self.base_url).await?;
        let items = parse_listing(&page.text(), &self.base_url);

        if items.is_empty() && !page.body.is_empty() {
            tracing::warn!("Front page {} contained no recognisable items", self.base_url);
        }

        Ok(items)
    }

    async fn poll_cycle(&self) -> CycleReport {
        let mut report = CycleReport::start();
        tracing::info!("Checking for fresh news...");

        let listing = match self.fetch_listing().await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!("Unable to download front page: {}", e);
                return report.finish(CycleStatus::ListingFailed);
            }
        };
        report.listed = listing.len();

        let fresh = self.select_fresh(listing);
        tracing::info!("Found {} fresh items", fresh.len());
        report.dispatched = fresh.iter().map(|item| item.id.clone()).collect();

        let limit = self.config.max_concurrent_items.max(1) as usize;
        let launched = AtomicUsize::new(0);
        let outcomes = stream::iter(fresh)
            .take_until(self.shutdown.cancelled())
            .map(|item| {
                launched.fetch_add(1, Ordering::Relaxed);
                self.threads.run(item)
            })
            .buffer_unordered(limit);
        tokio::pin!(outcomes);

        let drained = {
            let drain = async {
                while let Some(outcome) = outcomes.next().await {
                    report.record(outcome);
                }
            };
            tokio::pin!(drain);

            tokio::select! {
                biased;
                _ = &mut drain => true,
                _ = self.shutdown.cancelled() => {
                    let grace = self.config.shutdown_grace();
                    tracing::info!("Shutdown requested; giving in-flight items up to {:?}", grace);
                    tokio::time::timeout(grace, &mut drain).await.is_ok()
                }
            }
        };

        report.launched = launched.load(Ordering::Relaxed);

        if !drained {
            tracing::warn!(
                "Grace period over; cancelling {} unfinished items",
                report.launched - report.outcomes.len()
            );
        }

        let status = if report.outcomes.len() == report.dispatched.len() {
            CycleStatus::Completed
        } else {
            CycleStatus::Interrupted
        };
        report.finish(status)
    }

    /// Keeps listing order, drops duplicates and items already processed
    fn select_fresh(&self, listing: Vec<Item>) -> Vec<Item> {
        let store = storage::lock(&self.store);
        let mut seen = HashSet::new();

        listing
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()) && !store.is_processed(&item.id))
            .collect()
    }
}
