//! Per-item and per-cycle statistics

use crate::item::ItemId;
use std::time::{Duration, Instant};

/// What one item fetch achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: ItemId,
    pub article_saved: bool,
    pub discussion_fetched: bool,

    /// External links extracted from the discussion
    pub links_found: usize,

    /// Links whose content was written to disk
    pub links_saved: usize,

    /// Whether the item made it into the store
    pub marked: bool,
}

impl ItemOutcome {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            article_saved: false,
            discussion_fetched: false,
            links_found: 0,
            links_saved: 0,
            marked: false,
        }
    }
}

/// How a poll cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// Every dispatched item finished
    Completed,

    /// The listing could not be fetched; nothing was dispatched
    ListingFailed,

    /// Shutdown was requested; some items may not have been dispatched or finished
    Interrupted,
}

/// Statistics for one poll cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub status: CycleStatus,

    /// Items on the front page
    pub listed: usize,

    /// Items not seen before, in dispatch order
    pub dispatched: Vec<ItemId>,

    /// Dispatched items whose fetch actually started
    pub launched: usize,

    pub outcomes: Vec<ItemOutcome>,
    pub elapsed: Duration,
    began: Instant,
}

impl CycleReport {
    pub fn start() -> Self {
        Self {
            status: CycleStatus::Completed,
            listed: 0,
            dispatched: Vec::new(),
            launched: 0,
            outcomes: Vec::new(),
            elapsed: Duration::ZERO,
            began: Instant::now(),
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(mut self, status: CycleStatus) -> Self {
        self.status = status;
        self.elapsed = self.began.elapsed();
        self
    }

    /// Items whose article was saved
    pub fn items_downloaded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.article_saved).count()
    }

    /// Items recorded as processed
    pub fn items_processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.marked).count()
    }

    pub fn links_found(&self) -> usize {
        self.outcomes.iter().map(|o| o.links_found).sum()
    }

    pub fn links_saved(&self) -> usize {
        self.outcomes.iter().map(|o| o.links_saved).sum()
    }

    /// Writes the summary to the log
    pub fn log(&self) {
        match self.status {
            CycleStatus::ListingFailed => {
                tracing::info!("Cycle skipped: front page unavailable ({:?})", self.elapsed);
                return;
            }
            CycleStatus::Interrupted => tracing::info!(
                "Cycle interrupted by shutdown: {} of {} new items finished, {} never started",
                self.outcomes.len(),
                self.dispatched.len(),
                self.dispatched.len() - self.launched
            ),
            CycleStatus::Completed => {}
        }

        tracing::info!(
            "Downloaded {} out of {} items",
            self.items_downloaded(),
            self.dispatched.len()
        );
        tracing::info!(
            "Downloaded {} out of {} urls",
            self.links_saved(),
            self.links_found()
        );
        tracing::info!(
            listed = self.listed,
            new = self.dispatched.len(),
            processed = self.items_processed(),
            "Done: {:.2} sec",
            self.elapsed.as_secs_f64()
        );
    }
}
