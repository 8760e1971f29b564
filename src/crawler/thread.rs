//! Per-item archiving
//!
//! For one item this downloads the article and the discussion page, pulls the
//! external links out of the discussion, downloads each of them, and finally
//! records the item as processed. Every failure is logged and absorbed at the
//! fetch or write where it happened; a run always ends with the item recorded.

use crate::crawler::fetcher::{Fetcher, Page};
use crate::crawler::parser::extract_links;
use crate::crawler::report::ItemOutcome;
use crate::item::{Item, ItemId};
use crate::storage::{self, ArtifactWriter, SharedStore};
use crate::CrawlerError;
use futures::future::join_all;
use std::collections::BTreeSet;
use url::Url;

/// Result of looking at an item's discussion page
struct Discussion {
    fetched: bool,
    links_found: usize,
    links_saved: usize,
}

/// Archives single items; shared by all items of a cycle
pub struct ThreadFetcher {
    fetcher: Fetcher,
    writer: ArtifactWriter,
    store: SharedStore,
    site: Url,
}

impl ThreadFetcher {
    /// # Arguments
    ///
    /// * `fetcher` - Gated HTTP fetcher shared with the rest of the crawler
    /// * `writer` - Where content is written
    /// * `store` - Record the item is added to once done
    /// * `site` - Aggregator base URL, used to tell internal links from external ones
    pub fn new(fetcher: Fetcher, writer: ArtifactWriter, store: SharedStore, site: Url) -> Self {
        Self {
            fetcher,
            writer,
            store,
            site,
        }
    }

    /// Archives one item and records it as processed
    ///
    /// The article and the discussion are handled concurrently, and so are the
    /// secondary links; the shared fetch gate bounds how many requests are
    /// actually on the wire.
    pub async fn run(&self, item: Item) -> ItemOutcome {
        tracing::info!("Archiving item {} ({})", item.id, item.article_url);

        let (article, discussion) = tokio::join!(
            self.save_article(&item),
            self.archive_discussion(&item)
        );

        let mut outcome = ItemOutcome::new(item.id.clone());
        outcome.article_saved = article.is_ok();
        outcome.discussion_fetched = discussion.fetched;
        outcome.links_found = discussion.links_found;
        outcome.links_saved = discussion.links_saved;
        outcome.marked = self.mark_processed(&item.id).await;

        tracing::info!(
            "Item {} done: article {}, {} of {} links saved",
            item.id,
            if outcome.article_saved { "saved" } else { "missing" },
            outcome.links_saved,
            outcome.links_found
        );

        outcome
    }

    async fn save_article(&self, item: &Item) -> Result<String, CrawlerError> {
        let page = self.fetcher.fetch(&item.article_url).await.map_err(|e| {
            tracing::warn!("Unable to download article of item {}: {}", item.id, e);
            e
        })?;

        let file = self
            .writer
            .write_article(&item.id, &page.body, page.content_type.as_deref())
            .await
            .map_err(|e| {
                tracing::warn!("Unable to save article of item {}: {}", item.id, e);
                CrawlerError::from(e)
            })?;

        tracing::debug!("Saved article of item {} as {}", item.id, file);
        Ok(file)
    }

    async fn archive_discussion(&self, item: &Item) -> Discussion {
        let page = match self.fetcher.fetch(&item.discussion_url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Unable to get comments of item {}: {}", item.id, e);
                return Discussion {
                    fetched: false,
                    links_found: 0,
                    links_saved: 0,
                };
            }
        };

        let urls = match self.discussion_links(&page) {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!("Unable to read comments of item {}: {}", item.id, e);
                BTreeSet::new()
            }
        };

        tracing::info!(
            "Found {} related urls for {}",
            urls.len(),
            item.discussion_url
        );

        let links_found = urls.len();
        let saved = join_all(urls.into_iter().map(|url| self.save_link(&item.id, url))).await;

        Discussion {
            fetched: true,
            links_found,
            links_saved: saved.into_iter().filter(|saved| *saved).count(),
        }
    }

    fn discussion_links(&self, page: &Page) -> Result<BTreeSet<Url>, CrawlerError> {
        if let Some(content_type) = page.content_type.as_deref() {
            let is_html = content_type.to_ascii_lowercase().contains("html");
            if !is_html {
                return Err(CrawlerError::Parse {
                    url: page.final_url.to_string(),
                    message: format!("expected HTML, got {}", content_type),
                });
            }
        }

        Ok(extract_links(&page.text(), &page.final_url, &self.site))
    }

    /// Downloads one secondary link; failures are logged and reported as `false`
    async fn save_link(&self, id: &ItemId, url: Url) -> bool {
        let result = match self.fetcher.fetch(&url).await {
            Ok(page) => self
                .writer
                .write_link(id, &url, &page.body, page.content_type.as_deref())
                .await
                .map_err(CrawlerError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(file) => {
                tracing::trace!("Downloaded {} as {}", url, file);
                true
            }
            Err(e) => {
                tracing::debug!("URL cannot be downloaded: {}", e);
                false
            }
        }
    }

    /// Records the item, moving its files into place off the async workers
    async fn mark_processed(&self, id: &ItemId) -> bool {
        let store = self.store.clone();
        let owned = id.clone();
        let result =
            tokio::task::spawn_blocking(move || storage::lock(&store).mark_processed(&owned))
                .await;

        match result {
            Ok(Ok(newly_recorded)) => {
                if !newly_recorded {
                    tracing::debug!("Item {} was already recorded", id);
                }
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    "Item {} recorded for this run only; it may be fetched again after a restart: {}",
                    id,
                    e
                );
                false
            }
            Err(e) => {
                tracing::warn!("Recording item {} did not finish: {}", id, e);
                false
            }
        }
    }
}
