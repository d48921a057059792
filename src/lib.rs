//! novelkeep - chapter acquisition and synchronization for serialized
//! web fiction.
//!
//! The library discovers a novel's chapter listing from its source page,
//! keeps the local chapter table ordered to match, and resolves chapter
//! content through an escalating fetch pipeline (plain HTTP first, a real
//! browser when the page needs scripting).

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod services;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Settings;
use crate::error::ScrapeError;
use crate::models::Chapter;
use crate::repository::Store;
use crate::services::{BatchOutcome, BatchScraper, ChapterScraper, CrawlSummary, ListingCrawler};

/// Facade over the store and services for embedding callers.
pub struct Engine {
    store: Arc<Mutex<Store>>,
    settings: Settings,
}

impl Engine {
    /// Open (creating if needed) the database at the configured path.
    pub fn new(settings: Settings) -> Result<Self, ScrapeError> {
        let store = Store::open(&settings.db_path)?;
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            settings,
        })
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> Arc<Mutex<Store>> {
        self.store.clone()
    }

    /// Resolve a chapter's content, fetching and persisting it when the
    /// chapter has none yet. Returns the paragraphs joined by blank lines;
    /// unresolvable chapters yield a failure-marker string rather than an
    /// error.
    pub async fn resolve_chapter_content(&self, chapter_id: i64) -> Result<String, ScrapeError> {
        let chapter = {
            let store = self.store.lock().await;
            store
                .get_chapter(chapter_id)?
                .ok_or(ScrapeError::Synchronization(
                    rusqlite::Error::QueryReturnedNoRows,
                ))?
        };
        let scraper = ChapterScraper::new(self.store.clone(), &self.settings);
        Ok(scraper.scrape_content(&chapter).await.join("\n\n"))
    }

    /// Scrape content for the given chapters, or for every chapter still
    /// missing content when none are given.
    pub async fn run_batch_scrape(
        &self,
        chapters: Option<Vec<Chapter>>,
    ) -> Result<BatchOutcome, ScrapeError> {
        BatchScraper::new(self.store.clone(), &self.settings)
            .scrape_all(chapters)
            .await
    }

    /// Crawl a series listing page, creating the novel and its chapters
    /// and synchronizing chapter positions.
    pub async fn crawl_series(&self, url: &str) -> Result<CrawlSummary, ScrapeError> {
        ListingCrawler::new(self.store.clone(), self.settings.clone())
            .crawl_series(url)
            .await
    }
}
