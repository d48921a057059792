//! Batch content resolution across every chapter that still lacks content.
//!
//! A single browser session (opened lazily, on the first chapter that needs
//! escalation) is shared across the whole batch, then torn down once at the
//! end. Per-chapter failures are counted, never fatal.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::chapter_scraper::{is_failure_marker, ChapterScraper};
use crate::config::Settings;
use crate::error::ScrapeError;
use crate::models::{Chapter, ScrapeStats};
use crate::repository::Store;
use crate::scrapers::{BrowserSessionConfig, BrowserSlot};

/// Result of a batch run: counts plus the refreshed chapter rows.
#[derive(Debug)]
pub struct BatchOutcome {
    pub stats: ScrapeStats,
    pub chapters: Vec<Chapter>,
}

pub struct BatchScraper {
    store: Arc<Mutex<Store>>,
    scraper: ChapterScraper,
    browser_config: BrowserSessionConfig,
}

impl BatchScraper {
    pub fn new(store: Arc<Mutex<Store>>, settings: &Settings) -> Self {
        Self {
            scraper: ChapterScraper::new(store.clone(), settings),
            store,
            browser_config: BrowserSessionConfig {
                headless: settings.fetch.headless,
                timeout: settings.browser_timeout(),
            },
        }
    }

    /// Scrape content for `chapters`, or for every chapter without content
    /// when none are given. One browser session serves the whole batch and
    /// is closed before returning, whatever the per-chapter outcomes were.
    pub async fn scrape_all(
        &self,
        chapters: Option<Vec<Chapter>>,
    ) -> Result<BatchOutcome, ScrapeError> {
        let chapters = match chapters {
            Some(chapters) => chapters,
            None => self.store.lock().await.chapters_without_content()?,
        };
        info!(chapters = chapters.len(), "starting batch scrape");

        let mut stats = ScrapeStats::default();
        let mut browser = BrowserSlot::new(self.browser_config.clone());

        for chapter in &chapters {
            if chapter
                .link
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .is_none()
            {
                debug!(chapter = chapter.name.as_str(), "no link, skipping fetch");
                stats.failed += 1;
                continue;
            }

            let paragraphs = self.scraper.scrape_with_session(chapter, &mut browser).await;
            if paragraphs.is_empty() || is_failure_marker(&paragraphs) {
                warn!(chapter = chapter.name.as_str(), "no content resolved");
                stats.failed += 1;
            } else {
                stats.scraped += 1;
            }
        }

        browser.close().await;
        info!(
            scraped = stats.scraped,
            failed = stats.failed,
            "batch scrape finished"
        );

        // Re-read the rows so callers see the content written during the run.
        let store = self.store.lock().await;
        let mut refreshed = Vec::with_capacity(chapters.len());
        for chapter in &chapters {
            if let Some(row) = store.get_chapter(chapter.id)? {
                refreshed.push(row);
            }
        }

        Ok(BatchOutcome {
            stats,
            chapters: refreshed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn seeded_store() -> (Arc<Mutex<Store>>, i64) {
        let store = Store::open_in_memory().unwrap();
        let website = store.find_or_create_website(None, "Test Group").unwrap();
        let novel = store
            .find_or_create_novel(website.id, "https://example.test/series/x/", "X")
            .unwrap();
        (Arc::new(Mutex::new(store)), novel.id)
    }

    fn chapter(id: i64, novel_id: i64, name: &str, link: Option<&str>, content: Option<&str>) -> Chapter {
        Chapter {
            id,
            novel_id,
            name: name.to_string(),
            link: link.map(str::to_string),
            content: content.map(str::to_string),
            position: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_linkless_chapters_counted_failed_without_fetch() {
        let (store, novel_id) = seeded_store();
        let (a, b) = {
            let guard = store.lock().await;
            let a = guard
                .create_chapter(novel_id, "Chapter 1", None, None)
                .unwrap();
            let b = guard
                .create_chapter(novel_id, "Chapter 2", Some("   "), None)
                .unwrap();
            (a, b)
        };

        let settings = Settings::default();
        let batch = BatchScraper::new(store, &settings);
        let outcome = batch.scrape_all(Some(vec![a, b])).await.unwrap();

        assert_eq!(outcome.stats.failed, 2);
        assert_eq!(outcome.stats.scraped, 0);
        assert_eq!(outcome.chapters.len(), 2);
        assert!(outcome.chapters.iter().all(|c| !c.has_content()));
    }

    #[tokio::test]
    async fn test_chapters_with_content_count_as_scraped() {
        let (store, novel_id) = seeded_store();
        let chapter = {
            let guard = store.lock().await;
            let created = guard
                .create_chapter(
                    novel_id,
                    "Chapter 1",
                    Some("https://example.invalid/c1"),
                    None,
                )
                .unwrap();
            guard
                .set_chapter_content(created.id, "Already here.\n\nTwo paragraphs.")
                .unwrap();
            guard.get_chapter(created.id).unwrap().unwrap()
        };

        let settings = Settings::default();
        let batch = BatchScraper::new(store, &settings);
        let outcome = batch.scrape_all(Some(vec![chapter])).await.unwrap();

        // Existing content short-circuits the fetch and still counts.
        assert_eq!(outcome.stats.scraped, 1);
        assert_eq!(outcome.stats.failed, 0);
    }

    #[tokio::test]
    async fn test_default_set_is_chapters_without_content() {
        let (store, novel_id) = seeded_store();
        {
            let guard = store.lock().await;
            let done = guard
                .create_chapter(novel_id, "Chapter 1", None, None)
                .unwrap();
            guard.set_chapter_content(done.id, "Done.").unwrap();
            guard
                .create_chapter(novel_id, "Chapter 2", None, None)
                .unwrap();
        }

        let settings = Settings::default();
        let batch = BatchScraper::new(store, &settings);
        let outcome = batch.scrape_all(None).await.unwrap();

        // Only the content-less chapter enters the batch.
        assert_eq!(outcome.chapters.len(), 1);
        assert_eq!(outcome.chapters[0].name, "Chapter 2");
        assert_eq!(outcome.stats.failed, 1);
    }
}
