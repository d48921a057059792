//! Chapter content resolution: decide whether a fetch is needed, run the
//! pipeline, and persist extracted text.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::Settings;
use crate::models::Chapter;
use crate::repository::Store;
use crate::scrapers::{BrowserSessionConfig, BrowserSlot, FetchFailure, FetchPipeline, HttpClient};

/// Sentinel returned for chapters that have no source link at all.
pub const NO_LINK_PROVIDED: &str = "No link provided";

/// All in-band failure markers a resolved chapter can carry. Callers that
/// receive paragraph text must treat these literals as failure, not content.
pub const FAILURE_MARKERS: &[&str] = &[
    "No content found",
    "No content found with alternative methods",
    "Content temporarily unavailable",
    NO_LINK_PROVIDED,
];

/// Whether resolved paragraphs are a failure marker rather than content.
pub fn is_failure_marker(paragraphs: &[String]) -> bool {
    paragraphs.is_empty()
        || paragraphs
            .iter()
            .any(|p| FAILURE_MARKERS.contains(&p.as_str()))
}

/// Resolves content for single chapters, fetching only when necessary.
pub struct ChapterScraper {
    store: Arc<Mutex<Store>>,
    pipeline: FetchPipeline,
    browser_config: BrowserSessionConfig,
}

impl ChapterScraper {
    pub fn new(store: Arc<Mutex<Store>>, settings: &Settings) -> Self {
        Self {
            store,
            pipeline: FetchPipeline::new(HttpClient::new(settings.http_timeout())),
            browser_config: BrowserSessionConfig {
                headless: settings.fetch.headless,
                timeout: settings.browser_timeout(),
            },
        }
    }

    /// Resolve a chapter's paragraphs, owning a browser session for the
    /// duration of this one call if escalation is needed.
    pub async fn scrape_content(&self, chapter: &Chapter) -> Vec<String> {
        let mut browser = BrowserSlot::new(self.browser_config.clone());
        let paragraphs = self.scrape_with_session(chapter, &mut browser).await;
        browser.close().await;
        paragraphs
    }

    /// Resolve a chapter's paragraphs reusing a caller-owned browser slot.
    /// Used by the batch orchestrator to share one session across chapters.
    pub(crate) async fn scrape_with_session(
        &self,
        chapter: &Chapter,
        browser: &mut BrowserSlot,
    ) -> Vec<String> {
        // Idempotent short-circuit: existing content is never re-fetched.
        if chapter.has_content() {
            return chapter.content_paragraphs();
        }

        let Some(link) = chapter.link.as_deref().filter(|l| !l.trim().is_empty()) else {
            return vec![NO_LINK_PROVIDED.to_string()];
        };

        let result = self.pipeline.fetch(link, browser).await;
        if result.paragraphs.is_empty() {
            let failure = result.failure.unwrap_or(FetchFailure::NoContent);
            // A failure marker never overwrites previously stored content.
            return vec![failure.sentinel().to_string()];
        }

        let content = result.paragraphs.join("\n\n");
        let store = self.store.lock().await;
        if let Err(e) = store.set_chapter_content(chapter.id, &content) {
            error!(chapter = chapter.name.as_str(), error = %e, "failed to persist content");
        } else {
            info!(
                chapter = chapter.name.as_str(),
                words = result.paragraphs.iter().map(|p| p.split_whitespace().count()).sum::<usize>(),
                sufficient = result.sufficient,
                "scraped chapter content"
            );
        }
        result.paragraphs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scraper_with_store() -> (ChapterScraper, Arc<Mutex<Store>>, i64) {
        let store = Store::open_in_memory().unwrap();
        let website = store.find_or_create_website(Some("https://g"), "G").unwrap();
        let novel = store
            .find_or_create_novel(website.id, "https://src/series/a/", "A")
            .unwrap();
        let store = Arc::new(Mutex::new(store));
        let scraper = ChapterScraper::new(store.clone(), &Settings::default());
        (scraper, store, novel.id)
    }

    #[tokio::test]
    async fn test_existing_content_short_circuits_without_network() {
        let (scraper, store, novel_id) = scraper_with_store();
        let chapter = {
            let store = store.lock().await;
            let chapter = store
                .create_chapter(novel_id, "Chapter 1", Some("https://unreachable.invalid/1"), Some(1))
                .unwrap();
            store
                .set_chapter_content(chapter.id, "First paragraph.\n\nSecond paragraph.")
                .unwrap();
            store.get_chapter(chapter.id).unwrap().unwrap()
        };

        // The link is unreachable; a fetch attempt would fail. Stored
        // content must be returned as-is, split on blank lines.
        let paragraphs = scraper.scrape_content(&chapter).await;
        assert_eq!(paragraphs, vec!["First paragraph.", "Second paragraph."]);
    }

    #[tokio::test]
    async fn test_missing_link_yields_sentinel() {
        let (scraper, _store, novel_id) = scraper_with_store();
        let chapter = Chapter {
            id: 1,
            novel_id,
            name: "Chapter 1".to_string(),
            link: None,
            content: None,
            position: Some(1),
            created_at: Utc::now(),
        };
        let paragraphs = scraper.scrape_content(&chapter).await;
        assert_eq!(paragraphs, vec![NO_LINK_PROVIDED]);
        assert!(is_failure_marker(&paragraphs));
    }

    #[test]
    fn test_is_failure_marker() {
        assert!(is_failure_marker(&[]));
        assert!(is_failure_marker(&["No content found".to_string()]));
        assert!(!is_failure_marker(&["An actual paragraph.".to_string()]));
    }
}
