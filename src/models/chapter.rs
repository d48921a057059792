//! Chapter models and transient scrape types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored chapter of a novel.
///
/// `(novel_id, name)` is unique. `position` is the novel-scoped 1-based
/// reading order; `None` means an unordered legacy row that must eventually
/// be backfilled past the maximum known position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// Database row ID.
    pub id: i64,
    /// Owning novel.
    pub novel_id: i64,
    /// Chapter title as scraped from the listing.
    pub name: String,
    /// Canonical chapter source URL.
    pub link: Option<String>,
    /// Extracted text, paragraphs joined by blank lines. `None` or empty
    /// means the chapter has not been scraped yet.
    pub content: Option<String>,
    /// 1-based reading order within the novel.
    pub position: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Chapter {
    /// Whether the chapter carries non-empty stored content.
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Split stored content back into paragraphs on blank-line boundaries.
    pub fn content_paragraphs(&self) -> Vec<String> {
        self.content
            .as_deref()
            .unwrap_or_default()
            .split("\n\n")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// One row scraped from a chapter-listing table. Transient: produced by the
/// listing crawler, consumed by the synchronizer, never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    /// Translation group that released this chapter.
    pub group: String,
    /// Chapter title as shown in the listing.
    pub title: String,
    /// Absolute chapter URL.
    pub url: String,
}

/// Counters accumulated over one batch scrape. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub scraped: usize,
    pub failed: usize,
}
