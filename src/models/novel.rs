//! Novel, website, and tag models.
//!
//! A website represents a translation group (the scraping source); a novel
//! belongs to one website and carries best-effort series metadata scraped
//! from its listing page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scraping source / translation group, keyed by its canonical link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Website {
    /// Database row ID.
    pub id: i64,
    /// Group display name.
    pub name: String,
    /// Canonical group link, when the source exposes one.
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A serialized novel tracked from one website.
///
/// `(website_id, name)` is unique, but `link` identifies the canonical
/// series page and is preferred for matching: names are re-derived from
/// URL slugs and can come out differently between crawls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Novel {
    /// Database row ID.
    pub id: i64,
    /// Owning website (translation group).
    pub website_id: i64,
    pub name: String,
    /// Canonical series page URL.
    pub link: String,
    /// Cover image URL, if the series page exposed one.
    pub image_url: Option<String>,
    /// Multi-paragraph series description.
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A genre/tag attached to novels.
///
/// Names are stored trimmed and lowercased; uniqueness is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Normalize a tag name the way the store persists it.
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag_name() {
        assert_eq!(normalize_tag_name("  Action "), "action");
        assert_eq!(normalize_tag_name("Slice of Life"), "slice of life");
        assert_eq!(normalize_tag_name("XIANXIA"), "xianxia");
    }
}
