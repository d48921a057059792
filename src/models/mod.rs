//! Data models for novelkeep.

mod chapter;
mod novel;

pub use chapter::{Chapter, ChapterRef, ScrapeStats};
pub use novel::{normalize_tag_name, Novel, Tag, Website};
