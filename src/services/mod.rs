//! Service layer: chapter resolution, listing crawling, position
//! synchronization, and batch orchestration.
//!
//! Services hold domain logic separated from CLI concerns, so they can be
//! driven from the command line or embedded as a library.

pub mod batch_scraper;
pub mod chapter_scraper;
pub mod listing_crawler;
pub mod sync;

pub use batch_scraper::{BatchOutcome, BatchScraper};
pub use chapter_scraper::{is_failure_marker, ChapterScraper, NO_LINK_PROVIDED};
pub use listing_crawler::{CrawlSummary, GroupInfo, ListingCrawler, SeriesMetadata};
pub use sync::sync_chapter_positions;
