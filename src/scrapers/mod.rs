//! Content acquisition: extraction heuristics and the escalating fetch
//! pipeline with its HTTP and browser backends.

pub mod browser;
pub mod extract;
pub mod fetch;
mod http_client;

pub use browser::{BrowserSession, BrowserSessionConfig, BrowserSlot};
pub use extract::{Extraction, FailureKind, CONTENT_SELECTORS};
pub use fetch::{ExtractionResult, FetchFailure, FetchPipeline, MIN_WORD_COUNT};
pub use http_client::HttpClient;
