//! Error taxonomy for the acquisition engine.
//!
//! Extraction failure is deliberately not represented here: a page where no
//! content block could be located is a value (`Extraction::Empty`), not an
//! error. These variants cover failures that cross a service boundary.

use thiserror::Error;

/// Errors surfaced by the scraping services.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The series URL does not match the supported source shape.
    /// Rejected before any network activity.
    #[error("invalid series url: {0}")]
    InvalidSourceUrl(String),

    /// DNS resolution, connection, or timeout failure on a plain HTTP fetch.
    /// Recovered locally by escalating to the next fetch strategy.
    #[error("transient fetch error: {0}")]
    TransientFetch(#[from] reqwest::Error),

    /// The headless browser session failed to launch, navigate, or render.
    #[error("browser session error: {0}")]
    BrowserSession(String),

    /// A store write failed mid-reconciliation; the whole transaction was
    /// rolled back and no partial state is observable.
    #[error("chapter synchronization failed: {0}")]
    Synchronization(#[from] rusqlite::Error),
}
