//! The chapter fetch pipeline: plain HTTP first, browser rendering only
//! when the static fetch does not yield enough content.
//!
//! The pipeline never raises past its boundary. Every failure mode resolves
//! to an [`ExtractionResult`]; total failure is an empty paragraph list
//! tagged with the failure that exhausted it.

use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::browser::BrowserSlot;
use super::extract::{self, Extraction, FailureKind, CONTENT_SELECTORS};
use super::http_client::HttpClient;

/// A chapter is judged sufficient once it carries at least this many words.
/// A judgment, not a correctness guarantee.
pub const MIN_WORD_COUNT: usize = 100;

/// Polling budget while waiting for browser-rendered content.
const LOAD_POLL_ATTEMPTS: u32 = 10;
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Extracted paragraphs; empty when every strategy failed.
    pub paragraphs: Vec<String>,
    /// Whether the word count met [`MIN_WORD_COUNT`]. Informational: a
    /// partial result is still returned.
    pub sufficient: bool,
    /// Set when `paragraphs` is empty, naming the failure that exhausted
    /// the pipeline.
    pub failure: Option<FetchFailure>,
}

/// Why a pipeline run came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// No content block could be located in any fetched HTML.
    NoContent,
    /// Alternative extraction was the last strategy tried and also failed.
    NoAlternativeContent,
    /// The static fetch hit a network error and escalation recovered
    /// nothing.
    Transient,
}

impl FetchFailure {
    /// In-band sentinel string for the entry-point boundary.
    pub fn sentinel(self) -> &'static str {
        match self {
            Self::NoContent => FailureKind::NoContent.sentinel(),
            Self::NoAlternativeContent => FailureKind::NoAlternativeContent.sentinel(),
            Self::Transient => "Content temporarily unavailable",
        }
    }
}

impl ExtractionResult {
    fn found(paragraphs: Vec<String>) -> Self {
        let sufficient = word_count(&paragraphs) >= MIN_WORD_COUNT;
        Self {
            paragraphs,
            sufficient,
            failure: None,
        }
    }

    fn empty(failure: FetchFailure) -> Self {
        Self {
            paragraphs: Vec::new(),
            sufficient: false,
            failure: Some(failure),
        }
    }
}

/// Total word count across paragraphs.
pub fn word_count(paragraphs: &[String]) -> usize {
    paragraphs.iter().map(|p| p.split_whitespace().count()).sum()
}

/// The escalating fetch pipeline. Stateless apart from the HTTP client;
/// the browser session is owned by the caller through a [`BrowserSlot`].
#[derive(Clone)]
pub struct FetchPipeline {
    http: HttpClient,
}

impl FetchPipeline {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Fetch a chapter page and extract its text, escalating from a plain
    /// GET to browser rendering when the static result is insufficient.
    pub async fn fetch(&self, url: &str, browser: &mut BrowserSlot) -> ExtractionResult {
        // Stage 1: static fetch. Network errors are non-fatal; they just
        // force escalation.
        let mut static_paragraphs: Option<Vec<String>> = None;
        let mut transient_error = false;

        match self.http.get_text(url).await {
            Ok(html) => match extract::extract_from_html(&html) {
                Extraction::Found(paragraphs) => {
                    if word_count(&paragraphs) >= MIN_WORD_COUNT {
                        debug!(url, "static fetch sufficient");
                        return ExtractionResult::found(paragraphs);
                    }
                    debug!(url, words = word_count(&paragraphs), "static fetch thin, escalating");
                    static_paragraphs = Some(paragraphs);
                }
                Extraction::Empty(_) => {
                    debug!(url, "static fetch found no content, escalating");
                }
            },
            Err(e) => {
                debug!(url, error = %e, "static fetch failed, escalating");
                transient_error = true;
            }
        }

        // Stage 2: browser rendering. Session errors degrade to empty
        // content; there is nothing further to escalate to.
        let rendered = match self.browser_html(url, browser).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url, error = %e, "browser fetch failed");
                String::new()
            }
        };

        let extraction = browser_extract(&rendered);
        match extraction {
            Extraction::Found(paragraphs) => ExtractionResult::found(paragraphs),
            Extraction::Empty(kind) => {
                // A thin static result still beats nothing.
                if let Some(paragraphs) = static_paragraphs {
                    return ExtractionResult::found(paragraphs);
                }
                if transient_error {
                    ExtractionResult::empty(FetchFailure::Transient)
                } else if kind == FailureKind::NoAlternativeContent {
                    ExtractionResult::empty(FetchFailure::NoAlternativeContent)
                } else {
                    ExtractionResult::empty(FetchFailure::NoContent)
                }
            }
        }
    }

    /// Navigate the shared session and poll until content looks loaded or
    /// the attempt budget runs out. Best-effort: the rendered HTML is
    /// returned either way.
    async fn browser_html(&self, url: &str, browser: &mut BrowserSlot) -> anyhow::Result<String> {
        let session = browser.ensure().await?;
        session.navigate(url).await?;

        let mut html = String::new();
        for attempt in 0..LOAD_POLL_ATTEMPTS {
            html = session.current_html().await?;
            if content_likely_loaded(&html) {
                debug!(url, attempt, "content signal after polling");
                break;
            }
            tokio::time::sleep(LOAD_POLL_INTERVAL).await;
        }
        Ok(html)
    }
}

/// Extract from rendered HTML: density heuristic first, then alternative
/// extraction directly if the result is still empty or insufficient.
fn browser_extract(html: &str) -> Extraction {
    let doc = Html::parse_document(html);
    match extract::extract_main_content(&doc) {
        Extraction::Found(paragraphs) if word_count(&paragraphs) >= MIN_WORD_COUNT => {
            Extraction::Found(paragraphs)
        }
        Extraction::Found(paragraphs) => match extract::extract_alternative(&doc) {
            // Keep the denser of the two thin results.
            Extraction::Found(alternative)
                if word_count(&alternative) > word_count(&paragraphs) =>
            {
                Extraction::Found(alternative)
            }
            _ => Extraction::Found(paragraphs),
        },
        Extraction::Empty(_) => extract::extract_alternative(&doc),
    }
}

/// Signal that a JS-rendered page has probably finished loading its text:
/// either several substantial paragraphs, or a known content container with
/// a meaningful amount of text.
fn content_likely_loaded(html: &str) -> bool {
    let doc = Html::parse_document(html);

    let p_selector = Selector::parse("p").unwrap();
    let substantial = doc
        .select(&p_selector)
        .filter(|p| p.text().collect::<String>().trim().chars().count() > 50)
        .count();
    if substantial > 3 {
        return true;
    }

    for selector_str in CONTENT_SELECTORS {
        let selector = Selector::parse(selector_str).unwrap();
        if doc
            .select(&selector)
            .any(|el| el.text().collect::<String>().trim().chars().count() > 100)
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs(words_each: usize, count: usize) -> Vec<String> {
        vec!["word ".repeat(words_each).trim().to_string(); count]
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(&paragraphs(10, 3)), 30);
        assert_eq!(word_count(&[]), 0);
    }

    #[test]
    fn test_sufficiency_threshold() {
        let result = ExtractionResult::found(paragraphs(50, 2));
        assert!(result.sufficient);
        let result = ExtractionResult::found(paragraphs(33, 3));
        assert!(!result.sufficient);
    }

    #[test]
    fn test_content_likely_loaded_by_paragraphs() {
        let p = format!("<p>{}</p>", "x".repeat(60));
        let html = format!("<html><body>{}</body></html>", p.repeat(4));
        assert!(content_likely_loaded(&html));

        let html = format!("<html><body>{}</body></html>", p.repeat(3));
        assert!(!content_likely_loaded(&html));
    }

    #[test]
    fn test_content_likely_loaded_by_container() {
        let html = format!(
            r#"<html><body><div class="chapter-content">{}</div></body></html>"#,
            "x".repeat(150)
        );
        assert!(content_likely_loaded(&html));
        assert!(!content_likely_loaded("<html><body><div class=\"chapter-content\">tiny</div></body></html>"));
    }

    #[test]
    fn test_sentinel_strings() {
        assert_eq!(FetchFailure::NoContent.sentinel(), "No content found");
        assert_eq!(
            FetchFailure::NoAlternativeContent.sentinel(),
            "No content found with alternative methods"
        );
        assert_eq!(
            FetchFailure::Transient.sentinel(),
            "Content temporarily unavailable"
        );
    }

    #[tokio::test]
    async fn test_static_fetch_sufficient_skips_browser() {
        let body = format!(
            r#"<html><body><div class="chapter-content">
                <p>{p}</p><p>{p}</p><p>{p}</p>
            </div></body></html>"#,
            p = "word ".repeat(60)
        );
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let handle = std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = tiny_http::Response::from_string(body).with_header(
                    "Content-Type: text/html"
                        .parse::<tiny_http::Header>()
                        .unwrap(),
                );
                let _ = request.respond(response);
            }
        });

        let pipeline = FetchPipeline::new(HttpClient::with_delay(
            Duration::from_secs(5),
            Duration::ZERO,
        ));
        let mut slot = BrowserSlot::new(Default::default());
        let result = pipeline
            .fetch(&format!("http://{addr}/chapter-1"), &mut slot)
            .await;
        slot.close().await;
        handle.join().unwrap();

        assert!(result.sufficient);
        assert_eq!(result.paragraphs.len(), 3);
        assert!(result.failure.is_none());
    }
}
