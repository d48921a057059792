//! Heuristic main-content extraction from arbitrary chapter HTML.
//!
//! Sites hosting serialized fiction vary too much for fixed selectors, so
//! the primary strategy is density by structural path: paragraphs are
//! grouped by the class attributes of their ancestor chain, and the group
//! with the most text wins. Alternative extraction recovers sites where the
//! real content is not paragraph-tagged at all.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Paragraphs shorter than this are assumed to be UI chrome or navigation.
const PARAGRAPH_MIN_CHARS: usize = 20;

/// Minimum raw text length for the largest-block fallback container.
const BLOCK_MIN_CHARS: usize = 500;

/// A winning paragraph group must be larger than this.
const MIN_GROUP_PARAGRAPHS: usize = 2;

/// Common content-container class and id names, tried in priority order by
/// alternative extraction.
pub const CONTENT_SELECTORS: &[&str] = &[
    ".chapter-content",
    ".story-content",
    ".post-content",
    ".entry-content",
    ".main-content",
    ".chapter-text",
    "#content",
    "#chapter",
    ".chapter",
    ".story",
    ".text-content",
    ".novel-content",
    ".reading-content",
];

static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Outcome of a content-extraction attempt. Extraction never fails with an
/// error: an unusable page is a value, tagged with which strategy gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Ordered paragraph texts of the most likely main content.
    Found(Vec<String>),
    /// No suitable content block was located.
    Empty(FailureKind),
}

/// Which extraction stage exhausted its strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The density heuristic found no winning paragraph group.
    NoContent,
    /// Alternative extraction also came up empty.
    NoAlternativeContent,
}

impl FailureKind {
    /// The in-band sentinel string for this failure, surfaced where text
    /// must cross the entry-point boundary. Callers there check these
    /// literals by value.
    pub fn sentinel(self) -> &'static str {
        match self {
            Self::NoContent => "No content found",
            Self::NoAlternativeContent => "No content found with alternative methods",
        }
    }
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    /// Paragraphs, or the sentinel string as a single pseudo-paragraph.
    pub fn into_paragraphs(self) -> Vec<String> {
        match self {
            Self::Found(paragraphs) => paragraphs,
            Self::Empty(kind) => vec![kind.sentinel().to_string()],
        }
    }
}

/// Extract the most likely main content from a parsed document, trying the
/// density heuristic first and alternative extraction on failure.
pub fn extract(doc: &Html) -> Extraction {
    match extract_main_content(doc) {
        Extraction::Empty(_) => match extract_alternative(doc) {
            // Every strategy failed; the caller-facing marker is the plain
            // sentinel, the alternative-specific one is reserved for direct
            // alternative-extraction calls.
            Extraction::Empty(_) => Extraction::Empty(FailureKind::NoContent),
            found => found,
        },
        found => found,
    }
}

/// Parse and extract in one step.
pub fn extract_from_html(html: &str) -> Extraction {
    extract(&Html::parse_document(html))
}

/// Density-by-structural-path extraction: group paragraphs by ancestor
/// classes and pick the group with the greatest total text length.
pub fn extract_main_content(doc: &Html) -> Extraction {
    let p_selector = Selector::parse("p").unwrap();

    // Insertion order doubles as document order of each group's first
    // paragraph, which makes the tie-break deterministic.
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for paragraph in doc.select(&p_selector) {
        let text = paragraph.text().collect::<String>();
        let text = text.trim();
        if text.chars().count() < PARAGRAPH_MIN_CHARS {
            continue;
        }

        let key = structural_key(&paragraph);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, paragraphs)) => paragraphs.push(text.to_string()),
            None => groups.push((key, vec![text.to_string()])),
        }
    }

    // Total length as if joined with single spaces. Ties keep the earlier
    // group in document order.
    let mut winner: Option<&(String, Vec<String>)> = None;
    let mut winner_len = 0usize;
    for group in &groups {
        let joined_len = group.1.iter().map(|p| p.chars().count()).sum::<usize>()
            + group.1.len().saturating_sub(1);
        if joined_len > winner_len {
            winner_len = joined_len;
            winner = Some(group);
        }
    }

    match winner {
        Some((key, paragraphs)) if paragraphs.len() > MIN_GROUP_PARAGRAPHS => {
            debug!(
                key = key.as_str(),
                paragraphs = paragraphs.len(),
                "selected paragraph group"
            );
            Extraction::Found(paragraphs.clone())
        }
        _ => Extraction::Empty(FailureKind::NoContent),
    }
}

/// Alternative extraction for pages where content is not paragraph-tagged:
/// try common content-container selectors in priority order, then fall back
/// to the largest block-level container.
pub fn extract_alternative(doc: &Html) -> Extraction {
    for selector_str in CONTENT_SELECTORS {
        let selector = Selector::parse(selector_str).unwrap();

        let mut blocks: Vec<String> = Vec::new();
        for element in doc.select(&selector) {
            let text = element.text().collect::<String>();
            blocks.extend(split_text_blocks(&text));
        }
        if !blocks.is_empty() {
            debug!(selector = selector_str, blocks = blocks.len(), "alternative extraction hit");
            return Extraction::Found(blocks);
        }
    }

    largest_block_fallback(doc)
}

/// Last resort: the single largest `div`/`section`/`article`/`main` by raw
/// text length, accepted only when it is long enough to plausibly be a
/// chapter and splits into more than two paragraphs.
fn largest_block_fallback(doc: &Html) -> Extraction {
    let selector = Selector::parse("div, section, article, main").unwrap();

    let mut largest: Option<String> = None;
    let mut largest_len = 0usize;
    for element in doc.select(&selector) {
        let text = element.text().collect::<String>();
        let len = text.trim().chars().count();
        if len > largest_len {
            largest_len = len;
            largest = Some(text);
        }
    }

    if largest_len > BLOCK_MIN_CHARS {
        if let Some(text) = largest {
            let blocks = split_text_blocks(&text);
            if blocks.len() > MIN_GROUP_PARAGRAPHS {
                return Extraction::Found(blocks);
            }
        }
    }

    Extraction::Empty(FailureKind::NoAlternativeContent)
}

/// Split raw element text on blank-line boundaries, dropping fragments too
/// short to be real paragraphs.
fn split_text_blocks(text: &str) -> Vec<String> {
    BLANK_LINE
        .split(text)
        .map(str::trim)
        .filter(|fragment| fragment.chars().count() >= PARAGRAPH_MIN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Structural key of a paragraph: the class attributes of its ancestor
/// chain, root to parent. Paragraphs sharing a key most likely share a
/// visual container. `"no-class"` when no ancestor carries a class.
fn structural_key(paragraph: &ElementRef<'_>) -> String {
    let mut classes: Vec<&str> = paragraph
        .ancestors()
        .filter_map(|node| node.value().as_element())
        .filter_map(|element| element.attr("class"))
        .collect();
    // ancestors() walks parent-to-root; the key reads root-to-parent.
    classes.reverse();

    if classes.is_empty() {
        "no-class".to_string()
    } else {
        classes.join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(len: usize) -> String {
        "word ".repeat(len / 5)
    }

    #[test]
    fn test_selects_largest_group_by_total_length() {
        let small = "short chrome text, still over twenty chars";
        let big = paragraph(500);
        let html = format!(
            r#"<html><body>
                <div class="sidebar"><p>{small}</p><p>{small}</p><p>{small}</p></div>
                <div class="chapter-body"><p>{big}</p><p>{big}</p><p>{big}</p></div>
            </body></html>"#
        );
        let doc = Html::parse_document(&html);
        match extract_main_content(&doc) {
            Extraction::Found(paragraphs) => {
                assert_eq!(paragraphs.len(), 3);
                assert!(paragraphs[0].starts_with("word"));
            }
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_group_needs_more_than_two_paragraphs() {
        let big = paragraph(500);
        let html = format!(
            r#"<html><body><div class="c"><p>{big}</p><p>{big}</p></div></body></html>"#
        );
        let doc = Html::parse_document(&html);
        assert_eq!(
            extract_main_content(&doc),
            Extraction::Empty(FailureKind::NoContent)
        );
    }

    #[test]
    fn test_short_paragraphs_ignored_yields_sentinel() {
        let html = r#"<html><body>
            <p>short</p><p>menu</p><p>tiny text here</p>
        </body></html>"#;
        let result = extract_from_html(html);
        assert_eq!(result.into_paragraphs(), vec!["No content found"]);
    }

    #[test]
    fn test_structural_key_falls_back_to_no_class() {
        let long = paragraph(100);
        let html = format!(
            "<html><body><div><p>{long}</p><p>{long}</p><p>{long}</p></div></body></html>"
        );
        let doc = Html::parse_document(&html);
        let p_selector = Selector::parse("p").unwrap();
        let first = doc.select(&p_selector).next().unwrap();
        assert_eq!(structural_key(&first), "no-class");
        assert!(matches!(extract_main_content(&doc), Extraction::Found(_)));
    }

    #[test]
    fn test_structural_key_reads_root_to_parent() {
        let html = r#"<html><body>
            <div class="outer"><div class="inner"><p>some paragraph over twenty characters</p></div></div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let p_selector = Selector::parse("p").unwrap();
        let p = doc.select(&p_selector).next().unwrap();
        assert_eq!(structural_key(&p), "outer > inner");
    }

    #[test]
    fn test_tie_break_prefers_document_order() {
        let text = paragraph(100);
        let html = format!(
            r#"<html><body>
                <div class="first"><p>{text}</p><p>{text}</p><p>{text}</p></div>
                <div class="second"><p>{text}</p><p>{text}</p><p>{text}</p></div>
            </body></html>"#
        );
        let doc = Html::parse_document(&html);
        let p_selector = Selector::parse("p").unwrap();
        let expected: Vec<String> = doc
            .select(&p_selector)
            .take(3)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .collect();
        assert_eq!(extract_main_content(&doc), Extraction::Found(expected));
    }

    #[test]
    fn test_alternative_selector_priority() {
        let body = format!("{}\n\n{}\n\n{}", paragraph(80), paragraph(80), paragraph(80));
        // .chapter-content outranks #content even when #content comes first.
        let html = format!(
            r#"<html><body>
                <div id="content">{body}</div>
                <div class="chapter-content">{body} chapter-marker</div>
            </body></html>"#
        );
        let doc = Html::parse_document(&html);
        match extract_alternative(&doc) {
            Extraction::Found(blocks) => {
                assert!(blocks.last().unwrap().contains("chapter-marker"));
            }
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_alternative_splits_on_blank_lines() {
        let html = format!(
            "<html><body><div class=\"chapter-content\">{}\n\n{}\n \n{}</div></body></html>",
            paragraph(60),
            paragraph(60),
            paragraph(60)
        );
        let doc = Html::parse_document(&html);
        match extract_alternative(&doc) {
            Extraction::Found(blocks) => assert_eq!(blocks.len(), 3),
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_largest_block_fallback() {
        let body = format!("{}\n\n{}\n\n{}", paragraph(250), paragraph(250), paragraph(250));
        let html = format!(
            r#"<html><body><div class="unrecognized-container">{body}</div></body></html>"#
        );
        let doc = Html::parse_document(&html);
        assert!(matches!(extract_alternative(&doc), Extraction::Found(_)));
    }

    #[test]
    fn test_largest_block_too_short_is_rejected() {
        let html = r#"<html><body><div class="unrecognized-container">
            a block of text that is over twenty characters but nowhere near five hundred
        </div></body></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(
            extract_alternative(&doc),
            Extraction::Empty(FailureKind::NoAlternativeContent)
        );
    }

    #[test]
    fn test_extract_never_panics_on_degenerate_documents() {
        for html in ["", "<html></html>", "not html at all", "<p></p>"] {
            let _ = extract_from_html(html);
        }
    }
}
