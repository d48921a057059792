//! Chapter-list reconciliation: merge a freshly scraped, possibly
//! reversed listing into the stored chapters of a novel.
//!
//! The whole reconciliation runs in one transaction; a failure anywhere
//! rolls the entire pass back so no partial position reassignment is ever
//! observable.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::models::ChapterRef;
use crate::repository::{ChapterFieldUpdate, Store};

static CHAPTER_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)chapter\s*([0-9]+(?:\.[0-9]+)?)").unwrap());
static CH_ABBREV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bch\.?\s*([0-9]+(?:\.[0-9]+)?)").unwrap());

/// Pull a numeric chapter index out of a title like "Chapter 123" or
/// "Ch. 12.5".
pub fn extract_chapter_number(title: &str) -> Option<f64> {
    CHAPTER_NUMBER
        .captures(title)
        .or_else(|| CH_ABBREV.captures(title))
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Whether a scraped list looks newest-first: the first title's chapter
/// number exceeds the last's. Unextractable numbers default to oldest-first.
fn looks_newest_first(refs: &[ChapterRef]) -> bool {
    if refs.len() < 2 {
        return false;
    }
    match (
        extract_chapter_number(&refs[0].title),
        extract_chapter_number(&refs[refs.len() - 1].title),
    ) {
        (Some(first), Some(last)) => first > last,
        _ => false,
    }
}

/// Reconcile scraped chapter refs against the stored chapters of a novel:
/// match by link first (links survive retitling), then by exact title;
/// update changed fields in place; create what is missing; assign 1-based
/// sequential positions; finally backfill unpositioned legacy rows past the
/// maximum known position.
///
/// Idempotent: re-running with an unchanged listing writes nothing.
pub fn sync_chapter_positions(
    store: &Store,
    novel_id: i64,
    refs: &[ChapterRef],
) -> rusqlite::Result<()> {
    if refs.is_empty() {
        return Ok(());
    }

    let mut ordered: Vec<&ChapterRef> = refs.iter().collect();
    if looks_newest_first(refs) {
        debug!(novel_id, "listing looks newest-first, reversing");
        ordered.reverse();
    }

    let tx = store.begin()?;

    for (index, chapter_ref) in ordered.iter().enumerate() {
        let position = (index + 1) as i64;
        let title = chapter_ref.title.trim();
        let link = chapter_ref.url.trim();

        let existing = if link.is_empty() {
            None
        } else {
            store.find_chapter_by_link(novel_id, link)?
        };
        let existing = match existing {
            Some(chapter) => Some(chapter),
            None => store.find_chapter_by_name(novel_id, title)?,
        };

        match existing {
            Some(chapter) => {
                let mut update = ChapterFieldUpdate::default();
                if chapter.name != title {
                    update.name = Some(title);
                }
                if !link.is_empty() && chapter.link.as_deref() != Some(link) {
                    update.link = Some(link);
                }
                if chapter.position != Some(position) {
                    update.position = Some(position);
                }
                store.update_chapter_fields(chapter.id, update)?;
            }
            None => {
                store.create_chapter(
                    novel_id,
                    title,
                    (!link.is_empty()).then_some(link),
                    Some(position),
                )?;
            }
        }
    }

    // Rows never matched by any sync keep their relative stored order but
    // land strictly after everything positioned above.
    let mut max_position = store
        .max_position(novel_id)?
        .unwrap_or(ordered.len() as i64);
    for chapter in store.chapters_with_nil_position(novel_id)? {
        max_position += 1;
        store.update_chapter_fields(
            chapter.id,
            ChapterFieldUpdate {
                position: Some(max_position),
                ..Default::default()
            },
        )?;
    }

    tx.commit()?;
    info!(novel_id, chapters = ordered.len(), "chapter positions synchronized");
    Ok(())
}
