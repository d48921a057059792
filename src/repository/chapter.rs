//! Chapter store operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, ToSql};

use super::Store;
use crate::models::Chapter;

/// Partial chapter update. `None` fields are left untouched. These are
/// direct field writes: they must not trigger content refetch or any other
/// dependent logic, which is what the synchronizer relies on.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChapterFieldUpdate<'a> {
    pub name: Option<&'a str>,
    pub link: Option<&'a str>,
    pub position: Option<i64>,
}

fn chapter_from_row(row: &Row<'_>) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get("id")?,
        novel_id: row.get("novel_id")?,
        name: row.get("name")?,
        link: row.get("link")?,
        content: row.get("content")?,
        position: row.get("position")?,
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
    })
}

const CHAPTER_COLUMNS: &str = "id, novel_id, name, link, content, position, created_at";

impl Store {
    /// Look up a chapter of a novel by its source URL.
    pub fn find_chapter_by_link(
        &self,
        novel_id: i64,
        link: &str,
    ) -> rusqlite::Result<Option<Chapter>> {
        self.conn
            .query_row(
                &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE novel_id = ?1 AND link = ?2"),
                params![novel_id, link],
                chapter_from_row,
            )
            .optional()
    }

    /// Look up a chapter of a novel by its exact title.
    pub fn find_chapter_by_name(
        &self,
        novel_id: i64,
        name: &str,
    ) -> rusqlite::Result<Option<Chapter>> {
        self.conn
            .query_row(
                &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE novel_id = ?1 AND name = ?2"),
                params![novel_id, name],
                chapter_from_row,
            )
            .optional()
    }

    pub fn get_chapter(&self, id: i64) -> rusqlite::Result<Option<Chapter>> {
        self.conn
            .query_row(
                &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?1"),
                params![id],
                chapter_from_row,
            )
            .optional()
    }

    /// Create a chapter without content.
    pub fn create_chapter(
        &self,
        novel_id: i64,
        name: &str,
        link: Option<&str>,
        position: Option<i64>,
    ) -> rusqlite::Result<Chapter> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO chapters (novel_id, name, link, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![novel_id, name, link, position, created_at],
        )?;
        Ok(Chapter {
            id: self.conn.last_insert_rowid(),
            novel_id,
            name: name.to_string(),
            link: link.map(str::to_string),
            content: None,
            position,
            created_at,
        })
    }

    /// Apply a partial field update to a chapter. No-op when every field
    /// is `None`.
    pub fn update_chapter_fields(
        &self,
        id: i64,
        update: ChapterFieldUpdate<'_>,
    ) -> rusqlite::Result<()> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();

        if let Some(ref name) = update.name {
            sets.push("name = ?");
            values.push(name);
        }
        if let Some(ref link) = update.link {
            sets.push("link = ?");
            values.push(link);
        }
        if let Some(ref position) = update.position {
            sets.push("position = ?");
            values.push(position);
        }
        if sets.is_empty() {
            return Ok(());
        }

        values.push(&id);
        let sql = format!("UPDATE chapters SET {} WHERE id = ?", sets.join(", "));
        self.conn.execute(&sql, &values[..])?;
        Ok(())
    }

    /// Persist extracted chapter text.
    pub fn set_chapter_content(&self, id: i64, content: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE chapters SET content = ?1 WHERE id = ?2",
            params![content, id],
        )?;
        Ok(())
    }

    /// Highest assigned position for a novel, if any chapter is positioned.
    pub fn max_position(&self, novel_id: i64) -> rusqlite::Result<Option<i64>> {
        self.conn.query_row(
            "SELECT MAX(position) FROM chapters WHERE novel_id = ?1",
            params![novel_id],
            |row| row.get(0),
        )
    }

    /// Chapters of a novel with no position, in stored order. These are
    /// legacy rows predating position tracking, or rows never matched by a
    /// sync; the synchronizer backfills them past the current maximum.
    pub fn chapters_with_nil_position(&self, novel_id: i64) -> rusqlite::Result<Vec<Chapter>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters
             WHERE novel_id = ?1 AND position IS NULL
             ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![novel_id], chapter_from_row)?;
        rows.collect()
    }

    /// All chapters missing content, across every novel.
    pub fn chapters_without_content(&self) -> rusqlite::Result<Vec<Chapter>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters
             WHERE content IS NULL OR content = ''
             ORDER BY novel_id ASC, position IS NULL, position ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], chapter_from_row)?;
        rows.collect()
    }

    /// Chapters of a novel in reading order: positioned chapters first by
    /// position, then unpositioned rows by creation time.
    pub fn ordered_chapters(&self, novel_id: i64) -> rusqlite::Result<Vec<Chapter>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters
             WHERE novel_id = ?1
             ORDER BY position IS NULL, position ASC, created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![novel_id], chapter_from_row)?;
        rows.collect()
    }

    /// The chapter following this one in reading order, if positioned.
    pub fn next_chapter(&self, chapter: &Chapter) -> rusqlite::Result<Option<Chapter>> {
        let Some(position) = chapter.position else {
            return Ok(None);
        };
        self.conn
            .query_row(
                &format!(
                    "SELECT {CHAPTER_COLUMNS} FROM chapters
                     WHERE novel_id = ?1 AND position > ?2
                     ORDER BY position ASC LIMIT 1"
                ),
                params![chapter.novel_id, position],
                chapter_from_row,
            )
            .optional()
    }

    /// The chapter preceding this one in reading order, if positioned.
    pub fn previous_chapter(&self, chapter: &Chapter) -> rusqlite::Result<Option<Chapter>> {
        let Some(position) = chapter.position else {
            return Ok(None);
        };
        self.conn
            .query_row(
                &format!(
                    "SELECT {CHAPTER_COLUMNS} FROM chapters
                     WHERE novel_id = ?1 AND position < ?2
                     ORDER BY position DESC LIMIT 1"
                ),
                params![chapter.novel_id, position],
                chapter_from_row,
            )
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_novel() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let website = store.find_or_create_website(Some("https://group.example"), "Group").unwrap();
        let novel = store
            .find_or_create_novel(website.id, "https://src.example/series/a/", "A")
            .unwrap();
        (store, novel.id)
    }

    #[test]
    fn test_create_and_find_by_link_and_name() {
        let (store, novel_id) = store_with_novel();
        let created = store
            .create_chapter(novel_id, "Chapter 1", Some("https://x/1"), Some(1))
            .unwrap();

        let by_link = store.find_chapter_by_link(novel_id, "https://x/1").unwrap().unwrap();
        assert_eq!(by_link.id, created.id);

        let by_name = store.find_chapter_by_name(novel_id, "Chapter 1").unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        assert!(store.find_chapter_by_link(novel_id, "https://x/2").unwrap().is_none());
    }

    #[test]
    fn test_partial_field_update() {
        let (store, novel_id) = store_with_novel();
        let chapter = store.create_chapter(novel_id, "Chapter 1", None, None).unwrap();

        store
            .update_chapter_fields(
                chapter.id,
                ChapterFieldUpdate {
                    link: Some("https://x/1"),
                    position: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = store.get_chapter(chapter.id).unwrap().unwrap();
        assert_eq!(updated.name, "Chapter 1");
        assert_eq!(updated.link.as_deref(), Some("https://x/1"));
        assert_eq!(updated.position, Some(3));

        // Empty update is a no-op, not an error.
        store
            .update_chapter_fields(chapter.id, ChapterFieldUpdate::default())
            .unwrap();
    }

    #[test]
    fn test_max_position_and_nil_position_order() {
        let (store, novel_id) = store_with_novel();
        assert_eq!(store.max_position(novel_id).unwrap(), None);

        store.create_chapter(novel_id, "Chapter 1", None, Some(1)).unwrap();
        store.create_chapter(novel_id, "Legacy B", None, None).unwrap();
        store.create_chapter(novel_id, "Legacy C", None, None).unwrap();

        assert_eq!(store.max_position(novel_id).unwrap(), Some(1));
        let unpositioned = store.chapters_with_nil_position(novel_id).unwrap();
        let names: Vec<_> = unpositioned.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Legacy B", "Legacy C"]);
    }

    #[test]
    fn test_next_and_previous_chapter() {
        let (store, novel_id) = store_with_novel();
        let c1 = store.create_chapter(novel_id, "Chapter 1", None, Some(1)).unwrap();
        let c2 = store.create_chapter(novel_id, "Chapter 2", None, Some(2)).unwrap();
        let legacy = store.create_chapter(novel_id, "Legacy", None, None).unwrap();

        assert_eq!(store.next_chapter(&c1).unwrap().unwrap().id, c2.id);
        assert_eq!(store.previous_chapter(&c2).unwrap().unwrap().id, c1.id);
        assert!(store.next_chapter(&c2).unwrap().is_none());
        assert!(store.next_chapter(&legacy).unwrap().is_none());
    }

    #[test]
    fn test_chapters_without_content() {
        let (store, novel_id) = store_with_novel();
        let empty = store.create_chapter(novel_id, "Chapter 1", None, Some(1)).unwrap();
        let filled = store.create_chapter(novel_id, "Chapter 2", None, Some(2)).unwrap();
        store.set_chapter_content(filled.id, "Some text.").unwrap();

        let missing = store.chapters_without_content().unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, empty.id);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (store, novel_id) = store_with_novel();
        store.create_chapter(novel_id, "Chapter 1", None, Some(1)).unwrap();
        assert!(store.create_chapter(novel_id, "Chapter 1", None, Some(2)).is_err());
    }
}
