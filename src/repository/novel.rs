//! Website, novel, and tag store operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::Store;
use crate::models::{normalize_tag_name, Novel, Tag, Website};

fn website_from_row(row: &Row<'_>) -> rusqlite::Result<Website> {
    Ok(Website {
        id: row.get("id")?,
        name: row.get("name")?,
        link: row.get("link")?,
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
    })
}

fn novel_from_row(row: &Row<'_>) -> rusqlite::Result<Novel> {
    Ok(Novel {
        id: row.get("id")?,
        website_id: row.get("website_id")?,
        name: row.get("name")?,
        link: row.get("link")?,
        image_url: row.get("image_url")?,
        description: row.get("description")?,
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
    })
}

const NOVEL_COLUMNS: &str = "id, website_id, name, link, image_url, description, created_at";

impl Store {
    /// Find a website by canonical link (preferred) or name, creating it
    /// when absent.
    pub fn find_or_create_website(
        &self,
        link: Option<&str>,
        name: &str,
    ) -> rusqlite::Result<Website> {
        let existing = match link {
            Some(link) => self
                .conn
                .query_row(
                    "SELECT id, name, link, created_at FROM websites WHERE link = ?1",
                    params![link],
                    website_from_row,
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    "SELECT id, name, link, created_at FROM websites WHERE name = ?1",
                    params![name],
                    website_from_row,
                )
                .optional()?,
        };
        if let Some(website) = existing {
            return Ok(website);
        }

        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO websites (name, link, created_at) VALUES (?1, ?2, ?3)",
            params![name, link, created_at],
        )?;
        info!(name, "created website");
        Ok(Website {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            link: link.map(str::to_string),
            created_at,
        })
    }

    /// Find a novel of a website by canonical series link, creating it when
    /// absent. Matching goes by link rather than name: names are re-derived
    /// from URL slugs and can differ between crawls.
    pub fn find_or_create_novel(
        &self,
        website_id: i64,
        link: &str,
        name: &str,
    ) -> rusqlite::Result<Novel> {
        let existing = self
            .conn
            .query_row(
                &format!("SELECT {NOVEL_COLUMNS} FROM novels WHERE website_id = ?1 AND link = ?2"),
                params![website_id, link],
                novel_from_row,
            )
            .optional()?;
        if let Some(novel) = existing {
            return Ok(novel);
        }

        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO novels (website_id, name, link, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![website_id, name, link, created_at],
        )?;
        info!(name, "created novel");
        Ok(Novel {
            id: self.conn.last_insert_rowid(),
            website_id,
            name: name.to_string(),
            link: link.to_string(),
            image_url: None,
            description: None,
            created_at,
        })
    }

    pub fn get_novel(&self, id: i64) -> rusqlite::Result<Option<Novel>> {
        self.conn
            .query_row(
                &format!("SELECT {NOVEL_COLUMNS} FROM novels WHERE id = ?1"),
                params![id],
                novel_from_row,
            )
            .optional()
    }

    pub fn list_novels(&self) -> rusqlite::Result<Vec<Novel>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {NOVEL_COLUMNS} FROM novels ORDER BY id ASC"))?;
        let rows = stmt.query_map([], novel_from_row)?;
        rows.collect()
    }

    /// Apply best-effort series metadata. `None` fields are left untouched;
    /// tags are merged in (existing associations are kept).
    pub fn update_novel_metadata(
        &self,
        novel_id: i64,
        description: Option<&str>,
        image_url: Option<&str>,
        tags: Option<&[String]>,
    ) -> rusqlite::Result<()> {
        if let Some(description) = description {
            self.conn.execute(
                "UPDATE novels SET description = ?1 WHERE id = ?2",
                params![description, novel_id],
            )?;
        }
        if let Some(image_url) = image_url {
            self.conn.execute(
                "UPDATE novels SET image_url = ?1 WHERE id = ?2",
                params![image_url, novel_id],
            )?;
        }
        if let Some(tags) = tags {
            for tag_name in tags {
                let tag = self.find_or_create_tag(tag_name)?;
                self.conn.execute(
                    "INSERT OR IGNORE INTO novel_tags (novel_id, tag_id) VALUES (?1, ?2)",
                    params![novel_id, tag.id],
                )?;
            }
        }
        Ok(())
    }

    /// Find a tag by normalized name, creating it when absent. Blank names
    /// are rejected by the caller side; this trims and lowercases.
    pub fn find_or_create_tag(&self, name: &str) -> rusqlite::Result<Tag> {
        let name = normalize_tag_name(name);
        let existing = self
            .conn
            .query_row(
                "SELECT id, name FROM tags WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        if let Some(tag) = existing {
            return Ok(tag);
        }
        self.conn
            .execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
        Ok(Tag {
            id: self.conn.last_insert_rowid(),
            name,
        })
    }

    pub fn novel_tags(&self, novel_id: i64) -> rusqlite::Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name FROM tags t
             JOIN novel_tags nt ON nt.tag_id = t.id
             WHERE nt.novel_id = ?1
             ORDER BY t.name ASC",
        )?;
        let rows = stmt.query_map(params![novel_id], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_create_website_by_link() {
        let store = Store::open_in_memory().unwrap();
        let first = store
            .find_or_create_website(Some("https://group.example"), "Group")
            .unwrap();
        // Same link, different display name: matched, not duplicated.
        let second = store
            .find_or_create_website(Some("https://group.example"), "Group Renamed")
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Group");
    }

    #[test]
    fn test_find_or_create_website_without_link_matches_name() {
        let store = Store::open_in_memory().unwrap();
        let first = store.find_or_create_website(None, "Anonymous Group").unwrap();
        let second = store.find_or_create_website(None, "Anonymous Group").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_novel_matched_by_link_not_name() {
        let store = Store::open_in_memory().unwrap();
        let website = store.find_or_create_website(Some("https://g"), "G").unwrap();
        let first = store
            .find_or_create_novel(website.id, "https://src/series/my-novel/", "My Novel")
            .unwrap();
        // Name derived differently on a later crawl still resolves by link.
        let second = store
            .find_or_create_novel(website.id, "https://src/series/my-novel/", "My novel")
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "My Novel");
    }

    #[test]
    fn test_metadata_update_and_tag_normalization() {
        let store = Store::open_in_memory().unwrap();
        let website = store.find_or_create_website(Some("https://g"), "G").unwrap();
        let novel = store
            .find_or_create_novel(website.id, "https://src/series/a/", "A")
            .unwrap();

        let tags = vec!["  Action ".to_string(), "ACTION".to_string(), "Drama".to_string()];
        store
            .update_novel_metadata(novel.id, Some("A story."), Some("https://img/x.jpg"), Some(&tags))
            .unwrap();

        let reloaded = store.get_novel(novel.id).unwrap().unwrap();
        assert_eq!(reloaded.description.as_deref(), Some("A story."));
        assert_eq!(reloaded.image_url.as_deref(), Some("https://img/x.jpg"));

        let names: Vec<_> = store
            .novel_tags(novel.id)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["action", "drama"]);
    }

    #[test]
    fn test_metadata_none_fields_untouched() {
        let store = Store::open_in_memory().unwrap();
        let website = store.find_or_create_website(Some("https://g"), "G").unwrap();
        let novel = store
            .find_or_create_novel(website.id, "https://src/series/a/", "A")
            .unwrap();
        store
            .update_novel_metadata(novel.id, Some("Kept."), None, None)
            .unwrap();
        store.update_novel_metadata(novel.id, None, None, None).unwrap();

        let reloaded = store.get_novel(novel.id).unwrap().unwrap();
        assert_eq!(reloaded.description.as_deref(), Some("Kept."));
    }
}
