//! Repository layer for the novel/chapter store.
//!
//! A single [`Store`] owns the SQLite connection; entity operations are
//! split across `novel.rs` and `chapter.rs` impl blocks. The synchronizer
//! groups its writes under one transaction via [`Store::begin`].

mod chapter;
mod novel;

pub use chapter::ChapterFieldUpdate;

use std::path::Path;

use rusqlite::{Connection, Transaction};
use tracing::debug;

/// SQLite-backed keyed store for websites, novels, chapters, and tags.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store. Used by tests.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist. Idempotent.
    pub fn init_schema(&self) -> rusqlite::Result<()> {
        debug!("initializing store schema");
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS websites (
                id         INTEGER PRIMARY KEY,
                name       TEXT NOT NULL,
                link       TEXT UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS novels (
                id          INTEGER PRIMARY KEY,
                website_id  INTEGER NOT NULL REFERENCES websites(id),
                name        TEXT NOT NULL,
                link        TEXT NOT NULL,
                image_url   TEXT,
                description TEXT,
                created_at  TEXT NOT NULL,
                UNIQUE(website_id, name)
            );

            CREATE TABLE IF NOT EXISTS chapters (
                id         INTEGER PRIMARY KEY,
                novel_id   INTEGER NOT NULL REFERENCES novels(id),
                name       TEXT NOT NULL,
                link       TEXT,
                content    TEXT,
                position   INTEGER,
                created_at TEXT NOT NULL,
                UNIQUE(novel_id, name)
            );

            CREATE TABLE IF NOT EXISTS tags (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS novel_tags (
                novel_id INTEGER NOT NULL REFERENCES novels(id),
                tag_id   INTEGER NOT NULL REFERENCES tags(id),
                PRIMARY KEY (novel_id, tag_id)
            );

            CREATE INDEX IF NOT EXISTS idx_chapters_novel_link
                ON chapters(novel_id, link);
            CREATE INDEX IF NOT EXISTS idx_chapters_novel_position
                ON chapters(novel_id, position);
            "#,
        )
    }

    /// Begin a transaction on the store's connection. Work performed through
    /// the store while the transaction is live joins it; dropping without
    /// commit rolls everything back.
    pub fn begin(&self) -> rusqlite::Result<Transaction<'_>> {
        self.conn.unchecked_transaction()
    }
}
