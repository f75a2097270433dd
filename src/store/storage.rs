//! Story store trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::news::NewsStory;

/// Trait for story storage backends.
///
/// Implementations must be safe to read from several threads at once.
pub trait StoryStore: Send + Sync {
  /// Get every stored story.
  ///
  /// `None` means the store has nothing to offer at all. An empty `Vec` is a
  /// valid answer and callers treat it as one.
  fn get_all_stories(&self) -> Result<Option<Vec<NewsStory>>>;

  /// Find the first story whose title matches a SQL `LIKE` pattern.
  fn find_story_by_title(&self, title: &str) -> Result<Option<NewsStory>>;

  /// Insert stories. Fails if any title is already stored.
  fn insert_all_stories(&self, stories: &[NewsStory]) -> Result<()>;

  /// Delete a story by title. Returns whether a story was removed.
  fn delete_story(&self, title: &str) -> Result<bool>;
}

/// Storage implementation that doesn't store anything.
/// Used when caching is disabled - reads always miss, writes are discarded.
pub struct NoopStore;

impl StoryStore for NoopStore {
  fn get_all_stories(&self) -> Result<Option<Vec<NewsStory>>> {
    Ok(None) // Always miss
  }

  fn find_story_by_title(&self, _title: &str) -> Result<Option<NewsStory>> {
    Ok(None)
  }

  fn insert_all_stories(&self, _stories: &[NewsStory]) -> Result<()> {
    Ok(()) // Discard
  }

  fn delete_story(&self, _title: &str) -> Result<bool> {
    Ok(false)
  }
}

/// SQLite-based story storage.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open story database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a throwaway in-memory store.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("newsfeed").join("news.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS news_stories (
    title TEXT PRIMARY KEY NOT NULL,
    section TEXT,
    subsection TEXT,
    article_abstract TEXT,
    byline TEXT,
    published_date TEXT
);
"#;

const STORY_COLUMNS: &str =
  "title, section, subsection, article_abstract, byline, published_date";

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<NewsStory> {
  Ok(NewsStory {
    title: row.get(0)?,
    section: row.get(1)?,
    subsection: row.get(2)?,
    article_abstract: row.get(3)?,
    byline: row.get(4)?,
    published_date: row.get(5)?,
  })
}

impl StoryStore for SqliteStore {
  fn get_all_stories(&self) -> Result<Option<Vec<NewsStory>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(&format!(
        "SELECT {} FROM news_stories ORDER BY rowid",
        STORY_COLUMNS
      ))
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let stories = stmt
      .query_map([], story_from_row)
      .map_err(|e| eyre!("Failed to query stories: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read story row: {}", e))?;

    debug!(count = stories.len(), "read stories from store");

    // A readable table is always an answer, even when it has no rows
    Ok(Some(stories))
  }

  fn find_story_by_title(&self, title: &str) -> Result<Option<NewsStory>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        &format!(
          "SELECT {} FROM news_stories WHERE title LIKE ? ORDER BY rowid LIMIT 1",
          STORY_COLUMNS
        ),
        params![title],
        story_from_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to find story {:?}: {}", title, e))
  }

  fn insert_all_stories(&self, stories: &[NewsStory]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    {
      let mut stmt = tx
        .prepare(&format!(
          "INSERT INTO news_stories ({}) VALUES (?, ?, ?, ?, ?, ?)",
          STORY_COLUMNS
        ))
        .map_err(|e| eyre!("Failed to prepare insert: {}", e))?;

      for story in stories {
        stmt
          .execute(params![
            story.title,
            story.section,
            story.subsection,
            story.article_abstract,
            story.byline,
            story.published_date,
          ])
          .map_err(|e| eyre!("Failed to store story {:?}: {}", story.title, e))?;
      }
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    debug!(count = stories.len(), "stored stories");
    Ok(())
  }

  fn delete_story(&self, title: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute("DELETE FROM news_stories WHERE title = ?", params![title])
      .map_err(|e| eyre!("Failed to delete story {:?}: {}", title, e))?;

    Ok(removed > 0)
  }
}
