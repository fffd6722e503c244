//! Database layer for promptloops.
//!
//! Provides a unified `Database` struct that owns the SQLite connection
//! and provides access to domain-specific stores.

mod history;
mod public_prompts;
mod settings;

pub use history::{History, HistoryEntry, HISTORY_LIMIT};
pub use public_prompts::{PublicPrompt, PublicPrompts};
pub use settings::Settings;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// The main database struct that owns the SQLite connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the default location.
    ///
    /// The default location is `~/.local/share/promptloops/promptloops.db`.
    pub fn open() -> Result<Self, rusqlite::Error> {
        let db_path = Self::default_path();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        Self::open_at(&db_path)
    }

    /// Open or create a database at a specific path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the default database path.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("promptloops")
            .join("promptloops.db")
    }

    pub fn history(&self) -> History<'_> {
        History::new(self.lock())
    }

    pub fn settings(&self) -> Settings<'_> {
        Settings::new(self.lock())
    }

    pub fn public_prompts(&self) -> PublicPrompts<'_> {
        PublicPrompts::new(self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite itself inconsistent
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialize the database schema.
    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                timestamp TEXT NOT NULL,
                desired_output TEXT NOT NULL,
                context TEXT NOT NULL,
                instruction TEXT NOT NULL,
                feedback TEXT,
                model TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp DESC);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS public_prompts (
                id TEXT PRIMARY KEY,
                instruction TEXT NOT NULL,
                desired_output TEXT NOT NULL,
                context TEXT NOT NULL,
                model TEXT NOT NULL,
                score REAL,
                validation_results TEXT NOT NULL,
                author TEXT NOT NULL,
                published_at TEXT NOT NULL,
                views INTEGER NOT NULL DEFAULT 0,
                refinements INTEGER NOT NULL DEFAULT 0,
                refined_from TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_public_prompts_score ON public_prompts(score DESC);
            "#,
        )
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
