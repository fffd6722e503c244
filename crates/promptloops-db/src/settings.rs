//! Key-value settings, including the stored API credential.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::MutexGuard;

const CREDENTIAL_KEY: &str = "api_key";

/// Settings store with a borrowed connection.
pub struct Settings<'db> {
    conn: MutexGuard<'db, Connection>,
}

impl<'db> Settings<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool, rusqlite::Error> {
        let rows = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    pub fn get_credential(&self) -> Result<Option<String>, rusqlite::Error> {
        Ok(self.get(CREDENTIAL_KEY)?.filter(|v| !v.trim().is_empty()))
    }

    pub fn save_credential(&self, credential: &str) -> Result<(), rusqlite::Error> {
        self.set(CREDENTIAL_KEY, credential)
    }

    pub fn clear_credential(&self) -> Result<bool, rusqlite::Error> {
        self.remove(CREDENTIAL_KEY)
    }
}
