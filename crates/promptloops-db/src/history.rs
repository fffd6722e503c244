//! Generation history: an append-only log capped to the most recent entries.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::MutexGuard;

use crate::{format_timestamp, parse_timestamp};

/// Number of entries kept; older ones are pruned on append
pub const HISTORY_LIMIT: usize = 50;

/// One generated instruction and the inputs that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub desired_output: String,
    pub context: String,
    pub instruction: String,
    pub feedback: Option<String>,
    pub model: String,
}

impl HistoryEntry {
    pub fn new(
        desired_output: impl Into<String>,
        context: impl Into<String>,
        instruction: impl Into<String>,
        feedback: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().trunc_subsecs(6),
            desired_output: desired_output.into(),
            context: context.into(),
            instruction: instruction.into(),
            feedback,
            model: model.into(),
        }
    }
}

/// History store with a borrowed connection.
pub struct History<'db> {
    conn: MutexGuard<'db, Connection>,
}

impl<'db> History<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    /// Append an entry and prune everything beyond [`HISTORY_LIMIT`].
    pub fn append(&self, entry: &HistoryEntry) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            r#"
            INSERT INTO history (id, timestamp, desired_output, context, instruction, feedback, model)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                entry.id,
                format_timestamp(&entry.timestamp),
                entry.desired_output,
                entry.context,
                entry.instruction,
                entry.feedback,
                entry.model,
            ],
        )?;

        self.conn.execute(
            r#"
            DELETE FROM history WHERE id NOT IN (
                SELECT id FROM history ORDER BY timestamp DESC, seq DESC LIMIT ?1
            )
            "#,
            params![HISTORY_LIMIT as i64],
        )?;

        Ok(())
    }

    /// All entries, newest first.
    pub fn list(&self) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, desired_output, context, instruction, feedback, model FROM history ORDER BY timestamp DESC, seq DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let timestamp: String = row.get(1)?;
            Ok(HistoryEntry {
                id: row.get(0)?,
                timestamp: parse_timestamp(&timestamp),
                desired_output: row.get(2)?,
                context: row.get(3)?,
                instruction: row.get(4)?,
                feedback: row.get(5)?,
                model: row.get(6)?,
            })
        })?;

        rows.collect()
    }

    pub fn clear(&self) -> Result<usize, rusqlite::Error> {
        self.conn.execute("DELETE FROM history", [])
    }
}
