//! Shared catalog of published instructions.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::MutexGuard;

use crate::{format_timestamp, parse_timestamp};

/// A published instruction together with how it scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPrompt {
    pub id: String,
    pub instruction: String,
    pub desired_output: String,
    pub context: String,
    pub model: String,
    /// Average validation score at publish time
    pub score: Option<f64>,
    pub validation_results: String, // JSON blob of validation results
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub views: i64,
    pub refinements: i64,
    /// Set when this prompt is a refinement of another published prompt
    pub refined_from: Option<String>,
}

impl PublicPrompt {
    pub fn new(
        instruction: impl Into<String>,
        desired_output: impl Into<String>,
        context: impl Into<String>,
        model: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            instruction: instruction.into(),
            desired_output: desired_output.into(),
            context: context.into(),
            model: model.into(),
            score: None,
            validation_results: "[]".to_string(),
            author: author.into(),
            published_at: Utc::now().trunc_subsecs(6),
            views: 0,
            refinements: 0,
            refined_from: None,
        }
    }
}

const COLUMNS: &str = "id, instruction, desired_output, context, model, score, validation_results, author, published_at, views, refinements, refined_from";

/// Public prompt store with a borrowed connection.
pub struct PublicPrompts<'db> {
    conn: MutexGuard<'db, Connection>,
}

impl<'db> PublicPrompts<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    /// Publish a prompt; returns its id.
    pub fn publish(&self, prompt: &PublicPrompt) -> Result<String, rusqlite::Error> {
        insert(&self.conn, prompt)?;
        Ok(prompt.id.clone())
    }

    /// Publish `refined` as a refinement of `original_id`, bumping the original's counter.
    ///
    /// Both writes land together or not at all.
    pub fn publish_refinement(
        &self,
        original_id: &str,
        refined: &PublicPrompt,
    ) -> Result<String, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        let bumped = tx.execute(
            "UPDATE public_prompts SET refinements = refinements + 1 WHERE id = ?1",
            params![original_id],
        )?;
        if bumped == 0 {
            return Err(rusqlite::Error::QueryReturnedNoRows);
        }

        let mut refined = refined.clone();
        refined.refined_from = Some(original_id.to_string());
        insert(&tx, &refined)?;
        tx.commit()?;
        Ok(refined.id)
    }

    /// Prompts whose id starts with `prefix`
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Vec<PublicPrompt>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM public_prompts WHERE substr(id, 1, length(?1)) = ?1 ORDER BY published_at DESC",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![prefix], Self::row_to_prompt)?;
        rows.collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<PublicPrompt>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM public_prompts WHERE id = ?1", COLUMNS),
                params![id],
                Self::row_to_prompt,
            )
            .optional()
    }

    /// Highest score first, then newest.
    pub fn list(&self, limit: usize) -> Result<Vec<PublicPrompt>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM public_prompts ORDER BY COALESCE(score, 0) DESC, published_at DESC LIMIT ?1",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], Self::row_to_prompt)?;
        rows.collect()
    }

    /// Returns false when the prompt does not exist.
    pub fn record_view(&self, id: &str) -> Result<bool, rusqlite::Error> {
        let rows = self.conn.execute(
            "UPDATE public_prompts SET views = views + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(rows > 0)
    }

    pub fn delete(&self, id: &str) -> Result<bool, rusqlite::Error> {
        let rows = self
            .conn
            .execute("DELETE FROM public_prompts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn row_to_prompt(row: &rusqlite::Row) -> Result<PublicPrompt, rusqlite::Error> {
        let published_at: String = row.get(8)?;
        Ok(PublicPrompt {
            id: row.get(0)?,
            instruction: row.get(1)?,
            desired_output: row.get(2)?,
            context: row.get(3)?,
            model: row.get(4)?,
            score: row.get(5)?,
            validation_results: row.get(6)?,
            author: row.get(7)?,
            published_at: parse_timestamp(&published_at),
            views: row.get(9)?,
            refinements: row.get(10)?,
            refined_from: row.get(11)?,
        })
    }
}

fn insert(conn: &Connection, prompt: &PublicPrompt) -> Result<(), rusqlite::Error> {
    conn.execute(
        &format!(
            "INSERT INTO public_prompts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            COLUMNS
        ),
        params![
            prompt.id,
            prompt.instruction,
            prompt.desired_output,
            prompt.context,
            prompt.model,
            prompt.score,
            prompt.validation_results,
            prompt.author,
            format_timestamp(&prompt.published_at),
            prompt.views,
            prompt.refinements,
            prompt.refined_from,
        ],
    )?;
    Ok(())
}
