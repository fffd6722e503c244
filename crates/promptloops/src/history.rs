use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::{Confirm, FuzzySelect};
use std::path::PathBuf;

use promptloops_core::{ExportDocument, ExportFormat};
use promptloops_db::{Database, HistoryEntry};

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List generated instructions, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one instruction
    Show {
        /// Entry ID (launches interactive picker if omitted)
        id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete all history
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub fn handle_history_command(db: &Database, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List { json } => {
            let entries = db.history().list().context("Failed to read history")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("{}", "No history yet.".dimmed());
            } else {
                print_history_table(&entries);
            }
        }
        HistoryAction::Show { id, json } => {
            let entry = resolve_entry(db, id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_entry_detail(&entry);
            }
        }
        HistoryAction::Clear { yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Delete all history?")
                    .default(false)
                    .interact()?;
            if confirmed {
                let removed = db.history().clear().context("Failed to clear history")?;
                eprintln!("{} Removed {} entries", "✓".bright_green(), removed);
            }
        }
    }

    Ok(())
}

/// Write a history entry as Markdown or JSON
pub fn handle_export_command(
    db: &Database,
    id: Option<String>,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let entry = resolve_entry(db, id)?;
    let document = ExportDocument::new(
        &entry.instruction,
        &entry.desired_output,
        &entry.context,
        &entry.model,
        Vec::new(),
    );
    write_export(&document, format, output)
}

pub fn write_export(
    document: &ExportDocument,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let rendered = document.render(format)?;
    match output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Exported to {}", "✓".bright_green(), path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

/// Look up an entry by id prefix, or pick one interactively
pub fn resolve_entry(db: &Database, id: Option<String>) -> Result<HistoryEntry> {
    let entries = db.history().list().context("Failed to read history")?;
    if entries.is_empty() {
        anyhow::bail!("No history yet. Run `promptloops generate` first.");
    }

    match id {
        Some(id) => entries
            .into_iter()
            .find(|e| e.id.starts_with(&id))
            .with_context(|| format!("No history entry matches '{}'", id)),
        None => {
            let items: Vec<String> = entries.iter().map(entry_summary).collect();
            let selection = FuzzySelect::new()
                .with_prompt("Select an instruction")
                .items(&items)
                .default(0)
                .interact()?;
            Ok(entries[selection].clone())
        }
    }
}

fn entry_summary(entry: &HistoryEntry) -> String {
    format!(
        "{}  {}  {}",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        truncate(&entry.desired_output, 50),
        if entry.feedback.is_some() { "(refined)" } else { "" }
    )
}

fn print_history_table(entries: &[HistoryEntry]) {
    println!(
        "{:<10} {:<17} {:<32} {:<50}",
        "ID".bold(),
        "WHEN".bold(),
        "MODEL".bold(),
        "DESIRED OUTPUT".bold()
    );
    for entry in entries {
        let marker = if entry.feedback.is_some() {
            "↻".bright_yellow().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{:<10} {:<17} {:<32} {} {}",
            &entry.id[..8.min(entry.id.len())],
            entry.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            truncate(&entry.model, 30),
            marker,
            truncate(&entry.desired_output, 50)
        );
    }
}

fn print_entry_detail(entry: &HistoryEntry) {
    eprintln!("{} {}", "ID:".dimmed(), entry.id);
    eprintln!("{} {}", "When:".dimmed(), entry.timestamp.to_rfc3339());
    eprintln!("{} {}", "Model:".dimmed(), entry.model);
    eprintln!("{} {}", "Desired output:".dimmed(), entry.desired_output);
    if !entry.context.is_empty() {
        eprintln!("{} {}", "Context:".dimmed(), entry.context);
    }
    if let Some(feedback) = &entry.feedback {
        eprintln!("{} {}", "Feedback:".dimmed(), truncate(feedback, 200));
    }
    eprintln!();
    println!("{}", entry.instruction);
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}
