use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Password;

use promptloops_client::Credential;
use promptloops_core::PromptStore;
use promptloops_db::Database;

#[derive(Subcommand, Debug)]
pub enum KeyAction {
    /// Store an OpenRouter API key (prompts if omitted)
    Set { key: Option<String> },

    /// Show whether a key is stored
    Status,

    /// Forget the stored key
    Clear,
}

pub fn handle_key_command(db: &Database, action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Set { key } => {
            let raw = match key {
                Some(key) => key,
                None => Password::new()
                    .with_prompt("OpenRouter API key")
                    .interact()?,
            };
            let credential = Credential::parse(&raw)?;
            db.save_credential(&credential)
                .context("Failed to store API key")?;
            eprintln!("{} Stored key {}", "✓".bright_green(), credential);
        }
        KeyAction::Status => match db.load_credential().context("Failed to read API key")? {
            Some(raw) => match Credential::parse(&raw) {
                Ok(credential) => eprintln!("{} Key stored: {}", "✓".bright_green(), credential),
                Err(e) => eprintln!("{} Stored key is unusable: {}", "⚠".bright_yellow(), e),
            },
            None => eprintln!(
                "{} No key stored. Run {} or set OPENROUTER_API_KEY.",
                "✗".dimmed(),
                "promptloops key set".bright_cyan()
            ),
        },
        KeyAction::Clear => {
            if db.settings().clear_credential()? {
                eprintln!("{} Key removed", "✓".bright_green());
            } else {
                eprintln!("{}", "No key was stored.".dimmed());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear_key() {
        let db = Database::open_in_memory().unwrap();

        handle_key_command(
            &db,
            KeyAction::Set {
                key: Some("sk-or-v1-abcdef".to_string()),
            },
        )
        .unwrap();
        assert_eq!(
            db.load_credential().unwrap(),
            Some("sk-or-v1-abcdef".to_string())
        );

        handle_key_command(&db, KeyAction::Clear).unwrap();
        assert_eq!(db.load_credential().unwrap(), None);
    }

    #[test]
    fn test_malformed_key_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = handle_key_command(
            &db,
            KeyAction::Set {
                key: Some("not-a-key".to_string()),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("sk-or-v1-"));
        assert_eq!(db.load_credential().unwrap(), None);
    }
}
