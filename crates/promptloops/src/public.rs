use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use promptloops_core::{BatchReport, GenerationParams, RefinementLoop};
use promptloops_db::{Database, HistoryEntry, PublicPrompt};

use crate::history::truncate;
use crate::refine::{run_refine, RefineOptions, RefineSummary, RoundMode};
use crate::CaseArgs;

#[derive(Subcommand, Debug)]
pub enum PublicAction {
    /// List published instructions, best scored first
    List {
        /// Maximum number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a published instruction
    Show {
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a published instruction
    Delete { id: String },

    /// Refine a published instruction and publish the result as its refinement
    Refine(RefineArgs),
}

#[derive(clap::Args, Debug)]
pub struct RefineArgs {
    /// ID (or unique prefix) of the published instruction
    pub id: String,

    /// Author name for the refined version
    #[arg(long)]
    pub author: String,

    #[command(flatten)]
    pub cases: CaseArgs,

    /// Feed the critique back automatically instead of asking
    #[arg(long)]
    pub auto: bool,

    /// Stop after this many validation rounds
    #[arg(short = 'n', long)]
    pub max_rounds: Option<usize>,

    /// Stop once the average score reaches this value
    #[arg(long)]
    pub target: Option<f64>,
}

impl RefineArgs {
    pub fn mode(&self) -> RoundMode {
        if self.auto {
            RoundMode::Auto
        } else {
            RoundMode::Interactive
        }
    }
}

pub fn handle_public_command(db: &Database, action: PublicAction) -> Result<()> {
    match action {
        PublicAction::List { limit, json } => {
            let prompts = db
                .public_prompts()
                .list(limit)
                .context("Failed to read public prompts")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&prompts)?);
            } else if prompts.is_empty() {
                println!("{}", "Nothing published yet.".dimmed());
            } else {
                for prompt in &prompts {
                    println!(
                        "{:<10} {:>6}  {:<50} {}",
                        &prompt.id[..8.min(prompt.id.len())],
                        prompt
                            .score
                            .map(|s| format!("{:.1}", s))
                            .unwrap_or_else(|| "-".to_string()),
                        truncate(&prompt.desired_output, 50),
                        format!("{} views, {} refinements", prompt.views, prompt.refinements)
                            .dimmed()
                    );
                }
            }
        }
        PublicAction::Show { id, json } => {
            let prompt = resolve_public(db, &id)?;
            db.public_prompts().record_view(&prompt.id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&prompt)?);
            } else {
                eprintln!("{} {}", "Author:".dimmed(), prompt.author);
                eprintln!("{} {}", "Model:".dimmed(), prompt.model);
                eprintln!("{} {}", "Desired output:".dimmed(), prompt.desired_output);
                if let Some(score) = prompt.score {
                    eprintln!("{} {:.1}/10", "Score:".dimmed(), score);
                }
                if let Some(original) = &prompt.refined_from {
                    eprintln!("{} {}", "Refined from:".dimmed(), original);
                }
                eprintln!();
                println!("{}", prompt.instruction);
            }
        }
        PublicAction::Delete { id } => {
            let prompt = resolve_public(db, &id)?;
            db.public_prompts().delete(&prompt.id)?;
            eprintln!("{} Deleted {}", "✓".bright_green(), prompt.id);
        }
        PublicAction::Refine(_) => {
            anyhow::bail!("`public refine` runs through the refinement loop")
        }
    }

    Ok(())
}

/// Look up a published prompt by full id or unique prefix
pub fn resolve_public(db: &Database, id: &str) -> Result<PublicPrompt> {
    let mut matches = db
        .public_prompts()
        .find_by_prefix(id)
        .context("Failed to read public prompts")?;
    if let Some(exact) = matches.iter().position(|p| p.id == id) {
        return Ok(matches.swap_remove(exact));
    }
    match matches.len() {
        0 => anyhow::bail!("No published prompt with id '{}'", id),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!("'{}' matches {} published prompts; use a longer id", id, n),
    }
}

/// Seed the loop with a published instruction, refine it, and publish the
/// result as a refinement of the original. Returns the new id, or `None`
/// when the instruction came back unchanged.
pub async fn refine_public(
    db: &Database,
    refinement: &RefinementLoop<'_>,
    original: &PublicPrompt,
    author: &str,
    options: RefineOptions,
) -> Result<(RefineSummary, Option<String>)> {
    let seed = HistoryEntry::new(
        original.desired_output.as_str(),
        original.context.as_str(),
        original.instruction.as_str(),
        None,
        original.model.as_str(),
    );
    refinement.select_history(&seed).await;

    let mut params = GenerationParams::new(&original.desired_output);
    if !original.context.trim().is_empty() {
        params = params.with_context(&original.context);
    }
    let options = RefineOptions { params, ..options };

    let summary = run_refine(refinement, &options).await?;
    let Some(instruction) = summary.instruction.as_deref() else {
        anyhow::bail!("No instruction was produced");
    };
    if instruction == original.instruction {
        eprintln!("{}", "Instruction unchanged; nothing published.".dimmed());
        return Ok((summary, None));
    }

    let record = build_public_prompt(
        instruction,
        &original.desired_output,
        &original.context,
        &refinement.models().generator,
        author,
        summary.report.as_ref(),
    )?;
    let id = db
        .public_prompts()
        .publish_refinement(&original.id, &record)
        .context("Failed to publish refinement")?;
    eprintln!(
        "{} Published refinement {} of {}",
        "✓".bright_green(),
        id,
        original.id
    );
    Ok((summary, Some(id)))
}

/// Build a public record from the current instruction and its latest report
pub fn build_public_prompt(
    instruction: &str,
    desired_output: &str,
    context: &str,
    model: &str,
    author: &str,
    report: Option<&BatchReport>,
) -> Result<PublicPrompt> {
    let mut prompt = PublicPrompt::new(instruction, desired_output, context, model, author);
    if let Some(report) = report {
        prompt.score = report.average_score();
        prompt.validation_results = serde_json::to_string(&report.results())?;
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloops_client::testing::ScriptedClient;
    use promptloops_client::Credential;
    use promptloops_core::{ModelSelection, TestCaseOutcome};
    use promptloops_critic::{TestCase, ValidationResult};
    use promptloops_logging::Logger;
    use std::sync::Arc;

    #[test]
    fn test_build_public_prompt_carries_score() {
        let case = TestCase::new("p", "e");
        let report = BatchReport::new(
            vec![TestCaseOutcome::completed(
                0,
                ValidationResult::new(&case, "r".into(), "SCORE: 8.5".into()),
            )],
            0.1,
        );

        let prompt =
            build_public_prompt("inst", "out", "", "m", "me", Some(&report)).unwrap();
        assert_eq!(prompt.score, Some(8.5));

        let results: serde_json::Value = serde_json::from_str(&prompt.validation_results).unwrap();
        assert_eq!(results[0]["testPrompt"], "p");
    }

    #[test]
    fn test_show_records_view_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let prompt = build_public_prompt("inst", "out", "", "m", "me", None).unwrap();
        let id = db.public_prompts().publish(&prompt).unwrap();

        handle_public_command(
            &db,
            PublicAction::Show {
                id: id.clone(),
                json: true,
            },
        )
        .unwrap();
        assert_eq!(db.public_prompts().get(&id).unwrap().unwrap().views, 1);

        handle_public_command(&db, PublicAction::Delete { id: id.clone() }).unwrap();
        assert!(handle_public_command(&db, PublicAction::Delete { id }).is_err());
    }

    #[test]
    fn test_listed_prefix_resolves() {
        let db = Database::open_in_memory().unwrap();
        let prompt = build_public_prompt("inst", "out", "", "m", "me", None).unwrap();
        let id = db.public_prompts().publish(&prompt).unwrap();

        handle_public_command(
            &db,
            PublicAction::Show {
                id: id[..8].to_string(),
                json: true,
            },
        )
        .unwrap();
        assert_eq!(db.public_prompts().get(&id).unwrap().unwrap().views, 1);

        handle_public_command(
            &db,
            PublicAction::Delete {
                id: id[..8].to_string(),
            },
        )
        .unwrap();
        assert!(db.public_prompts().get(&id).unwrap().is_none());
    }

    #[test]
    fn test_ambiguous_prefix_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        for suffix in ["1", "2"] {
            let mut prompt = build_public_prompt("inst", "out", "", "m", "me", None).unwrap();
            prompt.id = format!("abc-{}", suffix);
            db.public_prompts().publish(&prompt).unwrap();
        }

        let err = resolve_public(&db, "abc").unwrap_err();
        assert!(err.to_string().contains("matches 2"));
        assert_eq!(resolve_public(&db, "abc-2").unwrap().id, "abc-2");
    }

    #[tokio::test]
    async fn test_refine_public_publishes_refinement() {
        let client = ScriptedClient::routed(|messages| {
            let system = &messages[0].content;
            if system.contains("expert prompt engineer") {
                Ok("improved instruction".to_string())
            } else if system.contains("expert evaluator") {
                let score = if messages[1].content.contains("improved") { 8 } else { 4 };
                Ok(format!("SCORE: {}", score))
            } else {
                Ok("trial output".to_string())
            }
        });
        let db = Database::open_in_memory().unwrap();
        let mut original = PublicPrompt::new("original instruction", "Haiku", "for kids", "m", "a");
        original.score = Some(4.0);
        db.public_prompts().publish(&original).unwrap();

        let refinement = RefinementLoop::new(
            &client,
            &db,
            Arc::new(Logger::quiet()),
            Credential::parse("sk-or-v1-test").unwrap(),
            ModelSelection::default(),
        );
        let options = RefineOptions {
            params: GenerationParams::new("ignored"),
            test_cases: vec![TestCase::new("Write one", "A haiku")],
            mode: RoundMode::Auto,
            max_rounds: Some(2),
            target_score: None,
        };

        let (summary, published) = refine_public(&db, &refinement, &original, "b", options)
            .await
            .unwrap();

        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.previous_score, Some(4.0));
        let refined_id = published.unwrap();
        let refined = db.public_prompts().get(&refined_id).unwrap().unwrap();
        assert_eq!(refined.instruction, "improved instruction");
        assert_eq!(refined.context, "for kids");
        assert_eq!(refined.score, Some(8.0));
        assert_eq!(refined.refined_from.as_deref(), Some(original.id.as_str()));
        assert_eq!(
            db.public_prompts().get(&original.id).unwrap().unwrap().refinements,
            1
        );
    }
}
