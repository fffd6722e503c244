//! The interactive generate, validate and refine session.

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Editor, Input, Select};
use serde::Serialize;

use promptloops_core::{BatchReport, GenerationParams, LoopError, RefinementLoop};
use promptloops_critic::TestCase;

use crate::display::{print_instruction, print_report};

/// How each round after validation decides what to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    /// Ask the user
    Interactive,
    /// Always feed the critique back
    Auto,
}

#[derive(Debug, Clone)]
pub struct RefineOptions {
    pub params: GenerationParams,
    pub test_cases: Vec<TestCase>,
    pub mode: RoundMode,
    /// Stop after this many validation rounds
    pub max_rounds: Option<usize>,
    /// Stop once the average reaches this score
    pub target_score: Option<f64>,
}

/// What the session ended with
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineSummary {
    pub instruction: Option<String>,
    pub rounds: usize,
    pub average_score: Option<f64>,
    pub previous_score: Option<f64>,
    pub report: Option<BatchReport>,
}

enum NextStep {
    Critique,
    CustomFeedback(String),
    Edit(String),
    Revalidate,
    Done,
}

pub async fn run_refine(
    refinement: &RefinementLoop<'_>,
    options: &RefineOptions,
) -> Result<RefineSummary> {
    run_rounds(refinement, options, ask_next_step).await
}

/// Validation only runs when the instruction changed or the user asks for it
async fn run_rounds(
    refinement: &RefinementLoop<'_>,
    options: &RefineOptions,
    mut choose: impl FnMut(&str) -> Result<NextStep>,
) -> Result<RefineSummary> {
    // A loop seeded from a stored instruction starts by validating it
    let instruction = match refinement.instruction().await {
        Some(seeded) => seeded,
        None => refinement.generate(options.params.clone()).await?,
    };
    print_instruction(&instruction, refinement.iteration().await);

    let mut rounds = 0;
    let mut needs_validation = true;
    loop {
        if needs_validation {
            needs_validation = false;
            match refinement.validate(&options.test_cases).await {
                Ok(report) => {
                    rounds += 1;
                    print_report(&report, refinement.previous_score().await);
                }
                Err(e) if options.mode == RoundMode::Interactive => print_error(&e),
                Err(e) => return Err(e.into()),
            }

            if options.max_rounds.is_some_and(|max| rounds >= max) {
                eprintln!("{}", format!("Stopping after {} rounds.", rounds).dimmed());
                break;
            }
            if let (Some(target), Some(report)) =
                (options.target_score, refinement.report().await)
            {
                if report.average_score().is_some_and(|avg| avg >= target) {
                    eprintln!(
                        "{} Reached target score {:.1}",
                        "✓".bright_green(),
                        target
                    );
                    break;
                }
            }
        }

        let step = match options.mode {
            RoundMode::Auto => NextStep::Critique,
            RoundMode::Interactive => {
                let current = refinement.instruction().await.unwrap_or_default();
                choose(&current)?
            }
        };

        let regenerated = match step {
            NextStep::Done => break,
            NextStep::Revalidate => {
                needs_validation = true;
                continue;
            }
            NextStep::Edit(text) => {
                refinement.edit_instruction(text).await;
                eprintln!("{} Instruction updated", "✓".bright_green());
                needs_validation = true;
                continue;
            }
            NextStep::Critique => match refinement.critique_feedback().await {
                Some(critique) => refinement.regenerate_with_feedback(&critique).await,
                None if options.mode == RoundMode::Interactive => {
                    eprintln!(
                        "{}",
                        "No validation results to learn from yet.".dimmed()
                    );
                    continue;
                }
                None => {
                    eprintln!(
                        "{}",
                        "No validation results to learn from; stopping.".dimmed()
                    );
                    break;
                }
            },
            NextStep::CustomFeedback(feedback) => {
                refinement.regenerate_with_feedback(&feedback).await
            }
        };

        match regenerated {
            Ok(instruction) => {
                print_instruction(&instruction, refinement.iteration().await);
                needs_validation = true;
            }
            // The instruction is unchanged, so its results still stand
            Err(e) if options.mode == RoundMode::Interactive => print_error(&e),
            Err(e) => return Err(e.into()),
        }
    }

    let report = refinement.report().await;
    Ok(RefineSummary {
        instruction: refinement.instruction().await,
        rounds,
        average_score: report.as_ref().and_then(|r| r.average_score()),
        previous_score: refinement.previous_score().await,
        report,
    })
}

fn ask_next_step(current: &str) -> Result<NextStep> {
    let choices = [
        "Refine using the validation critique",
        "Refine with my own feedback",
        "Edit the instruction by hand",
        "Run validation again",
        "Done",
    ];
    let selection = Select::new()
        .with_prompt("Next step")
        .items(&choices)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => NextStep::Critique,
        1 => {
            let feedback: String = Input::new()
                .with_prompt("Feedback")
                .interact_text()?;
            NextStep::CustomFeedback(feedback)
        }
        2 => match Editor::new().edit(current)? {
            Some(text) if !text.trim().is_empty() => NextStep::Edit(text),
            _ => NextStep::Edit(current.to_string()),
        },
        3 => NextStep::Revalidate,
        _ => NextStep::Done,
    })
}

pub fn print_error(error: &LoopError) {
    eprintln!("{} {}", "✗".bright_red(), error.to_string().bright_red());
    if error.is_transient() {
        eprintln!("{}", "  This may succeed if you try again.".dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloops_client::testing::ScriptedClient;
    use promptloops_client::{ClientError, Credential, Message};
    use promptloops_core::{MemoryStore, ModelSelection};
    use promptloops_logging::Logger;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn is_generation(messages: &[Message]) -> bool {
        messages[0].content.contains("expert prompt engineer")
    }

    fn is_critique(messages: &[Message]) -> bool {
        messages[0].content.contains("expert evaluator")
    }

    /// Scores rise with each generated version
    fn improving_client() -> ScriptedClient {
        let generations = AtomicUsize::new(0);
        ScriptedClient::routed(move |messages| {
            if is_generation(messages) {
                let n = generations.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("version {}", n))
            } else if is_critique(messages) {
                let score = if messages[1].content.contains("version 1") { 5 } else { 8 };
                Ok(format!("SCORE: {}\nINSTRUCTION GAPS: tone", score))
            } else {
                Ok("trial output".to_string())
            }
        })
    }

    fn new_loop<'a>(client: &'a ScriptedClient, store: &'a MemoryStore) -> RefinementLoop<'a> {
        RefinementLoop::new(
            client,
            store,
            Arc::new(Logger::quiet()),
            Credential::parse("sk-or-v1-test").unwrap(),
            ModelSelection::default(),
        )
    }

    fn options(mode: RoundMode, max_rounds: Option<usize>, target_score: Option<f64>) -> RefineOptions {
        RefineOptions {
            params: GenerationParams::new("Write haiku about the ocean"),
            test_cases: vec![TestCase::new("Write one", "5-7-5 haiku")],
            mode,
            max_rounds,
            target_score,
        }
    }

    /// Answers the interactive prompt from a fixed list
    fn scripted_steps(steps: Vec<NextStep>) -> impl FnMut(&str) -> Result<NextStep> {
        let mut steps = VecDeque::from(steps);
        move |_| Ok(steps.pop_front().unwrap_or(NextStep::Done))
    }

    #[tokio::test]
    async fn test_auto_refine_stops_at_target() {
        let client = improving_client();
        let store = MemoryStore::new();
        let refinement = new_loop(&client, &store);

        let summary = run_refine(&refinement, &options(RoundMode::Auto, Some(5), Some(7.5)))
            .await
            .unwrap();

        assert_eq!(summary.instruction.as_deref(), Some("version 2"));
        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.average_score, Some(8.0));
        assert_eq!(summary.previous_score, Some(5.0));
        assert_eq!(store.history().len(), 2);
        assert_eq!(refinement.iteration().await, 2);
    }

    #[tokio::test]
    async fn test_auto_refine_respects_max_rounds() {
        let client = improving_client();
        let store = MemoryStore::new();
        let refinement = new_loop(&client, &store);

        let summary = run_refine(&refinement, &options(RoundMode::Auto, Some(1), None))
            .await
            .unwrap();

        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.instruction.as_deref(), Some("version 1"));
        assert_eq!(summary.average_score, Some(5.0));
    }

    #[tokio::test]
    async fn test_failed_regeneration_does_not_revalidate() {
        let generations = AtomicUsize::new(0);
        let client = ScriptedClient::routed(move |messages| {
            if is_generation(messages) {
                if generations.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok("version 1".to_string())
                } else {
                    Err(ClientError::from_status(429, "Too Many Requests", None))
                }
            } else if is_critique(messages) {
                Ok("SCORE: 6".to_string())
            } else {
                Ok("trial output".to_string())
            }
        });
        let store = MemoryStore::new();
        let refinement = new_loop(&client, &store);

        let summary = run_rounds(
            &refinement,
            &options(RoundMode::Interactive, None, None),
            scripted_steps(vec![NextStep::Critique, NextStep::Done]),
        )
        .await
        .unwrap();

        // generate, trial + critique, failed regeneration
        assert_eq!(client.calls().len(), 4);
        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.instruction.as_deref(), Some("version 1"));
        assert_eq!(summary.average_score, Some(6.0));
    }

    #[tokio::test]
    async fn test_revalidate_and_edit_run_a_new_round() {
        let client = improving_client();
        let store = MemoryStore::new();
        let refinement = new_loop(&client, &store);

        let summary = run_rounds(
            &refinement,
            &options(RoundMode::Interactive, None, None),
            scripted_steps(vec![
                NextStep::Revalidate,
                NextStep::Edit("hand written".to_string()),
                NextStep::Done,
            ]),
        )
        .await
        .unwrap();

        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.instruction.as_deref(), Some("hand written"));
        assert_eq!(summary.average_score, Some(8.0));
        assert_eq!(refinement.iteration().await, 1);
    }
}
