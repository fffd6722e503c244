use promptloops_client::{CompletionClient, Credential, DEFAULT_MODEL};
use promptloops_critic::{ScoreTrend, TestCase};
use promptloops_db::HistoryEntry;
use promptloops_logging::{LogEvent, Logger, Operation};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::batch::validate_batch;
use crate::context::{LoopContext, LoopState};
use crate::error::LoopError;
use crate::generator::{GenerationParams, InstructionGenerator};
use crate::sequence::RequestSequence;
use crate::store::{PromptStore, StoreError};
use crate::BatchReport;

/// Model ids for the two roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub generator: String,
    pub validator: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            generator: DEFAULT_MODEL.to_string(),
            validator: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Owns the working instruction and drives generate, validate and refine.
///
/// Every mutating call draws a ticket before its network work and commits only
/// if no newer call was dispatched in the meantime. The context lock is never
/// held across a network call.
pub struct RefinementLoop<'a> {
    client: &'a dyn CompletionClient,
    store: &'a dyn PromptStore,
    logger: Arc<Logger>,
    models: ModelSelection,
    credential: Credential,
    context: Mutex<LoopContext>,
    sequence: RequestSequence,
}

impl<'a> RefinementLoop<'a> {
    pub fn new(
        client: &'a dyn CompletionClient,
        store: &'a dyn PromptStore,
        logger: Arc<Logger>,
        credential: Credential,
        models: ModelSelection,
    ) -> Self {
        Self {
            client,
            store,
            logger,
            models,
            credential,
            context: Mutex::new(LoopContext::new()),
            sequence: RequestSequence::new(),
        }
    }

    pub fn models(&self) -> &ModelSelection {
        &self.models
    }

    /// Idle (or any state) -> HasInstruction
    pub async fn generate(&self, params: GenerationParams) -> Result<String, LoopError> {
        if params.desired_output.trim().is_empty() {
            return Err(LoopError::MissingDesiredOutput);
        }
        let ticket = self.sequence.next();
        self.run_generation(ticket, params, Operation::Generate, None)
            .await
    }

    /// Revise the current instruction using `feedback`, discarding current results.
    ///
    /// The current average score is kept as `previous_score` for delta display.
    pub async fn regenerate_with_feedback(&self, feedback: &str) -> Result<String, LoopError> {
        // The ticket is drawn while the instruction is read, so an edit can
        // never slip in between the two
        let (ticket, params, previous_score) = {
            let context = self.context.lock().await;
            let instruction = context.instruction().ok_or(LoopError::NoInstruction)?;
            let last_params = context
                .last_params()
                .ok_or(LoopError::NoPreviousGeneration)?;
            (
                self.sequence.next(),
                last_params
                    .fresh()
                    .with_feedback(feedback)
                    .with_seed_instruction(instruction),
                context.current_score(),
            )
        };

        self.logger.log(&LogEvent::FeedbackApplied {
            feedback_preview: feedback.chars().take(100).collect(),
            previous_score,
        });

        self.run_generation(ticket, params, Operation::Regenerate, previous_score)
            .await
    }

    async fn run_generation(
        &self,
        ticket: u64,
        params: GenerationParams,
        operation: Operation,
        previous_score: Option<f64>,
    ) -> Result<String, LoopError> {
        let model = self.models.generator.as_str();
        self.logger.log(&LogEvent::GenerationStarted {
            model: model.to_string(),
            desired_output_preview: params.desired_output.chars().take(100).collect(),
            has_feedback: params.feedback().is_some(),
        });
        let started = Instant::now();

        let instruction = match InstructionGenerator::new(self.client)
            .generate(&params, model, &self.credential)
            .await
        {
            Ok(instruction) => instruction,
            Err(e) => {
                warn!(error = %e, %operation, "Generation failed");
                return Err(e.into());
            }
        };

        {
            let mut context = self.context.lock().await;
            if !self.sequence.is_current(ticket) {
                self.discard(operation, ticket);
                return Err(LoopError::Superseded);
            }
            context.set_generated(instruction.clone(), params.clone());
            context.set_previous_score(previous_score);
        }

        self.logger.log(&LogEvent::GenerationCompleted {
            model: model.to_string(),
            instruction_chars: instruction.chars().count(),
            duration_secs: started.elapsed().as_secs_f64(),
        });

        let entry = HistoryEntry::new(
            params.desired_output.clone(),
            params.context().unwrap_or_default(),
            instruction.clone(),
            params.feedback().map(str::to_string),
            model,
        );
        if let Err(e) = self.store.record_history(&entry) {
            self.storage_failed("record history", e);
        }
        // A key that just worked is remembered for the next session
        if let Err(e) = self.store.save_credential(&self.credential) {
            self.storage_failed("save credential", e);
        }

        Ok(instruction)
    }

    fn storage_failed(&self, action: &str, error: StoreError) {
        warn!(error = %error, "Failed to {}", action);
        self.logger.log(&LogEvent::StorageFailed {
            error: error.to_string(),
        });
    }

    /// HasInstruction -> HasResults.
    ///
    /// Cases run concurrently. A batch where some cases fail still commits;
    /// a batch where every case fails leaves the state untouched.
    pub async fn validate(&self, test_cases: &[TestCase]) -> Result<BatchReport, LoopError> {
        if test_cases.is_empty() {
            return Err(LoopError::NoTestCases);
        }

        let (ticket, instruction) = {
            let context = self.context.lock().await;
            let instruction = context
                .instruction()
                .ok_or(LoopError::NoInstruction)?
                .to_string();
            (self.sequence.next(), instruction)
        };

        let report = validate_batch(
            self.client,
            &instruction,
            test_cases,
            &self.models.validator,
            &self.credential,
            &self.logger,
        )
        .await;

        if report.succeeded() == 0 {
            if let Some(first_error) = report.first_error().cloned() {
                warn!(total = report.total(), error = %first_error, "Every test case failed");
                return Err(LoopError::BatchFailed {
                    failed: report.failed(),
                    total: report.total(),
                    first_error,
                });
            }
        }

        let mut context = self.context.lock().await;
        if !self.sequence.is_current(ticket) {
            self.discard(Operation::Validate, ticket);
            return Err(LoopError::Superseded);
        }
        context.set_report(report.clone());

        info!(
            succeeded = report.succeeded(),
            total = report.total(),
            average = ?report.average_score(),
            "Validation committed"
        );
        Ok(report)
    }

    /// Replace the working instruction by hand; results are cleared and any
    /// in-flight request is superseded.
    pub async fn edit_instruction(&self, instruction: impl Into<String>) {
        let mut context = self.context.lock().await;
        self.sequence.next();
        context.set_instruction(instruction.into(), None);
        debug!("Instruction edited");
    }

    /// Restore an instruction and the inputs that produced it
    pub async fn select_history(&self, entry: &HistoryEntry) {
        let mut params = GenerationParams::new(&entry.desired_output);
        if !entry.context.trim().is_empty() {
            params = params.with_context(&entry.context);
        }
        if let Some(feedback) = &entry.feedback {
            params = params.with_feedback(feedback);
        }

        let mut context = self.context.lock().await;
        self.sequence.next();
        context.set_instruction(entry.instruction.clone(), Some(params));
        context.set_previous_score(None);
        debug!(id = %entry.id, "History entry restored");
    }

    /// Critique of the current results, ready to pass as feedback
    pub async fn critique_feedback(&self) -> Option<String> {
        let context = self.context.lock().await;
        context.report().and_then(build_critique)
    }

    pub async fn state(&self) -> LoopState {
        self.context.lock().await.state()
    }

    pub async fn instruction(&self) -> Option<String> {
        self.context.lock().await.instruction().map(str::to_string)
    }

    pub async fn report(&self) -> Option<BatchReport> {
        self.context.lock().await.report().cloned()
    }

    /// Version number of the working instruction
    pub async fn iteration(&self) -> usize {
        self.context.lock().await.iteration()
    }

    pub async fn previous_score(&self) -> Option<f64> {
        self.context.lock().await.previous_score()
    }

    /// Change in average score since the last regeneration
    pub async fn improvement(&self) -> Option<f64> {
        let context = self.context.lock().await;
        let aggregate = context.report()?.aggregate.as_ref()?;
        aggregate.improvement_over(context.previous_score())
    }

    pub async fn trend(&self) -> Option<ScoreTrend> {
        let context = self.context.lock().await;
        let aggregate = context.report()?.aggregate.as_ref()?;
        Some(aggregate.trend(context.previous_score()))
    }

    pub async fn snapshot(&self) -> LoopContext {
        self.context.lock().await.clone()
    }

    fn discard(&self, operation: Operation, ticket: u64) {
        let latest = self.sequence.latest();
        debug!(%operation, ticket, latest, "Discarding stale response");
        self.logger.log(&LogEvent::StaleResponseDiscarded {
            operation,
            ticket,
            latest,
        });
    }
}

/// Per-test-case scores and analyses, framed as revision feedback
pub fn build_critique(report: &BatchReport) -> Option<String> {
    let results = report.results();
    if results.is_empty() {
        return None;
    }

    let mut critique = match report.average_score() {
        Some(avg) => format!(
            "Validation results: average score {}/10 ({}).\n",
            avg,
            report.summary()
        ),
        None => format!("Validation results ({}).\n", report.summary()),
    };

    for outcome in &report.outcomes {
        let Some(result) = outcome.result() else {
            continue;
        };
        let score = result
            .score()
            .map(|s| format!("score {}/10", s))
            .unwrap_or_else(|| "no score".to_string());
        critique.push_str(&format!(
            "\nTest {} ({})\nPrompt: {}\nExpected: {}\nCritique:\n{}\n",
            outcome.index() + 1,
            score,
            result.test_prompt,
            result.expected_behavior,
            result.analysis.trim()
        ));
    }

    critique.push_str(
        "\nAddress the instruction gaps and concrete improvements above, starting with the lowest-scoring tests.",
    );
    Some(critique)
}
