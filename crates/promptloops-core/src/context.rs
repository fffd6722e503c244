use serde::Serialize;

use crate::{BatchReport, GenerationParams};

/// Where the refinement loop stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    HasInstruction,
    HasResults,
}

/// The single working instruction and everything derived from it.
///
/// Only the refinement loop writes to this, and only through the methods below,
/// so results never outlive the instruction they were produced for.
#[derive(Debug, Clone, Default)]
pub struct LoopContext {
    instruction: Option<String>,
    report: Option<BatchReport>,
    /// Parameters of the last successful generation
    last_params: Option<GenerationParams>,
    /// Average score before the latest regeneration, for delta display
    previous_score: Option<f64>,
    /// Number of instructions generated so far
    iteration: usize,
}

impl LoopContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        match (&self.instruction, &self.report) {
            (None, _) => LoopState::Idle,
            (Some(_), None) => LoopState::HasInstruction,
            (Some(_), Some(_)) => LoopState::HasResults,
        }
    }

    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    pub fn report(&self) -> Option<&BatchReport> {
        self.report.as_ref()
    }

    pub fn last_params(&self) -> Option<&GenerationParams> {
        self.last_params.as_ref()
    }

    pub fn previous_score(&self) -> Option<f64> {
        self.previous_score
    }

    /// Version of the working instruction; edits keep the number they replace
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn current_score(&self) -> Option<f64> {
        self.report.as_ref().and_then(|r| r.average_score())
    }

    /// A new instruction replaces the old one and drops its results
    pub fn set_instruction(&mut self, instruction: String, params: Option<GenerationParams>) {
        self.instruction = Some(instruction);
        self.report = None;
        if params.is_some() {
            self.last_params = params;
        }
    }

    /// A generated instruction; bumps the version
    pub fn set_generated(&mut self, instruction: String, params: GenerationParams) {
        self.set_instruction(instruction, Some(params));
        self.iteration += 1;
    }

    pub fn set_report(&mut self, report: BatchReport) {
        self.report = Some(report);
    }

    pub fn set_previous_score(&mut self, score: Option<f64>) {
        self.previous_score = score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut context = LoopContext::new();
        assert_eq!(context.state(), LoopState::Idle);

        context.set_instruction("inst".into(), Some(GenerationParams::new("goal")));
        assert_eq!(context.state(), LoopState::HasInstruction);

        context.set_report(BatchReport::new(vec![], 0.0));
        assert_eq!(context.state(), LoopState::HasResults);

        context.set_instruction("edited".into(), None);
        assert_eq!(context.state(), LoopState::HasInstruction);
        assert_eq!(context.instruction(), Some("edited"));
        assert!(context.report().is_none());
        assert_eq!(context.last_params(), Some(&GenerationParams::new("goal")));
    }

    #[test]
    fn test_only_generation_bumps_iteration() {
        let mut context = LoopContext::new();
        assert_eq!(context.iteration(), 0);

        context.set_generated("v1".into(), GenerationParams::new("goal"));
        context.set_instruction("hand edit".into(), None);
        assert_eq!(context.iteration(), 1);

        context.set_generated("v2".into(), GenerationParams::new("goal"));
        assert_eq!(context.iteration(), 2);
        assert_eq!(context.instruction(), Some("v2"));
    }
}
