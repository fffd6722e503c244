//! # promptloops-core
//!
//! The generate, validate, aggregate and refine loop.
//!
//! [`RefinementLoop`] owns a single working instruction. It asks the
//! [`InstructionGenerator`] for an instruction, validates it against a batch
//! of test cases concurrently, aggregates the parsed scores, and feeds the
//! critique back into the next generation.

mod batch;
mod context;
mod error;
mod export;
mod generator;
mod outcome;
mod prompts;
mod refinement;
mod sequence;
mod store;

#[cfg(test)]
mod testing;

pub use batch::validate_batch;
pub use context::{LoopContext, LoopState};
pub use error::LoopError;
pub use export::{ExportDocument, ExportFormat};
pub use generator::{GenerationParams, InstructionGenerator, GENERATION_MAX_TOKENS};
pub use outcome::{BatchReport, TestCaseOutcome};
pub use prompts::GeneratorPrompts;
pub use refinement::{build_critique, ModelSelection, RefinementLoop};
pub use sequence::RequestSequence;
pub use store::{resolve_credential, MemoryStore, PromptStore, StoreError};
