pub mod import;
mod prompts;
mod score;
mod stats;
mod testcase;
pub mod validator;

pub use import::ImportError;
pub use prompts::EvaluatorPrompts;
pub use score::{parse_score, parse_score_or_zero};
pub use stats::{aggregate, AggregateScore, ScoreBand, ScoreTrend, PASS_THRESHOLD};
pub use testcase::{TestCase, ValidationResult};
pub use validator::InstructionValidator;
