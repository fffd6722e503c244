use serde::{Deserialize, Serialize};

use crate::score::parse_score;

/// A prompt to try the candidate instruction on, plus what a good answer looks like
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub test_prompt: String,
    pub expected_behavior: String,
}

impl TestCase {
    pub fn new(test_prompt: impl Into<String>, expected_behavior: impl Into<String>) -> Self {
        Self {
            test_prompt: test_prompt.into(),
            expected_behavior: expected_behavior.into(),
        }
    }
}

/// Outcome of validating one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// What the target model produced under the candidate instruction
    pub response: String,
    /// Raw critique text from the evaluator model
    pub analysis: String,
    pub test_prompt: String,
    pub expected_behavior: String,
}

impl ValidationResult {
    pub fn new(test_case: &TestCase, response: String, analysis: String) -> Self {
        Self {
            response,
            analysis,
            test_prompt: test_case.test_prompt.clone(),
            expected_behavior: test_case.expected_behavior.clone(),
        }
    }

    /// Score parsed from the critique, if the evaluator followed the format
    pub fn score(&self) -> Option<f64> {
        parse_score(&self.analysis)
    }

    pub fn test_case(&self) -> TestCase {
        TestCase::new(&self.test_prompt, &self.expected_behavior)
    }
}
