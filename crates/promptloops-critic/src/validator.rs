use promptloops_client::{ClientError, CompletionClient, CompletionRequest, Credential, Message};
use tracing::{debug, info};

use crate::{EvaluatorPrompts, TestCase, ValidationResult};

/// Runs a candidate instruction against a test case and has the evaluator critique it
pub struct InstructionValidator<'a> {
    client: &'a dyn CompletionClient,
}

impl<'a> InstructionValidator<'a> {
    pub fn new(client: &'a dyn CompletionClient) -> Self {
        Self { client }
    }

    /// Trial the instruction, then critique the trial response
    pub async fn validate(
        &self,
        candidate_instruction: &str,
        test_case: &TestCase,
        model: &str,
        credential: &Credential,
    ) -> Result<ValidationResult, ClientError> {
        let trial_messages = vec![
            Message::system(candidate_instruction),
            Message::user(&test_case.test_prompt),
        ];

        debug!(
            model,
            prompt_len = test_case.test_prompt.len(),
            "Running trial completion"
        );

        let response = self
            .client
            .complete(CompletionRequest::new(model, &trial_messages, credential))
            .await?;

        let critique_messages = vec![
            Message::system(EvaluatorPrompts::system_prompt()),
            Message::user(EvaluatorPrompts::build_evaluation_prompt(
                candidate_instruction,
                &test_case.test_prompt,
                &test_case.expected_behavior,
                &response,
            )),
        ];

        let analysis = self
            .client
            .complete(CompletionRequest::new(model, &critique_messages, credential))
            .await?;

        let result = ValidationResult::new(test_case, response, analysis);

        info!(
            model,
            score = ?result.score(),
            "Validation completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloops_client::testing::ScriptedClient;

    fn credential() -> Credential {
        Credential::parse("sk-or-v1-test").unwrap()
    }

    #[tokio::test]
    async fn test_validate_runs_trial_then_critique() {
        let client = ScriptedClient::new(vec![
            Ok("Tide pulls at the moon".into()),
            Ok("SCORE: 8\nCOMPLIANCE ANALYSIS: good".into()),
        ]);
        let validator = InstructionValidator::new(&client);
        let case = TestCase::new("Write one", "5-7-5 syllable haiku about the sea");

        let result = validator
            .validate("You write haiku.", &case, "m", &credential())
            .await
            .unwrap();

        assert_eq!(result.response, "Tide pulls at the moon");
        assert!(result.analysis.contains("SCORE:"));
        assert_eq!(result.score(), Some(8.0));
        assert_eq!(result.test_prompt, case.test_prompt);
        assert_eq!(result.expected_behavior, case.expected_behavior);

        let seen: Vec<Vec<Message>> = client.calls().into_iter().map(|c| c.messages).collect();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            vec![Message::system("You write haiku."), Message::user("Write one")]
        );
        assert_eq!(seen[1][0].content, EvaluatorPrompts::system_prompt());
        assert!(seen[1][1].content.contains("Tide pulls at the moon"));
        assert!(seen[1][1].content.contains("5-7-5 syllable haiku about the sea"));
    }

    #[tokio::test]
    async fn test_critique_without_score_degrades_gracefully() {
        let client = ScriptedClient::new(vec![
            Ok("answer".into()),
            Ok("Looks fine to me, nothing to add.".into()),
        ]);
        let validator = InstructionValidator::new(&client);
        let case = TestCase::new("q", "e");

        let result = validator
            .validate("inst", &case, "m", &credential())
            .await
            .unwrap();
        assert_eq!(result.analysis, "Looks fine to me, nothing to add.");
        assert_eq!(result.score(), None);
    }

    #[tokio::test]
    async fn test_trial_failure_skips_critique() {
        let client = ScriptedClient::new(vec![Err(ClientError::from_status(429, "", None))]);
        let validator = InstructionValidator::new(&client);
        let case = TestCase::new("q", "e");

        let err = validator
            .validate("inst", &case, "m", &credential())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(client.calls().len(), 1);
    }
}
