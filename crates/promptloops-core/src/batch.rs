use futures::future::join_all;
use promptloops_client::{CompletionClient, Credential};
use promptloops_critic::{InstructionValidator, TestCase};
use promptloops_logging::{LogEvent, Logger};
use std::time::Instant;
use tracing::warn;

use crate::{BatchReport, TestCaseOutcome};

/// Validate every test case concurrently and collect per-case outcomes.
///
/// One failing case does not stop the others; outcomes keep test-case order.
pub async fn validate_batch(
    client: &dyn CompletionClient,
    instruction: &str,
    test_cases: &[TestCase],
    model: &str,
    credential: &Credential,
    logger: &Logger,
) -> BatchReport {
    let started = Instant::now();
    let validator = InstructionValidator::new(client);

    logger.log(&LogEvent::ValidationStarted {
        model: model.to_string(),
        cases: test_cases.len(),
    });

    let validator = &validator;
    let runs = test_cases.iter().enumerate().map(|(index, test_case)| async move {
        let outcome = validator
            .validate(instruction, test_case, model, credential)
            .await;
        (index, outcome)
    });

    let outcomes = join_all(runs)
        .await
        .into_iter()
        .map(|(index, outcome)| match outcome {
            Ok(result) => {
                logger.log(&LogEvent::TestCaseCompleted {
                    index,
                    score: result.score(),
                });
                TestCaseOutcome::completed(index, result)
            }
            Err(error) => {
                warn!(index, error = %error, "Test case failed");
                logger.log(&LogEvent::TestCaseFailed {
                    index,
                    error: error.to_string(),
                });
                TestCaseOutcome::failed(index, &test_cases[index], error)
            }
        })
        .collect();

    let report = BatchReport::new(outcomes, started.elapsed().as_secs_f64());

    logger.log(&LogEvent::BatchCompleted {
        succeeded: report.succeeded(),
        total: report.total(),
        average_score: report.average_score(),
        pass_rate: report.aggregate.as_ref().map(|a| a.pass_rate),
        duration_secs: report.duration_secs,
    });

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{is_critique, user_text, ScriptedClient};
    use promptloops_client::ClientError;
    use std::time::Duration;

    fn credential() -> Credential {
        Credential::parse("sk-or-v1-test").unwrap()
    }

    fn cases() -> Vec<TestCase> {
        vec![
            TestCase::new("case A", "a"),
            TestCase::new("case B", "b"),
            TestCase::new("case C", "c"),
        ]
    }

    #[tokio::test]
    async fn test_scores_pair_with_their_test_case() {
        // Earlier cases answer later, so arrival order is reversed
        let client = ScriptedClient::routed(|messages| {
            let text = user_text(messages);
            if is_critique(messages) {
                let score = if text.contains("case A") {
                    9
                } else if text.contains("case B") {
                    7
                } else {
                    3
                };
                Ok(format!("SCORE: {}\nCOMPLIANCE ANALYSIS: ok", score))
            } else {
                Ok(format!("response to {}", text))
            }
        })
        .with_delay(|messages| {
            let text = user_text(messages);
            if text.contains("case A") {
                Some(Duration::from_millis(60))
            } else if text.contains("case B") {
                Some(Duration::from_millis(30))
            } else {
                None
            }
        });

        let report = validate_batch(
            &client,
            "inst",
            &cases(),
            "m",
            &credential(),
            &Logger::quiet(),
        )
        .await;

        let results = report.results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].test_prompt, "case A");
        assert_eq!(results[0].response, "response to case A");
        assert_eq!(results[0].score(), Some(9.0));
        assert_eq!(results[1].score(), Some(7.0));
        assert_eq!(results[2].score(), Some(3.0));

        let aggregate = report.aggregate.unwrap();
        assert_eq!(aggregate.average_score, 6.3);
        assert_eq!(aggregate.min_score, 3.0);
        assert_eq!(aggregate.max_score, 9.0);
        assert!((aggregate.pass_rate - 66.666).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_others() {
        let client = ScriptedClient::routed(|messages| {
            let text = user_text(messages);
            if text.contains("case B") {
                Err(ClientError::from_status(429, "Too Many Requests", None))
            } else if is_critique(messages) {
                Ok("SCORE: 8".to_string())
            } else {
                Ok("fine".to_string())
            }
        });

        let report = validate_batch(
            &client,
            "inst",
            &cases(),
            "m",
            &credential(),
            &Logger::quiet(),
        )
        .await;

        assert_eq!(report.summary(), "2 of 3 succeeded");
        assert!(report.outcomes[1].error().is_some());
        assert_eq!(report.outcomes[1].index(), 1);
        assert_eq!(report.average_score(), Some(8.0));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let client = ScriptedClient::new(vec![]);
        let report =
            validate_batch(&client, "inst", &[], "m", &credential(), &Logger::quiet()).await;
        assert_eq!(report.total(), 0);
        assert!(report.aggregate.is_none());
        assert!(client.calls().is_empty());
    }
}
