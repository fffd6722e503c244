use promptloops_client::ClientError;
use promptloops_critic::{aggregate, AggregateScore, TestCase, ValidationResult};
use serde::{Serialize, Serializer};

/// Result of validating one test case within a batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestCaseOutcome {
    Completed {
        index: usize,
        #[serde(flatten)]
        result: ValidationResult,
        score: Option<f64>,
    },
    Failed {
        index: usize,
        #[serde(flatten)]
        test_case: TestCase,
        #[serde(serialize_with = "as_display")]
        error: ClientError,
    },
}

fn as_display<S: Serializer>(error: &ClientError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl TestCaseOutcome {
    pub fn completed(index: usize, result: ValidationResult) -> Self {
        let score = result.score();
        Self::Completed {
            index,
            result,
            score,
        }
    }

    pub fn failed(index: usize, test_case: &TestCase, error: ClientError) -> Self {
        Self::Failed {
            index,
            test_case: test_case.clone(),
            error,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Completed { index, .. } | Self::Failed { index, .. } => *index,
        }
    }

    pub fn result(&self) -> Option<&ValidationResult> {
        match self {
            Self::Completed { result, .. } => Some(result),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Completed { .. } => None,
        }
    }
}

/// Outcomes of a batch in test-case order, plus the aggregate over those that completed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub outcomes: Vec<TestCaseOutcome>,
    pub aggregate: Option<AggregateScore>,
    pub duration_secs: f64,
}

impl BatchReport {
    pub fn new(mut outcomes: Vec<TestCaseOutcome>, duration_secs: f64) -> Self {
        outcomes.sort_by_key(|o| o.index());
        let aggregate = aggregate(
            outcomes
                .iter()
                .filter_map(|o| o.result())
                .map(|r| r.score().unwrap_or(0.0)),
        );
        Self {
            outcomes,
            aggregate,
            duration_secs,
        }
    }

    /// Completed results in test-case order
    pub fn results(&self) -> Vec<&ValidationResult> {
        self.outcomes.iter().filter_map(|o| o.result()).collect()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result().is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn is_partial(&self) -> bool {
        self.failed() > 0 && self.succeeded() > 0
    }

    pub fn first_error(&self) -> Option<&ClientError> {
        self.outcomes.iter().find_map(|o| o.error())
    }

    pub fn average_score(&self) -> Option<f64> {
        self.aggregate.as_ref().map(|a| a.average_score)
    }

    /// "2 of 3 succeeded"
    pub fn summary(&self) -> String {
        format!("{} of {} succeeded", self.succeeded(), self.total())
    }
}
