use promptloops_client::{ClientError, CredentialError};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("No system instruction yet. Generate or enter one first.")]
    NoInstruction,

    #[error("Nothing to regenerate. Generate an instruction first.")]
    NoPreviousGeneration,

    #[error("Desired output is required.")]
    MissingDesiredOutput,

    #[error("Add at least one test case.")]
    NoTestCases,

    #[error("All {failed} of {total} test cases failed: {first_error}")]
    BatchFailed {
        failed: usize,
        total: usize,
        first_error: ClientError,
    },

    #[error("Discarded a stale response; a newer request superseded it")]
    Superseded,
}

impl LoopError {
    /// True when re-triggering the same action may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LoopError::Client(e) | LoopError::BatchFailed { first_error: e, .. } => match e {
                ClientError::RequestFailed { status, .. } => *status == 429 || *status >= 500,
                ClientError::Network(_) | ClientError::EmptyCompletion => true,
                ClientError::InvalidRequest(_) => false,
            },
            LoopError::Superseded => true,
            _ => false,
        }
    }
}
