use promptloops_client::{ClientError, CompletionClient, CompletionRequest, Credential, Message};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::prompts::GeneratorPrompts;

/// Token budget for generation; structured instructions run long
pub const GENERATION_MAX_TOKENS: u32 = 3000;

/// Inputs for one generation call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub desired_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Critique carried forward from a previous round
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Prior instruction to revise instead of starting fresh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_instruction: Option<String>,
}

impl GenerationParams {
    pub fn new(desired_output: impl Into<String>) -> Self {
        Self {
            desired_output: desired_output.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn with_seed_instruction(mut self, seed: impl Into<String>) -> Self {
        self.seed_instruction = Some(seed.into());
        self
    }

    pub fn context(&self) -> Option<&str> {
        non_blank(&self.context)
    }

    pub fn feedback(&self) -> Option<&str> {
        non_blank(&self.feedback)
    }

    pub fn seed_instruction(&self) -> Option<&str> {
        non_blank(&self.seed_instruction)
    }

    /// Same goal and context, no feedback or seed
    pub fn fresh(&self) -> Self {
        Self {
            desired_output: self.desired_output.clone(),
            context: self.context.clone(),
            feedback: None,
            seed_instruction: None,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Asks the generator model to write a system instruction
pub struct InstructionGenerator<'a> {
    client: &'a dyn CompletionClient,
}

impl<'a> InstructionGenerator<'a> {
    pub fn new(client: &'a dyn CompletionClient) -> Self {
        Self { client }
    }

    /// Returns the model's text verbatim as the new candidate instruction
    pub async fn generate(
        &self,
        params: &GenerationParams,
        model: &str,
        credential: &Credential,
    ) -> Result<String, ClientError> {
        let messages = Self::build_messages(params);

        debug!(
            model,
            has_feedback = params.feedback().is_some(),
            has_seed = params.seed_instruction().is_some(),
            "Requesting instruction"
        );

        let instruction = self
            .client
            .complete(
                CompletionRequest::new(model, &messages, credential)
                    .with_max_tokens(GENERATION_MAX_TOKENS),
            )
            .await?;

        info!(model, chars = instruction.len(), "Instruction generated");
        Ok(instruction)
    }

    pub fn build_messages(params: &GenerationParams) -> Vec<Message> {
        vec![
            Message::system(GeneratorPrompts::system_prompt()),
            Message::user(GeneratorPrompts::build_user_prompt(params)),
        ]
    }
}
