//! Conversation classifiers for the loop's scripted tests.

pub(crate) use promptloops_client::testing::{user_text, ScriptedClient};
use promptloops_client::{Message, Role};

/// True for the evaluator's critique call
pub(crate) fn is_critique(messages: &[Message]) -> bool {
    user_text(messages).contains("ACTUAL RESPONSE:")
}

/// True for an instruction generation call
pub(crate) fn is_generation(messages: &[Message]) -> bool {
    messages
        .first()
        .map(|m| m.role == Role::System && m.content.contains("expert prompt engineer"))
        .unwrap_or(false)
}
