use crate::GenerationParams;

/// Prompt templates for instruction generation
pub struct GeneratorPrompts;

impl GeneratorPrompts {
    pub fn system_prompt() -> &'static str {
        r#"You are an expert prompt engineer. You write system instructions that make an AI assistant reliably produce a specific kind of output.

Structure every system instruction you write using this framework:

1. **Role & Context**: Who the assistant is, who it serves and in what setting.
2. **Core Directives**: The specific behaviors the assistant must always exhibit.
3. **Output Format**: The exact structure, length and style of the response.
4. **Constraints**: What the assistant must never do, and how to handle edge cases.
5. **Quality Standards**: How a great response differs from an acceptable one.

Write directly to the assistant in the second person. Be concrete; avoid vague adjectives. Include a short example when it removes ambiguity.

Return ONLY the system instruction itself, with no preamble, explanation or closing remarks."#
    }

    /// User message; exactly one of the three feedback modes is used
    pub fn build_user_prompt(params: &GenerationParams) -> String {
        let mut prompt = format!(
            "Create a system instruction for an AI assistant that will produce the following output:\n\nDesired Output: {}\n",
            params.desired_output
        );

        if let Some(context) = params.context() {
            prompt.push_str(&format!("\nAdditional Context: {}\n", context));
        }

        match (params.feedback(), params.seed_instruction()) {
            (Some(feedback), Some(seed)) => {
                prompt.push_str(&format!(
                    r#"
CURRENT SYSTEM PROMPT:
{seed}

FEEDBACK:
{feedback}

Revise the current system prompt to address the feedback. Preserve everything that already works; change only what the feedback shows is missing or wrong. Return the complete revised system instruction."#
                ));
            }
            (Some(feedback), None) => {
                prompt.push_str(&format!(
                    r#"
FEEDBACK:
{feedback}

Generate an improved system instruction that incorporates this feedback and will guide the AI to consistently produce this type of output."#
                ));
            }
            _ => {
                prompt.push_str(
                    "\nGenerate a comprehensive system instruction that will guide the AI to consistently produce this type of output.",
                );
            }
        }

        prompt
    }
}
