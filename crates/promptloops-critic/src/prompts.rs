/// Prompt templates for the evaluator
pub struct EvaluatorPrompts;

impl EvaluatorPrompts {
    /// System message defining the rubric and the required critique layout
    pub fn system_prompt() -> &'static str {
        r#"You are an expert evaluator of AI system instructions. You judge how well a response produced under a given system instruction meets the expected behavior, and you diagnose what in the instruction caused any shortfall.

## Scoring Rubric

Score the response from 1 to 10 using these weighted criteria:

1. **Instruction Following (35%)**: Did the response obey every directive in the system instruction?
2. **Expected Behavior Match (35%)**: Does the response deliver what the expected behavior describes?
3. **Quality & Usability (20%)**: Is the response accurate, clear and useful as-is?
4. **Format Compliance (10%)**: Does the response follow the requested structure, length and style?

## Required Response Format

Respond using exactly this structure:

SCORE: [number from 1 to 10, decimals allowed]

COMPLIANCE ANALYSIS:
[Which directives were followed and which were not, with evidence from the response]

INSTRUCTION GAPS:
[What the system instruction failed to specify that led to the observed problems]

CONCRETE IMPROVEMENTS:
[Specific, actionable changes to the system instruction, as a numbered list]

ROOT CAUSE:
[The single most important reason the response fell short]

REVISED INSTRUCTION SNIPPET:
[Replacement or additional instruction text that fixes the main gap]

PRIORITY: [HIGH | MEDIUM | LOW]

TESTING RECOMMENDATION:
[A follow-up test prompt that would confirm the fix]

Be rigorous. Only give 9 or 10 when the response fully meets the expected behavior with no meaningful gaps."#
    }

    /// User message embedding everything the evaluator needs, verbatim
    pub fn build_evaluation_prompt(
        system_instruction: &str,
        test_prompt: &str,
        expected_behavior: &str,
        actual_response: &str,
    ) -> String {
        format!(
            r#"Evaluate the following AI response.

SYSTEM INSTRUCTION USED:
{instruction}

TEST PROMPT:
{prompt}

EXPECTED BEHAVIOR:
{expected}

ACTUAL RESPONSE:
{response}

Analyze how well the response matches the expected behavior and how the system instruction should change. Start your answer with the SCORE line."#,
            instruction = system_instruction,
            prompt = test_prompt,
            expected = expected_behavior,
            response = actual_response,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_defines_rubric_and_template() {
        let prompt = EvaluatorPrompts::system_prompt();
        for needle in [
            "Instruction Following (35%)",
            "Expected Behavior Match (35%)",
            "Quality & Usability (20%)",
            "Format Compliance (10%)",
            "SCORE:",
            "COMPLIANCE ANALYSIS:",
            "INSTRUCTION GAPS:",
            "CONCRETE IMPROVEMENTS:",
            "ROOT CAUSE:",
            "REVISED INSTRUCTION SNIPPET:",
            "PRIORITY:",
            "TESTING RECOMMENDATION:",
        ] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn test_evaluation_prompt_embeds_inputs_verbatim() {
        let prompt = EvaluatorPrompts::build_evaluation_prompt(
            "You are a poet.\n{braces stay}",
            "Write one",
            "5-7-5 syllable haiku about the sea",
            "Salt wind on the dunes",
        );
        assert!(prompt.contains("You are a poet.\n{braces stay}"));
        assert!(prompt.contains("TEST PROMPT:\nWrite one"));
        assert!(prompt.contains("EXPECTED BEHAVIOR:\n5-7-5 syllable haiku about the sea"));
        assert!(prompt.contains("ACTUAL RESPONSE:\nSalt wind on the dunes"));
    }
}
