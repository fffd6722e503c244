use chrono::{DateTime, SecondsFormat, Utc};
use promptloops_critic::ValidationResult;
use serde::Serialize;

/// Output format for an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

/// A shareable snapshot of an instruction and how it validated
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub system_instruction: String,
    pub desired_output: String,
    pub context: String,
    pub model: String,
    pub validation_results: Vec<ValidationResult>,
    pub exported_at: DateTime<Utc>,
}

impl ExportDocument {
    pub fn new(
        system_instruction: impl Into<String>,
        desired_output: impl Into<String>,
        context: impl Into<String>,
        model: impl Into<String>,
        validation_results: Vec<ValidationResult>,
    ) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            desired_output: desired_output.into(),
            context: context.into(),
            model: model.into(),
            validation_results,
            exported_at: Utc::now(),
        }
    }

    /// Mean of every parsed score, zeros included
    pub fn average_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .validation_results
            .iter()
            .filter_map(|r| r.score())
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }

    pub fn render(&self, format: ExportFormat) -> Result<String, serde_json::Error> {
        match format {
            ExportFormat::Markdown => Ok(self.to_markdown()),
            ExportFormat::Json => self.to_json(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::from("# AI Prompt Builder Export\n\n");
        md.push_str(&format!(
            "**Exported at:** {}\n\n",
            self.exported_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));

        if !self.system_instruction.is_empty() {
            md.push_str(&format!(
                "## System Instruction\n\n```\n{}\n```\n\n",
                self.system_instruction
            ));
        }
        if !self.desired_output.is_empty() {
            md.push_str(&format!("## Desired Output\n\n{}\n\n", self.desired_output));
        }
        if !self.context.is_empty() {
            md.push_str(&format!("## Additional Context\n\n{}\n\n", self.context));
        }
        if !self.model.is_empty() {
            md.push_str(&format!("## Model Used\n\n{}\n\n", self.model));
        }

        if self.validation_results.is_empty() {
            return md;
        }

        md.push_str("## Validation Results\n\n");
        if let Some(avg) = self.average_score() {
            md.push_str(&format!("**Average Score:** {:.1}/10\n\n", avg));
        }

        for (index, result) in self.validation_results.iter().enumerate() {
            md.push_str(&format!("### Test {}\n\n", index + 1));
            if !result.test_prompt.is_empty() {
                md.push_str(&format!("**Test Prompt:**\n{}\n\n", result.test_prompt));
            }
            if !result.expected_behavior.is_empty() {
                md.push_str(&format!(
                    "**Expected Behavior:**\n{}\n\n",
                    result.expected_behavior
                ));
            }
            if !result.response.is_empty() {
                md.push_str(&format!("**AI Response:**\n```\n{}\n```\n\n", result.response));
            }
            if !result.analysis.is_empty() {
                md.push_str(&format!("**Analysis:**\n```\n{}\n```\n\n", result.analysis));
            }
            md.push_str("---\n\n");
        }

        md
    }
}
