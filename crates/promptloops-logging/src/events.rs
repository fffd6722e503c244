use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Which operation a stale response belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Generate,
    Validate,
    Regenerate,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Generate => write!(f, "generate"),
            Operation::Validate => write!(f, "validate"),
            Operation::Regenerate => write!(f, "regenerate"),
        }
    }
}

/// Structured log events for the refinement loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    GenerationStarted {
        model: String,
        desired_output_preview: String,
        has_feedback: bool,
    },
    GenerationCompleted {
        model: String,
        instruction_chars: usize,
        duration_secs: f64,
    },
    ValidationStarted {
        model: String,
        cases: usize,
    },
    TestCaseCompleted {
        index: usize,
        score: Option<f64>,
    },
    TestCaseFailed {
        index: usize,
        error: String,
    },
    BatchCompleted {
        succeeded: usize,
        total: usize,
        average_score: Option<f64>,
        pass_rate: Option<f64>,
        duration_secs: f64,
    },
    FeedbackApplied {
        feedback_preview: String,
        previous_score: Option<f64>,
    },
    StaleResponseDiscarded {
        operation: Operation,
        ticket: u64,
        latest: u64,
    },
    StorageFailed {
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for promptloops events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
    quiet: bool,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
            quiet: false,
        }
    }

    /// A logger that writes nothing to the console (file mirror still applies)
    pub fn quiet() -> Self {
        Self {
            format: LogFormat::Compact,
            file_writer: None,
            quiet: true,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
            quiet: false,
        })
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if self.quiet {
            return;
        }

        let mut stderr = std::io::stderr();
        match self.format {
            LogFormat::Json => {
                if let Ok(json) = serde_json::to_string(event) {
                    let _ = writeln!(stderr, "{}", json);
                }
            }
            LogFormat::Pretty => {
                for line in Self::render_pretty(event) {
                    let _ = writeln!(stderr, "{}", line);
                }
            }
            LogFormat::Compact => {
                let timestamp = chrono::Utc::now().format("%H:%M:%S");
                let _ = writeln!(stderr, "[{}] {}", timestamp, Self::render_compact(event));
            }
        }
    }

    fn render_pretty(event: &LogEvent) -> Vec<String> {
        match event {
            LogEvent::GenerationStarted {
                model,
                desired_output_preview,
                has_feedback,
            } => {
                let label = if *has_feedback {
                    "REGENERATE"
                } else {
                    "GENERATE"
                };
                vec![
                    String::new(),
                    format!(
                        "  {} {} {}",
                        "▶".bright_cyan(),
                        label.bright_cyan().bold(),
                        model.dimmed()
                    ),
                    format!(
                        "    {} {}",
                        "Goal:".dimmed(),
                        Self::truncate(desired_output_preview, 60).dimmed()
                    ),
                ]
            }
            LogEvent::GenerationCompleted {
                instruction_chars,
                duration_secs,
                ..
            } => vec![format!(
                "    {} {} chars ({:.1}s)",
                "✓".bright_green(),
                instruction_chars,
                duration_secs
            )],
            LogEvent::ValidationStarted { model, cases } => vec![
                String::new(),
                format!(
                    "  {} {} {} {} {}",
                    "▶".bright_magenta(),
                    "VALIDATE".bright_magenta().bold(),
                    cases,
                    if *cases == 1 { "case" } else { "cases" },
                    model.dimmed()
                ),
            ],
            LogEvent::TestCaseCompleted { index, score } => {
                let score = match score {
                    Some(s) if *s >= 7.0 => format!("{:.1}/10", s).bright_green().to_string(),
                    Some(s) if *s >= 5.0 => format!("{:.1}/10", s).bright_yellow().to_string(),
                    Some(s) => format!("{:.1}/10", s).bright_red().to_string(),
                    None => "no score".dimmed().to_string(),
                };
                vec![format!("    {} Test {}: {}", "│".dimmed(), index + 1, score)]
            }
            LogEvent::TestCaseFailed { index, error } => vec![format!(
                "    {} Test {}: {}",
                "✗".bright_red(),
                index + 1,
                error.bright_red()
            )],
            LogEvent::BatchCompleted {
                succeeded,
                total,
                average_score,
                pass_rate,
                duration_secs,
            } => {
                let summary = match (average_score, pass_rate) {
                    (Some(avg), Some(rate)) => {
                        format!("avg {:.1}/10, pass rate {:.0}%", avg, rate)
                    }
                    _ => "no scores parsed".to_string(),
                };
                vec![
                    format!(
                        "    {} {} of {} succeeded, {} ({:.1}s)",
                        if succeeded == total {
                            "✓".bright_green()
                        } else {
                            "⚠".bright_yellow()
                        },
                        succeeded,
                        total,
                        summary,
                        duration_secs
                    ),
                    String::new(),
                ]
            }
            LogEvent::FeedbackApplied {
                feedback_preview,
                previous_score,
            } => {
                let mut lines = vec![format!(
                    "    {} {} {}",
                    "→".bright_yellow(),
                    "Feedback:".bright_yellow(),
                    Self::truncate(feedback_preview, 60)
                )];
                if let Some(prev) = previous_score {
                    lines.push(format!("    {} previous score {:.1}/10", "│".dimmed(), prev));
                }
                lines
            }
            LogEvent::StaleResponseDiscarded {
                operation,
                ticket,
                latest,
            } => vec![format!(
                "    {} {}",
                "↷".dimmed(),
                format!(
                    "discarded stale {} response (#{}, latest #{})",
                    operation, ticket, latest
                )
                .dimmed()
            )],
            LogEvent::StorageFailed { error } => vec![format!(
                "{} Storage error: {}",
                "⚠".bright_yellow(),
                error
            )],
        }
    }

    fn render_compact(event: &LogEvent) -> String {
        match event {
            LogEvent::GenerationStarted {
                model,
                has_feedback,
                ..
            } => format!("generate:start {} feedback={}", model, has_feedback),
            LogEvent::GenerationCompleted {
                instruction_chars,
                duration_secs,
                ..
            } => format!(
                "generate:done {}c {:.1}s",
                instruction_chars, duration_secs
            ),
            LogEvent::ValidationStarted { cases, .. } => format!("validate:start {}", cases),
            LogEvent::TestCaseCompleted { index, score } => match score {
                Some(s) => format!("case:{} score={:.1}", index + 1, s),
                None => format!("case:{} score=none", index + 1),
            },
            LogEvent::TestCaseFailed { index, error } => {
                format!("case:{} error:{}", index + 1, error)
            }
            LogEvent::BatchCompleted {
                succeeded,
                total,
                average_score,
                duration_secs,
                ..
            } => format!(
                "validate:done {}/{} avg={} {:.1}s",
                succeeded,
                total,
                average_score
                    .map(|a| format!("{:.1}", a))
                    .unwrap_or_else(|| "none".to_string()),
                duration_secs
            ),
            LogEvent::FeedbackApplied { previous_score, .. } => format!(
                "feedback prev={}",
                previous_score
                    .map(|a| format!("{:.1}", a))
                    .unwrap_or_else(|| "none".to_string())
            ),
            LogEvent::StaleResponseDiscarded {
                operation,
                ticket,
                latest,
            } => format!("stale:{} #{} latest=#{}", operation, ticket, latest),
            LogEvent::StorageFailed { error } => format!("storage:error {}", error),
        }
    }

    /// Truncate on a char boundary
    fn truncate(s: &str, max_chars: usize) -> String {
        let flat = s.replace('\n', " ");
        if flat.chars().count() > max_chars {
            let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", cut)
        } else {
            flat
        }
    }
}
