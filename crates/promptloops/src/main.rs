mod config;
mod display;
mod history;
mod key;
mod public;
mod refine;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use promptloops_client::{fetch_catalog, OpenRouterClient};
use promptloops_core::{
    resolve_credential, ExportDocument, ExportFormat, GenerationParams, LoopError,
    RefinementLoop,
};
use promptloops_critic::{import, TestCase};
use promptloops_db::Database;
use promptloops_logging::{init_tracing, LogFormat, Logger};

use config::ProjectConfig;
use history::HistoryAction;
use key::KeyAction;
use public::PublicAction;
use refine::{RefineOptions, RoundMode};

#[derive(Parser, Debug)]
#[command(
    name = "promptloops",
    about = "Generate, validate and refine LLM system instructions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenRouter API key (falls back to the stored key)
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Model for both roles
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Model used to generate instructions
    #[arg(long, global = true)]
    generator_model: Option<String>,

    /// Model used to run and critique test prompts
    #[arg(long, global = true)]
    validator_model: Option<String>,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Also append events as JSON lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Tracing level when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Output the final result as JSON
    #[arg(long, global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a system instruction for a desired output
    Generate {
        #[command(flatten)]
        goal: GoalArgs,

        /// Feedback to steer the generation
        #[arg(long)]
        feedback: Option<String>,

        /// Existing instruction to revise (file path)
        #[arg(long)]
        seed_file: Option<PathBuf>,
    },

    /// Validate an instruction against test cases
    Validate {
        /// File holding the instruction to test
        #[arg(short, long)]
        instruction_file: PathBuf,

        #[command(flatten)]
        cases: CaseArgs,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// Generate, validate and refine until satisfied
    Refine {
        #[command(flatten)]
        goal: GoalArgs,

        #[command(flatten)]
        cases: CaseArgs,

        /// Feed the critique back automatically instead of asking
        #[arg(long)]
        auto: bool,

        /// Stop after this many validation rounds
        #[arg(short = 'n', long)]
        max_rounds: Option<usize>,

        /// Stop once the average score reaches this value
        #[arg(long)]
        target: Option<f64>,

        /// Publish the final instruction to the shared catalog under this author name
        #[arg(long)]
        publish: Option<String>,

        #[command(flatten)]
        export: ExportArgs,
    },

    /// List selectable models
    Models,

    /// Browse generation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Export a history entry
    Export {
        /// Entry ID (launches interactive picker if omitted)
        id: Option<String>,

        #[arg(long, value_enum, default_value = "markdown")]
        format: ExportFormatChoice,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Browse the shared catalog of published instructions
    Public {
        #[command(subcommand)]
        action: PublicAction,
    },
}

#[derive(clap::Args, Debug)]
struct GoalArgs {
    /// What the instructed assistant should produce
    #[arg(short = 'o', long)]
    desired_output: String,

    /// Additional context about audience or constraints
    #[arg(short, long)]
    context: Option<String>,
}

impl GoalArgs {
    fn params(&self) -> GenerationParams {
        let mut params = GenerationParams::new(&self.desired_output);
        if let Some(context) = &self.context {
            params = params.with_context(context);
        }
        params
    }
}

#[derive(clap::Args, Debug)]
pub(crate) struct CaseArgs {
    /// CSV or JSON file of test cases
    #[arg(long)]
    cases: Option<PathBuf>,

    /// A single test prompt
    #[arg(short, long, requires = "expect")]
    prompt: Option<String>,

    /// Expected behavior for --prompt
    #[arg(short, long, requires = "prompt")]
    expect: Option<String>,
}

impl CaseArgs {
    pub(crate) fn load(&self, working_dir: &Path) -> Result<Vec<TestCase>> {
        let mut cases = Vec::new();
        if let Some(path) = &self.cases {
            let path = resolve_path(working_dir, path);
            cases.extend(
                import::parse_file(&path)
                    .with_context(|| format!("Failed to import {}", path.display()))?,
            );
        }
        if let (Some(prompt), Some(expect)) = (&self.prompt, &self.expect) {
            cases.push(TestCase::new(prompt, expect));
        }
        if cases.is_empty() {
            anyhow::bail!("No test cases. Use --cases <file> or --prompt/--expect");
        }
        Ok(cases)
    }
}

#[derive(clap::Args, Debug)]
struct ExportArgs {
    /// Export the result to this file (.md or .json)
    #[arg(long)]
    export: Option<PathBuf>,
}

impl ExportArgs {
    /// Target path, relative to the working directory, and the format its extension implies
    fn target(&self, working_dir: &Path) -> Option<(PathBuf, ExportFormat)> {
        let path = resolve_path(working_dir, self.export.as_deref()?);
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ExportFormat::Json,
            _ => ExportFormat::Markdown,
        };
        Some((path, format))
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormatChoice {
    Markdown,
    Json,
}

impl From<ExportFormatChoice> for ExportFormat {
    fn from(choice: ExportFormatChoice) -> Self {
        match choice {
            ExportFormatChoice::Markdown => ExportFormat::Markdown,
            ExportFormatChoice::Json => ExportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&cli.log_level, log_format);

    let working_dir = match &cli.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    let db = Database::open().context("Failed to initialize database")?;

    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(log_format, &resolve_path(&working_dir, path))
            .context("Failed to open log file")?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    if matches!(cli.command, Command::Models) {
        let client = OpenRouterClient::new(config.client_config())?;
        let catalog = fetch_catalog(&client).await;
        if cli.json_output {
            println!("{}", serde_json::to_string_pretty(&catalog.models)?);
        } else {
            display::print_models(&catalog);
        }
        return Ok(());
    }

    if matches!(
        cli.command,
        Command::History { .. }
            | Command::Export { .. }
            | Command::Key { .. }
            | Command::Public {
                action: PublicAction::List { .. }
                    | PublicAction::Show { .. }
                    | PublicAction::Delete { .. }
            }
    ) {
        return handle_local_command(cli.command, &db, &working_dir);
    }

    let credential = resolve_credential(cli.api_key.as_deref(), &db).map_err(explain_credential)?;
    let models = config.models(
        cli.model.as_deref(),
        cli.generator_model.as_deref(),
        cli.validator_model.as_deref(),
    );
    let client = OpenRouterClient::new(config.client_config())?;
    let refinement = RefinementLoop::new(&client, &db, logger, credential, models.clone());

    match cli.command {
        Command::Generate {
            goal,
            feedback,
            seed_file,
        } => {
            let mut params = goal.params();
            if let Some(feedback) = feedback {
                params = params.with_feedback(feedback);
            }
            if let Some(path) = seed_file {
                let path = resolve_path(&working_dir, &path);
                let seed = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                params = params.with_seed_instruction(seed);
            }

            let instruction = refinement.generate(params).await?;
            if cli.json_output {
                println!(
                    "{}",
                    serde_json::json!({ "instruction": instruction, "model": models.generator })
                );
            } else {
                display::print_instruction(&instruction, refinement.iteration().await);
            }
        }
        Command::Validate {
            instruction_file,
            cases,
            export,
        } => {
            let path = resolve_path(&working_dir, &instruction_file);
            let instruction = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let test_cases = cases.load(&working_dir)?;

            refinement.edit_instruction(instruction.trim()).await;
            let report = refinement.validate(&test_cases).await?;

            if cli.json_output {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_report(&report, None);
            }

            if let Some((path, format)) = export.target(&working_dir) {
                let document = ExportDocument::new(
                    instruction.trim(),
                    "",
                    "",
                    &models.validator,
                    report.results().into_iter().cloned().collect(),
                );
                history::write_export(&document, format, Some(path))?;
            }
        }
        Command::Refine {
            goal,
            cases,
            auto,
            max_rounds,
            target,
            publish,
            export,
        } => {
            let options = RefineOptions {
                params: goal.params(),
                test_cases: cases.load(&working_dir)?,
                mode: if auto {
                    RoundMode::Auto
                } else {
                    RoundMode::Interactive
                },
                max_rounds: max_rounds.or(if auto { Some(3) } else { None }),
                target_score: target,
            };

            let summary = refine::run_refine(&refinement, &options).await?;
            let Some(instruction) = summary.instruction.as_deref() else {
                anyhow::bail!("No instruction was produced");
            };
            let context = goal.context.as_deref().unwrap_or_default();

            if let Some((path, format)) = export.target(&working_dir) {
                let document = ExportDocument::new(
                    instruction,
                    &goal.desired_output,
                    context,
                    &models.generator,
                    summary
                        .report
                        .as_ref()
                        .map(|r| r.results().into_iter().cloned().collect())
                        .unwrap_or_default(),
                );
                history::write_export(&document, format, Some(path))?;
            }

            if let Some(author) = publish {
                let record = public::build_public_prompt(
                    instruction,
                    &goal.desired_output,
                    context,
                    &models.generator,
                    &author,
                    summary.report.as_ref(),
                )?;
                let id = db.public_prompts().publish(&record)?;
                eprintln!("{} Published as {}", "✓".bright_green(), id);
            }

            if cli.json_output {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                eprintln!();
                eprintln!("=== FINAL INSTRUCTION ===");
                println!("{}", instruction);
            }
        }
        Command::Public {
            action: PublicAction::Refine(args),
        } => {
            let original = public::resolve_public(&db, &args.id)?;
            let options = RefineOptions {
                params: GenerationParams::new(&original.desired_output),
                test_cases: args.cases.load(&working_dir)?,
                mode: args.mode(),
                max_rounds: args.max_rounds.or(if args.auto { Some(3) } else { None }),
                target_score: args.target,
            };

            let (summary, published) =
                public::refine_public(&db, &refinement, &original, &args.author, options).await?;
            if cli.json_output {
                println!(
                    "{}",
                    serde_json::json!({ "summary": summary, "publishedId": published })
                );
            }
        }
        _ => unreachable!("local commands handled above"),
    }

    Ok(())
}

/// Commands that never touch the network
fn handle_local_command(command: Command, db: &Database, working_dir: &Path) -> Result<()> {
    match command {
        Command::History { action } => history::handle_history_command(db, action),
        Command::Export { id, format, output } => history::handle_export_command(
            db,
            id,
            format.into(),
            output.map(|path| resolve_path(working_dir, &path)),
        ),
        Command::Key { action } => key::handle_key_command(db, action),
        Command::Public { action } => public::handle_public_command(db, action),
        _ => Ok(()),
    }
}

fn explain_credential(error: LoopError) -> anyhow::Error {
    match error {
        LoopError::Credential(_) => anyhow::anyhow!(
            "{}\nPass --api-key, set OPENROUTER_API_KEY, or run `promptloops key set`.",
            error
        ),
        other => other.into(),
    }
}

fn resolve_path(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}
