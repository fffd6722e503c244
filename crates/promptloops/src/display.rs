//! Terminal rendering for instructions and validation reports.

use colored::{ColoredString, Colorize};
use promptloops_client::ModelCatalog;
use promptloops_core::{BatchReport, TestCaseOutcome};
use promptloops_critic::{AggregateScore, ScoreBand, ScoreTrend};

const RULE: &str = "─────────────────────────────────────────────────────────────────────";

pub fn print_instruction(instruction: &str, iteration: usize) {
    eprintln!();
    eprintln!(
        "{}",
        format!("┌─ System Instruction (v{}) ", iteration).bright_blue().bold()
    );
    println!("{}", instruction);
    eprintln!("{}", format!("└{}", RULE).bright_blue());
}

pub fn print_report(report: &BatchReport, previous_score: Option<f64>) {
    eprintln!();
    for outcome in &report.outcomes {
        match outcome {
            TestCaseOutcome::Completed { index, result, score } => {
                eprintln!(
                    "{} {}",
                    format!("Test {}", index + 1).bold(),
                    score_label(*score)
                );
                eprintln!("  {} {}", "Prompt:".dimmed(), result.test_prompt);
                eprintln!("  {} {}", "Expected:".dimmed(), result.expected_behavior);
                eprintln!("  {}", "Response:".dimmed());
                for line in result.response.lines() {
                    eprintln!("    {}", line);
                }
                eprintln!("  {}", "Analysis:".dimmed());
                for line in result.analysis.lines() {
                    eprintln!("    {}", line.dimmed());
                }
            }
            TestCaseOutcome::Failed {
                index,
                test_case,
                error,
            } => {
                eprintln!(
                    "{} {}",
                    format!("Test {}", index + 1).bold(),
                    "failed".bright_red()
                );
                eprintln!("  {} {}", "Prompt:".dimmed(), test_case.test_prompt);
                eprintln!("  {} {}", "Error:".dimmed(), error.to_string().bright_red());
            }
        }
        eprintln!();
    }

    if report.failed() > 0 {
        eprintln!("{} {}", "⚠".bright_yellow(), report.summary());
    }

    match &report.aggregate {
        Some(aggregate) => print_aggregate(aggregate, previous_score),
        None => eprintln!(
            "{} {}",
            "⚠".bright_yellow(),
            "No SCORE found in any analysis; nothing to aggregate.".dimmed()
        ),
    }
}

fn print_aggregate(aggregate: &AggregateScore, previous_score: Option<f64>) {
    eprintln!("{}", "=== PERFORMANCE ===".bold());

    let mut average = format!(
        "Average: {} {}",
        band_colored(aggregate.band(), format!("{:.1}/10", aggregate.average_score)),
        aggregate.band().description().dimmed()
    );
    if let Some(delta) = aggregate.improvement_over(previous_score) {
        let delta_text = format!("{:+.1}", delta);
        let styled = match aggregate.trend(previous_score) {
            ScoreTrend::Up => format!("▲ {}", delta_text).bright_green(),
            ScoreTrend::Down => format!("▼ {}", delta_text).bright_red(),
            ScoreTrend::Same => format!("● {}", delta_text).dimmed(),
        };
        average.push_str(&format!("  {}", styled));
    }
    eprintln!("{}", average);

    eprintln!(
        "Range: {:.1} - {:.1}   Consistency: {:.1}/10 ({})   Pass rate: {:.0}% ({})",
        aggregate.min_score,
        aggregate.max_score,
        aggregate.consistency,
        aggregate.consistency_label(),
        aggregate.pass_rate,
        aggregate.pass_rate_label()
    );
    if aggregate.scored < aggregate.total {
        eprintln!(
            "{}",
            format!(
                "{} of {} analyses had a usable score",
                aggregate.scored, aggregate.total
            )
            .dimmed()
        );
    }
}

fn score_label(score: Option<f64>) -> ColoredString {
    match score {
        Some(s) => band_colored(ScoreBand::from_score(s), format!("{:.1}/10", s)),
        None => "no score".dimmed(),
    }
}

fn band_colored(band: ScoreBand, text: String) -> ColoredString {
    match band {
        ScoreBand::Excellent => text.bright_green().bold(),
        ScoreBand::Good => text.bright_green(),
        ScoreBand::NeedsWork => text.bright_yellow(),
        ScoreBand::MajorRevision => text.bright_red(),
    }
}

pub fn print_models(catalog: &ModelCatalog) {
    if let Some(reason) = catalog.fallback_reason() {
        eprintln!(
            "{} {}",
            "⚠".bright_yellow(),
            format!("Using built-in model list ({})", reason).dimmed()
        );
    }
    for model in &catalog.models {
        println!("{:<45} {}", model.id, model.name.dimmed());
    }
}
