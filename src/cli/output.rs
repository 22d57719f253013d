//! CLI output formatting

use crate::{
    core::{Article, ExecutionStatus, PipelineRun},
    execution::ExecutionEvent,
    persistence::RunRecord,
    validation::{Severity, ValidationFix},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the pipeline's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(bar_style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(bar_style.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Aborted => style("ABORTED").yellow().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format one applied fix
pub fn format_fix(fix: &ValidationFix) -> String {
    let icon = match fix.severity {
        Severity::Warning => WARN,
        Severity::Info => INFO,
    };
    format!(
        "{} {}: {} → {} {}",
        icon,
        style(&fix.field).cyan(),
        style(&fix.original).dim(),
        style(&fix.corrected).bold(),
        style(format!("({})", fix.reason)).dim()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name,
            step_count,
        } => format!(
            "{} Starting pipeline {} with {} steps ({})",
            ROCKET,
            style(pipeline_name).bold(),
            step_count,
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StepStarted { step_id, action } => {
            format!("{} {} {}", SPINNER, style(step_id).cyan(), style(action).dim())
        }
        ExecutionEvent::StepCompleted { step_id, article_count } => format!(
            "{} {} ({} articles)",
            CHECK,
            style(step_id).green(),
            article_count
        ),
        ExecutionEvent::StepFailed { step_id, error } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::PipelineAborted { step_id, .. } => {
            format!("{} Aborted at {}", WARN, style(step_id).yellow())
        }
        ExecutionEvent::PipelineCompleted {
            run_id,
            status,
            article_count,
        } => format!(
            "{} Pipeline ({}) {} with {} articles",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status),
            article_count
        ),
    }
}

/// One line per article: position, identifier, year, title
pub fn format_article(position: usize, article: &Article) -> String {
    let id = article.primary_identifier().unwrap_or_default();
    let year = article.year.map(|y| y.to_string()).unwrap_or_else(|| "----".to_string());
    let score = article
        .ranking_score
        .map(|s| format!("{:.3}", s))
        .unwrap_or_default();
    format!(
        "{:>3}. {} {} {} {}",
        position,
        style(year).dim(),
        article.title,
        style(id).cyan(),
        style(score).dim()
    )
}

/// Summary of a finished run
pub fn format_run(run: &PipelineRun) -> String {
    let failed = run.failed_steps();
    let mut summary = format!(
        "{} {}: {} articles ({} in, {} duplicates removed)",
        style(&run.pipeline_name).bold(),
        format_status(run.status),
        run.articles.len(),
        run.aggregation.input_count,
        run.aggregation.duplicates_removed
    );
    if !failed.is_empty() {
        summary.push_str(&format!(", failed steps: {}", style(failed.join(", ")).red()));
    }
    summary
}

/// Format a stored run for history listings
pub fn format_run_record(record: &RunRecord) -> String {
    let status_icon = match record.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Aborted => WARN,
    };

    format!(
        "{} {} - {} - {} - {} articles, {} new - {} ({})",
        status_icon,
        style(&record.run_id.to_string()[..8]).dim(),
        style(&record.pipeline_name).bold(),
        format_status(record.status),
        style(record.article_count).cyan(),
        style(record.new_identifiers.len()).green(),
        style(record.timestamp.format("%Y-%m-%d %H:%M")).dim(),
        style(&record.config_hash).dim()
    )
}
