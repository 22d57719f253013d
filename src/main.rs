use anyhow::{Context, Result};
use litpipe::cli::commands::{HashCommand, HistoryCommand, RunCommand, ValidateCommand};
use litpipe::cli::output::*;
use litpipe::cli::{Cli, Command};
use litpipe::core::{ExecutionStatus, Pipeline, PipelineConfig};
use litpipe::execution::{ExecutionEngine, ExecutionEvent, ExecutionOptions};
use litpipe::persistence::{record_run, RunRecord, RunStore};
use litpipe::provider::load_registry;
use litpipe::validation::{config_hash, ValidationResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG overrides the default level
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Hash(cmd) => hash_pipeline(cmd)?,
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// Load and validate a document; invalid documents end the process
fn load_validated(file: &Path, quiet: bool) -> Result<(ValidationResult, PipelineConfig)> {
    let result = PipelineConfig::from_file(file).context("Failed to load pipeline config")?;

    if !quiet {
        for fix in &result.fixes {
            eprintln!("{}", format_fix(fix));
        }
    }

    match result.config.clone() {
        Some(config) => Ok((result, config)),
        None => {
            eprintln!("{} Validation failed:", CROSS);
            for err in &result.errors {
                eprintln!("  {}", style(err).red());
            }
            std::process::exit(1);
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    let (result, config) = load_validated(&cmd.file, cmd.json)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{} Pipeline configuration is valid", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    match &config.template {
        Some(template) => println!("  Template: {}", style(template).cyan()),
        None => println!("  Steps: {}", style(config.steps.len()).cyan()),
    }
    println!(
        "  Fixes: {} ({} warnings)",
        style(result.fixes.len()).cyan(),
        style(result.warnings().count()).yellow()
    );
    println!("  Hash: {}", style(config_hash(&config)).dim());

    Ok(())
}

fn hash_pipeline(cmd: &HashCommand) -> Result<()> {
    let (_, config) = load_validated(&cmd.file, true)?;
    println!("{}", config_hash(&config));
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let (_, config) = load_validated(&cmd.file, cmd.json)?;
    let hash = config_hash(&config);
    let pipeline = Pipeline::from_config(&config).context("Failed to build pipeline")?;

    let registry = load_registry(&cmd.fixtures)?;

    let mut options = ExecutionOptions::default();
    if let Some(secs) = cmd.timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let mut engine = ExecutionEngine::new(registry).with_options(options);
    let progress = (!cmd.json).then(|| create_progress_bar(pipeline.steps.len()));
    if let Some(progress) = progress.clone() {
        engine = engine.on_event(move |event| {
            progress.println(format_execution_event(&event));
            if matches!(event, ExecutionEvent::StepCompleted { .. } | ExecutionEvent::StepFailed { .. }) {
                progress.inc(1);
            }
        });
    }

    let run = engine.execute(&pipeline).await.context("Pipeline could not start")?;
    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }

    let record = if cmd.no_history {
        None
    } else {
        let store = open_store(cmd.db.as_deref()).await?;
        Some(record_run(store.as_ref(), &run, &hash).await?)
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        println!();
        for (position, article) in run.articles.iter().enumerate() {
            println!("{}", format_article(position + 1, article));
        }
        println!("\n{}", format_run(&run));
        if let Some(record) = &record {
            println!(
                "{} Run saved to history ({} new since last run)",
                INFO,
                style(record.new_identifiers.len()).green()
            );
        }
    }

    if run.status != ExecutionStatus::Completed {
        error!("Pipeline {} finished with status {}", run.pipeline_name, run.status.as_str());
        std::process::exit(1);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store(cmd.db.as_deref()).await?;

    let mut records: Vec<RunRecord> = match &cmd.pipeline {
        Some(pipeline_name) => store.list_runs(pipeline_name).await?,
        None => {
            let mut all = Vec::new();
            for pipeline_name in store.list_pipelines().await? {
                all.extend(store.list_runs(&pipeline_name).await?);
            }
            all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            all
        }
    };
    records.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": records });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, records.len());
    for record in &records {
        println!("  {}", format_run_record(record));
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_store(db: Option<&Path>) -> Result<Arc<dyn RunStore>> {
    use litpipe::persistence::SqliteRunStore;

    let store = match db {
        Some(path) => SqliteRunStore::at_path(path).await?,
        None => SqliteRunStore::with_default_path().await?,
    };
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store(db: Option<&Path>) -> Result<Arc<dyn RunStore>> {
    use litpipe::persistence::InMemoryRunStore;
    use tracing::warn;

    if let Some(path) = db {
        warn!("Built without sqlite support, ignoring --db {}", path.display());
    } else {
        warn!("Built without sqlite support, history is not kept");
    }
    Ok(Arc::new(InMemoryRunStore::new()))
}
