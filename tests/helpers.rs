//! Test utility functions for litpipe
#![allow(dead_code)]

use litpipe::core::{Article, ExecutionStatus, PipelineConfig, PipelineRun, SourceHit};
use litpipe::execution::{ExecutionEngine, ExecutionEvent, ExecutionOptions};
use litpipe::provider::{ProviderRegistry, StaticProvider};
use litpipe::validation::{parse_document, ValidationResult};
use std::sync::{Arc, Mutex};

/// An article with a PMID, title and year
pub fn article(pmid: &str, title: &str, year: i32) -> Article {
    Article {
        year: Some(year),
        ..Article::with_pmid(pmid, title)
    }
}

/// An article known only by DOI
pub fn doi_article(doi: &str, title: &str, year: i32) -> Article {
    Article {
        year: Some(year),
        ..Article::with_doi(doi, title)
    }
}

/// Registry with a single `pubmed` primary provider
pub fn pubmed(provider: StaticProvider) -> ProviderRegistry {
    ProviderRegistry::new().register(provider)
}

/// Parse and validate YAML, panicking on unfixable input
pub fn validated(yaml: &str) -> (ValidationResult, PipelineConfig) {
    let result = parse_document(yaml);
    assert!(result.valid, "expected a valid document, errors: {:?}", result.errors);
    let config = result.config.clone().expect("valid result carries a config");
    (result, config)
}

/// Validate YAML and run it against the given providers
pub async fn run_yaml(yaml: &str, providers: ProviderRegistry) -> PipelineTestResult {
    run_yaml_with_options(yaml, providers, ExecutionOptions::default()).await
}

pub async fn run_yaml_with_options(
    yaml: &str,
    providers: ProviderRegistry,
    options: ExecutionOptions,
) -> PipelineTestResult {
    let (validation, config) = validated(yaml);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let engine = ExecutionEngine::new(providers)
        .with_options(options)
        .on_event(move |event| sink.lock().unwrap().push(event));

    let start = std::time::Instant::now();
    let run = engine
        .execute_config(&config)
        .await
        .expect("pipeline should start");
    let duration = start.elapsed();

    let events = events.lock().unwrap().clone();
    PipelineTestResult {
        validation,
        run,
        events,
        duration_ms: duration.as_millis() as u64,
    }
}

/// Test result from running a pipeline
#[derive(Debug, Clone)]
pub struct PipelineTestResult {
    pub validation: ValidationResult,
    pub run: PipelineRun,
    pub events: Vec<ExecutionEvent>,
    pub duration_ms: u64,
}

impl PipelineTestResult {
    pub fn is_success(&self) -> bool {
        self.run.status == ExecutionStatus::Completed
    }

    /// PMIDs of the final list, in order
    pub fn final_pmids(&self) -> Vec<String> {
        self.run.articles.iter().filter_map(|a| a.pmid.clone()).collect()
    }

    /// PMIDs produced by one step, in order
    pub fn step_pmids(&self, step_id: &str) -> Vec<String> {
        self.run
            .step(step_id)
            .map(|r| r.articles.iter().filter_map(|a| a.pmid.clone()).collect())
            .unwrap_or_default()
    }

    /// Step ids in the order they were started
    pub fn execution_order(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::StepStarted { step_id, .. } => Some(step_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} - {} steps ok, {} steps failed, {} articles, {}ms",
            self.run.status.as_str(),
            self.run.succeeded_steps().len(),
            self.run.failed_steps().len(),
            self.run.articles.len(),
            self.duration_ms
        )
    }
}

/// Assert a step succeeded with the given number of articles
pub fn assert_step_ok(result: &PipelineTestResult, step_id: &str, expected_articles: usize) {
    let step = result
        .run
        .step(step_id)
        .unwrap_or_else(|| panic!("Step '{}' not found in result", step_id));

    assert!(step.ok, "Step '{}' should have succeeded, error: {:?}", step_id, step.error);
    assert_eq!(
        step.articles.len(),
        expected_articles,
        "Step '{}' article count ({})",
        step_id,
        result.summary()
    );
}

/// Assert a step failed with a message containing `expected_error`
pub fn assert_step_failed(result: &PipelineTestResult, step_id: &str, expected_error: &str) {
    let step = result
        .run
        .step(step_id)
        .unwrap_or_else(|| panic!("Step '{}' not found in result", step_id));

    assert!(!step.ok, "Step '{}' should have failed", step_id);
    assert!(step.articles.is_empty(), "Failed step '{}' should have no output", step_id);

    let error = step.error.clone().unwrap_or_default();
    assert!(
        error.contains(expected_error),
        "Step '{}' error:\n{}\n\ndoes not contain:\n{}",
        step_id,
        error,
        expected_error
    );
}

/// Assert a step never ran
pub fn assert_step_absent(result: &PipelineTestResult, step_id: &str) {
    assert!(
        result.run.step(step_id).is_none(),
        "Step '{}' should not have run ({})",
        step_id,
        result.summary()
    );
}

pub fn assert_status(result: &PipelineTestResult, status: ExecutionStatus) {
    assert_eq!(result.run.status, status, "{}", result.summary());
}

/// Provenance entry helper for hand-built records
pub fn hit(source: &str, rank: usize, total: usize) -> SourceHit {
    SourceHit::new(source, rank, total)
}
