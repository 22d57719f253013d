//! Persistence layer for pipeline run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::ExecutionStatus;
use crate::core::PipelineRun;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// What is kept of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,

    pub pipeline_name: String,

    /// Hash of the validated config that ran
    pub config_hash: String,

    pub status: ExecutionStatus,

    /// When the run completed
    pub timestamp: DateTime<Utc>,

    pub article_count: usize,

    /// Every prefixed identifier of the final list, in rank order
    pub identifiers: Vec<String>,

    /// Primary identifiers of records sharing no identifier with the
    /// previous run of the same pipeline
    pub new_identifiers: Vec<String>,
}

impl RunRecord {
    /// Summarize a run, diffing its identifiers against the previous record
    pub fn from_run(run: &PipelineRun, config_hash: &str, previous: Option<&RunRecord>) -> Self {
        let identifiers = run.identifiers();

        let seen: HashSet<&str> = previous
            .map(|p| p.identifiers.iter().map(String::as_str).collect())
            .unwrap_or_default();
        let new_identifiers: Vec<String> = run
            .articles
            .iter()
            .filter(|a| !a.identifiers().iter().any(|id| seen.contains(id.as_str())))
            .filter_map(|a| a.primary_identifier())
            .collect();

        Self {
            run_id: run.run_id,
            pipeline_name: run.pipeline_name.clone(),
            config_hash: config_hash.to_string(),
            status: run.status,
            timestamp: run.completed_at,
            article_count: run.articles.len(),
            identifiers,
            new_identifiers,
        }
    }
}

/// Trait for run history backends
#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    async fn save_run(&self, record: &RunRecord) -> Result<()>;

    /// Most recent record of a pipeline
    async fn latest_run(&self, pipeline_name: &str) -> Result<Option<RunRecord>>;

    /// All records of a pipeline, newest first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunRecord>>;

    /// All pipeline names, sorted
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// Build the record for a finished run and save it
pub async fn record_run(store: &dyn RunStore, run: &PipelineRun, config_hash: &str) -> Result<RunRecord> {
    let previous = store.latest_run(&run.pipeline_name).await?;
    let record = RunRecord::from_run(run, config_hash, previous.as_ref());
    store.save_run(&record).await?;
    Ok(record)
}

/// In-memory run store (for testing or ephemeral use)
pub struct InMemoryRunStore {
    by_pipeline: tokio::sync::RwLock<HashMap<String, Vec<RunRecord>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self {
            by_pipeline: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RunStore for InMemoryRunStore {
    async fn save_run(&self, record: &RunRecord) -> Result<()> {
        let mut by_pipeline = self.by_pipeline.write().await;
        let runs = by_pipeline.entry(record.pipeline_name.clone()).or_default();
        runs.retain(|r| r.run_id != record.run_id);
        runs.push(record.clone());
        Ok(())
    }

    async fn latest_run(&self, pipeline_name: &str) -> Result<Option<RunRecord>> {
        let by_pipeline = self.by_pipeline.read().await;
        Ok(by_pipeline.get(pipeline_name).and_then(|runs| runs.last().cloned()))
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunRecord>> {
        let by_pipeline = self.by_pipeline.read().await;
        Ok(by_pipeline
            .get(pipeline_name)
            .map(|runs| runs.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        let mut names: Vec<String> = by_pipeline.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
