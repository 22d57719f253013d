//! Execution state models

use crate::aggregation::AggregationStats;
use crate::core::{Action, Article};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Action-specific facts about a step run (per-source counts, expanded
/// query text, removed-record count, ...). Consumers must not assume a
/// fixed schema.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Every step ran (some may have failed under `skip`)
    Completed,
    /// A step with `on_error: abort` failed
    Aborted,
    /// Every step failed
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Aborted => "aborted",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(ExecutionStatus::Completed),
            "aborted" => Some(ExecutionStatus::Aborted),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }
}

/// Executor output for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub ok: bool,

    /// Copied from the step
    pub action: Action,

    /// Records produced, in production order
    pub articles: Vec<Article>,

    pub metadata: Metadata,

    /// Present only when `ok` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn success(action: Action, articles: Vec<Article>, metadata: Metadata) -> Self {
        Self {
            ok: true,
            action,
            articles,
            metadata,
            error: None,
        }
    }

    pub fn failure(action: Action, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            action,
            articles: Vec::new(),
            metadata: Metadata::new(),
            error: Some(error.into()),
        }
    }
}

/// The result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique execution ID
    pub run_id: Uuid,

    pub pipeline_name: String,

    pub status: ExecutionStatus,

    /// Final deduplicated, ranked and truncated list
    pub articles: Vec<Article>,

    /// Step id to result, in declaration order. Steps never reached after an
    /// abort are absent.
    pub step_results: Vec<(String, StepResult)>,

    /// Statistics of the final aggregation pass
    pub aggregation: AggregationStats,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Look up a step result by step id
    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results
            .iter()
            .find(|(id, _)| id == step_id)
            .map(|(_, result)| result)
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.step_results
            .iter()
            .filter(|(_, r)| !r.ok)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn succeeded_steps(&self) -> Vec<&str> {
        self.step_results
            .iter()
            .filter(|(_, r)| r.ok)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Every prefixed identifier of the final articles, in rank order
    pub fn identifiers(&self) -> Vec<String> {
        self.articles.iter().flat_map(Article::identifiers).collect()
    }
}
