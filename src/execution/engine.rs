//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    aggregation::{aggregate, RankingContext, RankingPolicy},
    core::{
        Action, Article, ExecutionStatus, OnError, Pipeline, PipelineBuildError, PipelineConfig, PipelineRun,
        StepResult,
    },
    execution::StepExecutor,
    provider::ProviderRegistry,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Error text recorded on steps that ran out of time
pub const DEADLINE_EXCEEDED: &str = "pipeline deadline exceeded";

/// Structural problems that prevent a run from starting. Step failures
/// are recorded in the run instead.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Step '{0}' needs a source provider but no primary provider is registered")]
    NoPrimaryProvider(String),

    #[error(transparent)]
    Build(#[from] PipelineBuildError),
}

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
        step_count: usize,
    },
    StepStarted {
        step_id: String,
        action: Action,
    },
    StepCompleted {
        step_id: String,
        article_count: usize,
    },
    StepFailed {
        step_id: String,
        error: String,
    },
    PipelineAborted {
        run_id: Uuid,
        step_id: String,
    },
    PipelineCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
        article_count: usize,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Options applying to a whole run
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Steps starting at or after this instant fail; a step still running
    /// when it passes is cut short
    pub deadline: Option<Instant>,

    /// Ranking for `merge` steps without their own `ranking` param
    pub merge_ranking: RankingPolicy,
}

impl ExecutionOptions {
    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    executor: StepExecutor,
    options: ExecutionOptions,
    event_handlers: Vec<EventHandler>,
}

impl ExecutionEngine {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self {
            executor: StepExecutor::new(providers),
            options: ExecutionOptions::default(),
            event_handlers: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.executor = self.executor.with_merge_ranking(options.merge_ranking);
        self.options = options;
        self
    }

    /// Add an event handler
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Build the model from a validated config, then execute it
    pub async fn execute_config(&self, config: &PipelineConfig) -> Result<PipelineRun, ExecutionError> {
        let pipeline = Pipeline::from_config(config)?;
        self.execute(&pipeline).await
    }

    /// Execute the entire pipeline.
    ///
    /// Steps run one at a time in declaration order. A failed step with
    /// `on_error: skip` contributes an empty output; with `abort` the run
    /// stops and the last successful step's output becomes the final set.
    pub async fn execute(&self, pipeline: &Pipeline) -> Result<PipelineRun, ExecutionError> {
        if let Some(step) = pipeline.steps.iter().find(|s| s.action.uses_provider()) {
            if self.executor.providers().primary().is_none() {
                return Err(ExecutionError::NoPrimaryProvider(step.id.clone()));
            }
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!("Starting pipeline execution: {} ({})", pipeline.name, run_id);
        self.emit_event(ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
            step_count: pipeline.steps.len(),
        });

        let mut outputs: Vec<Vec<Article>> = vec![Vec::new(); pipeline.steps.len()];
        let mut step_results: Vec<(String, StepResult)> = Vec::with_capacity(pipeline.steps.len());
        let mut entities: Vec<String> = Vec::new();
        let mut last_success: Option<usize> = None;
        let mut aborted = false;

        for (index, step) in pipeline.steps.iter().enumerate() {
            self.emit_event(ExecutionEvent::StepStarted {
                step_id: step.id.clone(),
                action: step.action,
            });

            let result = self.run_step(pipeline, index, &outputs, &entities).await;

            if result.ok {
                info!("Step {} completed with {} articles", step.id, result.articles.len());
                self.emit_event(ExecutionEvent::StepCompleted {
                    step_id: step.id.clone(),
                    article_count: result.articles.len(),
                });

                if step.action == Action::Expand {
                    collect_entities(&result, &mut entities);
                }
                outputs[index] = result.articles.clone();
                last_success = Some(index);
                step_results.push((step.id.clone(), result));
                continue;
            }

            let error = result.error.clone().unwrap_or_default();
            self.emit_event(ExecutionEvent::StepFailed {
                step_id: step.id.clone(),
                error: error.clone(),
            });
            step_results.push((step.id.clone(), result));

            match step.on_error {
                OnError::Skip => {
                    warn!("Step {} failed, skipping: {}", step.id, error);
                }
                OnError::Abort => {
                    error!("Step {} failed, aborting pipeline: {}", step.id, error);
                    self.emit_event(ExecutionEvent::PipelineAborted {
                        run_id,
                        step_id: step.id.clone(),
                    });
                    aborted = true;
                    break;
                }
            }
        }

        let record_sets: Vec<Vec<Article>> = if aborted {
            last_success.map(|i| vec![outputs[i].clone()]).unwrap_or_default()
        } else {
            pipeline.sinks().into_iter().map(|i| outputs[i].clone()).collect()
        };

        let ctx = RankingContext::new(pipeline.output.ranking).with_entities(entities);
        let mut final_output = aggregate(record_sets, &ctx);
        final_output.articles.truncate(pipeline.output.limit);
        final_output.stats.output_count = final_output.articles.len();

        let status = if aborted {
            ExecutionStatus::Aborted
        } else if step_results.iter().all(|(_, r)| !r.ok) {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };

        info!(
            "Pipeline execution finished: {} - {} ({} articles)",
            pipeline.name,
            status.as_str(),
            final_output.articles.len()
        );
        self.emit_event(ExecutionEvent::PipelineCompleted {
            run_id,
            status,
            article_count: final_output.articles.len(),
        });

        Ok(PipelineRun {
            run_id,
            pipeline_name: pipeline.name.clone(),
            status,
            articles: final_output.articles,
            step_results,
            aggregation: final_output.stats,
            started_at,
            completed_at: Utc::now(),
        })
    }

    /// Resolve a step's input and run it under the deadline
    async fn run_step(
        &self,
        pipeline: &Pipeline,
        index: usize,
        outputs: &[Vec<Article>],
        entities: &[String],
    ) -> StepResult {
        let step = &pipeline.steps[index];

        if self.options.expired() {
            return StepResult::failure(step.action, DEADLINE_EXCEEDED);
        }

        let input: Vec<Article> = step
            .inputs
            .iter()
            .flat_map(|&i| outputs[i].iter().cloned())
            .collect();

        let run = self.executor.execute(step, input, entities);
        match self.options.deadline {
            Some(deadline) => timeout_at(deadline, run)
                .await
                .unwrap_or_else(|_| StepResult::failure(step.action, DEADLINE_EXCEEDED)),
            None => run.await,
        }
    }
}

fn collect_entities(result: &StepResult, entities: &mut Vec<String>) {
    let Some(found) = result.metadata.get("entities").and_then(|v| v.as_array()) else {
        return;
    };
    for entity in found.iter().filter_map(|e| e.as_str()) {
        if !entities.iter().any(|e| e.eq_ignore_ascii_case(entity)) {
            entities.push(entity.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Params, StepConfig};
    use crate::provider::StaticProvider;
    use std::sync::Mutex;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new().register(
            StaticProvider::new("pubmed")
                .with_search("propofol", vec![Article::with_pmid("1", "A"), Article::with_pmid("2", "B")]),
        )
    }

    #[tokio::test]
    async fn test_execute_simple_pipeline() {
        let config = PipelineConfig::new(
            "simple",
            vec![
                StepConfig::new("s1", "search").with_params(Params::new().with("query", "propofol")),
                StepConfig::new("f", "filter").with_inputs(&["s1"]),
            ],
        );

        let run = ExecutionEngine::new(registry()).execute_config(&config).await.unwrap();
        assert_eq!(run.status, ExecutionStatus::Completed);
        assert_eq!(run.articles.len(), 2);
        assert_eq!(run.succeeded_steps(), vec!["s1", "f"]);
    }

    #[tokio::test]
    async fn test_events_are_emitted_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let config = PipelineConfig::new(
            "events",
            vec![StepConfig::new("s1", "search").with_params(Params::new().with("query", "propofol"))],
        );
        let engine = ExecutionEngine::new(registry()).on_event(move |event| {
            let name = match event {
                ExecutionEvent::PipelineStarted { .. } => "pipeline_started",
                ExecutionEvent::StepStarted { .. } => "step_started",
                ExecutionEvent::StepCompleted { .. } => "step_completed",
                ExecutionEvent::StepFailed { .. } => "step_failed",
                ExecutionEvent::PipelineAborted { .. } => "pipeline_aborted",
                ExecutionEvent::PipelineCompleted { .. } => "pipeline_completed",
            };
            sink.lock().unwrap().push(name);
        });

        engine.execute_config(&config).await.unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec!["pipeline_started", "step_started", "step_completed", "pipeline_completed"]
        );
    }

    #[tokio::test]
    async fn test_missing_primary_is_structural() {
        let config = PipelineConfig::new(
            "no providers",
            vec![StepConfig::new("s1", "search").with_params(Params::new().with("query", "x"))],
        );
        let err = ExecutionEngine::new(ProviderRegistry::new())
            .execute_config(&config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NoPrimaryProvider(step) if step == "s1"));
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_every_step() {
        let config = PipelineConfig::new(
            "late",
            vec![StepConfig::new("s1", "search").with_params(Params::new().with("query", "propofol"))],
        );
        let options = ExecutionOptions::default().with_deadline(Instant::now());
        let run = ExecutionEngine::new(registry())
            .with_options(options)
            .execute_config(&config)
            .await
            .unwrap();

        assert_eq!(run.status, ExecutionStatus::Failed);
        assert_eq!(run.step("s1").unwrap().error.as_deref(), Some(DEADLINE_EXCEEDED));
    }
}
