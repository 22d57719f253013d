//! Pipeline domain model

use crate::aggregation::RankingPolicy;
use crate::core::{
    config::{PipelineConfig, StepConfig, MAX_STEPS},
    step::{Action, OnError, PipelineStep},
    templates,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors turning a configuration into an executable pipeline.
///
/// A config returned by the validator never produces these, except for
/// template expansion (templates are only expanded here).
#[derive(Debug, Error, PartialEq)]
pub enum PipelineBuildError {
    #[error("Pipeline has no steps")]
    Empty,

    #[error("Pipeline has {0} steps, maximum is {max}", max = MAX_STEPS)]
    TooManySteps(usize),

    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("Template '{template}' requires parameter '{param}'")]
    MissingTemplateParam { template: String, param: String },

    #[error("Step '{step}' has unknown action '{action}'")]
    UnknownAction { step: String, action: String },

    #[error("Step '{step}' has unknown on_error policy '{value}'")]
    UnknownOnError { step: String, value: String },

    #[error("Duplicate step ID: {0}")]
    DuplicateId(String),

    #[error("Step '{step}' input '{input}' does not name an earlier step")]
    InvalidInput { step: String, input: String },

    #[error("Invalid output policy: {0}")]
    InvalidOutput(String),
}

/// Rendering format requested for the final list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub const NAMES: [&'static str; 2] = ["markdown", "json"];
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Policy for the final list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub format: OutputFormat,
    /// Result count cap, always positive
    pub limit: usize,
    pub ranking: RankingPolicy,
}

/// An executable pipeline.
///
/// Steps live in an arena in declaration order; `inputs` are indices that
/// always point backwards, so declaration order is a topological order.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Pipeline steps
    pub steps: Vec<PipelineStep>,

    pub output: PipelineOutput,
}

impl Pipeline {
    /// Create a pipeline from configuration, expanding templates
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineBuildError> {
        let step_configs: Vec<StepConfig> = match &config.template {
            Some(template) => templates::expand(template, &config.template_params)?,
            None => config.steps.clone(),
        };

        if step_configs.is_empty() {
            return Err(PipelineBuildError::Empty);
        }
        if step_configs.len() > MAX_STEPS {
            return Err(PipelineBuildError::TooManySteps(step_configs.len()));
        }

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut steps = Vec::with_capacity(step_configs.len());

        for (position, step_config) in step_configs.iter().enumerate() {
            let action = Action::from_str(&step_config.action).map_err(|_| {
                PipelineBuildError::UnknownAction {
                    step: step_config.id.clone(),
                    action: step_config.action.clone(),
                }
            })?;
            let on_error = OnError::from_str(&step_config.on_error).map_err(|_| {
                PipelineBuildError::UnknownOnError {
                    step: step_config.id.clone(),
                    value: step_config.on_error.clone(),
                }
            })?;

            // Only earlier steps are in the index yet
            let inputs = step_config
                .inputs
                .iter()
                .map(|input| {
                    index.get(input.as_str()).copied().ok_or_else(|| {
                        PipelineBuildError::InvalidInput {
                            step: step_config.id.clone(),
                            input: input.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            if index.insert(step_config.id.as_str(), position).is_some() {
                return Err(PipelineBuildError::DuplicateId(step_config.id.clone()));
            }

            steps.push(PipelineStep {
                id: step_config.id.clone(),
                action,
                params: step_config.params.clone(),
                inputs,
                on_error,
            });
        }

        let output = PipelineOutput {
            format: OutputFormat::from_str(&config.output.format)
                .map_err(PipelineBuildError::InvalidOutput)?,
            limit: usize::try_from(config.output.limit)
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or_else(|| {
                    PipelineBuildError::InvalidOutput(format!("limit {}", config.output.limit))
                })?,
            ranking: RankingPolicy::from_str(&config.output.ranking)
                .map_err(PipelineBuildError::InvalidOutput)?,
        };

        Ok(Pipeline {
            name: config.name.clone(),
            steps,
            output,
        })
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps no later step consumes, in declaration order
    pub fn sinks(&self) -> Vec<usize> {
        let mut consumed = vec![false; self.steps.len()];
        for step in &self.steps {
            for &input in &step.inputs {
                consumed[input] = true;
            }
        }
        consumed
            .iter()
            .enumerate()
            .filter(|(_, consumed)| !**consumed)
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether any step needs a source provider
    pub fn uses_provider(&self) -> bool {
        self.steps.iter().any(|s| s.action.uses_provider())
    }
}
