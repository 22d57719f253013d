//! Pipeline configuration documents (YAML or JSON)

use crate::core::step::Params;
use crate::validation::{self, ValidationResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Upper bound on the number of steps in one pipeline
pub const MAX_STEPS: usize = 20;

/// Result count used when `output.limit` is missing or invalid
pub const DEFAULT_LIMIT: i64 = 20;

/// Errors loading a configuration document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pipeline configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Top-level pipeline configuration, as written by the caller.
///
/// String-typed fields hold whatever the caller wrote so the validator can
/// repair them; `Pipeline::from_config` resolves them to closed enums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    #[serde(default)]
    pub name: String,

    /// Named template that generates the steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Parameters for the template
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub template_params: Params,

    /// Explicit steps (ignored when `template` is set)
    #[serde(default)]
    pub steps: Vec<StepConfig>,

    /// Final list policy
    #[serde(default)]
    pub output: OutputConfig,
}

/// Step configuration as written in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier (assigned by the validator if empty)
    #[serde(default)]
    pub id: String,

    /// Action name
    pub action: String,

    /// Action-specific parameters
    #[serde(default)]
    pub params: Params,

    /// IDs of earlier steps whose outputs feed this step
    #[serde(default)]
    pub inputs: Vec<String>,

    /// `skip` or `abort`
    #[serde(default = "default_on_error")]
    pub on_error: String,
}

/// Output policy as written in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_limit")]
    pub limit: i64,

    #[serde(default = "default_ranking")]
    pub ranking: String,
}

fn default_on_error() -> String {
    "skip".to_string()
}

fn default_format() -> String {
    "markdown".to_string()
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

fn default_ranking() -> String {
    "balanced".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            limit: default_limit(),
            ranking: default_ranking(),
        }
    }
}

impl StepConfig {
    pub fn new(id: &str, action: &str) -> Self {
        Self {
            id: id.to_string(),
            action: action.to_string(),
            params: Params::new(),
            inputs: Vec::new(),
            on_error: default_on_error(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_on_error(mut self, on_error: &str) -> Self {
        self.on_error = on_error.to_string();
        self
    }
}

impl PipelineConfig {
    /// An explicit-steps configuration with default output policy
    pub fn new(name: &str, steps: Vec<StepConfig>) -> Self {
        Self {
            name: name.to_string(),
            template: None,
            template_params: Params::new(),
            steps,
            output: OutputConfig::default(),
        }
    }

    /// A template-driven configuration with default output policy
    pub fn from_template(name: &str, template: &str, template_params: Params) -> Self {
        Self {
            name: name.to_string(),
            template: Some(template.to_string()),
            template_params,
            steps: Vec::new(),
            output: OutputConfig::default(),
        }
    }

    /// Load, repair and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ValidationResult, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(validation::parse_document(&content))
    }

    /// Parse, repair and validate YAML (or JSON) text, keeping only the
    /// corrected configuration
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let result = validation::parse_document(yaml);
        match result.config {
            Some(config) if result.valid => Ok(config),
            _ => Err(ConfigError::Invalid(result.errors)),
        }
    }
}
