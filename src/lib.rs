//! litpipe - declarative literature-search pipelines
//!
//! A pipeline document is validated and repaired, executed step by step
//! against source providers, and reduced to one deduplicated, ranked list.

pub mod aggregation;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod provider;
pub mod validation;

// Re-export commonly used types
pub use aggregation::{aggregate, AggregationStats, RankingContext, RankingPolicy};
pub use core::{Action, Article, ExecutionStatus, Pipeline, PipelineConfig, PipelineRun, StepResult};
pub use execution::{ExecutionEngine, ExecutionError, ExecutionEvent, ExecutionOptions};
pub use persistence::{InMemoryRunStore, RunRecord, RunStore};
pub use provider::{ProviderError, ProviderRegistry, SourceProvider, StaticProvider};
pub use validation::{config_hash, parse_and_validate, parse_document, validate_and_fix, ValidationResult};
