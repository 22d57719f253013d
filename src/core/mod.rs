//! Core domain models for pipelines
//!
//! This module defines the fundamental data structures that represent
//! pipelines, steps, bibliographic records and execution results.

pub mod article;
pub mod config;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod templates;

pub use article::*;
pub use config::{ConfigError, OutputConfig, PipelineConfig, StepConfig};
pub use pipeline::*;
pub use state::*;
pub use step::*;
