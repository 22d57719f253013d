//! Pipeline execution engine

pub mod engine;
pub mod executor;

pub use engine::{EventHandler, ExecutionEngine, ExecutionError, ExecutionEvent, ExecutionOptions, DEADLINE_EXCEEDED};
pub use executor::{filter, StepError, StepExecutor};
