//! Pipeline validation with auto-fix.
//!
//! Configs are mostly produced by automated callers, so every stage prefers
//! a logged repair over rejection. Only input with no plausible reading
//! (unknown template or action with no close match, zero steps, too many
//! steps, a document that is not a mapping) is reported as an error.

pub mod document;
pub mod fuzzy;
pub mod hash;
pub mod validator;

pub use document::{parse_and_validate, parse_document};
pub use fuzzy::{resolve, Resolution, SIMILARITY_CUTOFF};
pub use hash::config_hash;
pub use validator::validate_and_fix;

use crate::core::PipelineConfig;
use serde::{Deserialize, Serialize};

/// How much attention a fix deserves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Shape or default coercion, meaning preserved
    Info,
    /// The caller's intent was guessed or part of the input dropped
    Warning,
}

/// One applied repair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFix {
    /// Dotted path into the config, e.g. `steps[0].action`
    pub field: String,
    pub original: String,
    pub corrected: String,
    pub reason: String,
    pub severity: Severity,
}

impl ValidationFix {
    pub fn info(field: impl Into<String>, original: impl Into<String>, corrected: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(Severity::Info, field, original, corrected, reason)
    }

    pub fn warning(field: impl Into<String>, original: impl Into<String>, corrected: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(Severity::Warning, field, original, corrected, reason)
    }

    fn new(
        severity: Severity,
        field: impl Into<String>,
        original: impl Into<String>,
        corrected: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            original: original.into(),
            corrected: corrected.into(),
            reason: reason.into(),
            severity,
        }
    }
}

/// Outcome of one validation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,

    /// Repairs applied, in the order they were made
    pub fixes: Vec<ValidationFix>,

    /// Unfixable problems (only when `valid` is false)
    pub errors: Vec<String>,

    /// The corrected config (only when `valid` is true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PipelineConfig>,
}

impl ValidationResult {
    pub(crate) fn valid(config: PipelineConfig, fixes: Vec<ValidationFix>) -> Self {
        Self {
            valid: true,
            fixes,
            errors: Vec::new(),
            config: Some(config),
        }
    }

    pub(crate) fn invalid(errors: Vec<String>, fixes: Vec<ValidationFix>) -> Self {
        Self {
            valid: false,
            fixes,
            errors,
            config: None,
        }
    }

    /// Fixes with warning severity
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationFix> {
        self.fixes.iter().filter(|f| f.severity == Severity::Warning)
    }

    /// Fix recorded for a field, if any
    pub fn fix_for(&self, field: &str) -> Option<&ValidationFix> {
        self.fixes.iter().find(|f| f.field == field)
    }
}
