//! Staged validation and repair of a typed `PipelineConfig`

use crate::aggregation::RankingPolicy;
use crate::core::config::{DEFAULT_LIMIT, MAX_STEPS};
use crate::core::pipeline::OutputFormat;
use crate::core::templates::{TEMPLATE_ALIASES, TEMPLATE_NAMES};
use crate::core::{Action, PipelineConfig};
use crate::validation::fuzzy::{closest_match, resolve, Resolution};
use crate::validation::{ValidationFix, ValidationResult};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Action synonyms seen from callers, resolved before fuzzy matching
pub const ACTION_ALIASES: &[(&str, &str)] = &[
    ("lookup", "search"),
    ("find", "search"),
    ("query", "search"),
    ("pubmed", "search"),
    ("fetch", "details"),
    ("get", "details"),
    ("detail", "details"),
    ("fetch_details", "details"),
    ("similar", "related"),
    ("find_related", "related"),
    ("cited_by", "citing"),
    ("citations", "citing"),
    ("find_citing", "citing"),
    ("refs", "references"),
    ("bibliography", "references"),
    ("get_references", "references"),
    ("citation_metrics", "metrics"),
    ("icite", "metrics"),
    ("enrich", "metrics"),
    ("mesh", "expand"),
    ("expand_query", "expand"),
    ("synonyms", "expand"),
    ("combine", "merge"),
    ("union", "merge"),
    ("dedup", "merge"),
    ("deduplicate", "merge"),
    ("refine", "filter"),
    ("exclude", "filter"),
];

/// Ranking synonyms
pub const RANKING_ALIASES: &[(&str, &str)] = &[
    ("default", "balanced"),
    ("relevance", "balanced"),
    ("mixed", "balanced"),
    ("citations", "impact"),
    ("cited", "impact"),
    ("influence", "impact"),
    ("newest", "recency"),
    ("recent", "recency"),
    ("latest", "recency"),
    ("date", "recency"),
    ("evidence", "quality"),
    ("evidence_level", "quality"),
];

/// Validate a config, repairing what can be repaired.
///
/// Applying this to its own corrected output yields no further fixes.
pub fn validate_and_fix(config: &PipelineConfig) -> ValidationResult {
    let mut config = config.clone();
    let mut fixes = Vec::new();

    if config.name.trim().is_empty() {
        record(
            &mut fixes,
            ValidationFix::info("name", "", "pipeline", "pipeline name is empty"),
        );
        config.name = "pipeline".to_string();
    }

    if let Some(template) = config.template.clone() {
        if let Err(error) = fix_template(&mut config, &template, &mut fixes) {
            return ValidationResult::invalid(vec![error], fixes);
        }
        normalize_output(&mut config, &mut fixes);
        return ValidationResult::valid(config, fixes);
    }

    if config.steps.is_empty() {
        return ValidationResult::invalid(
            vec!["steps: pipeline must contain at least one step".to_string()],
            fixes,
        );
    }
    if config.steps.len() > MAX_STEPS {
        return ValidationResult::invalid(
            vec![format!(
                "steps: pipeline has {} steps, maximum is {}",
                config.steps.len(),
                MAX_STEPS
            )],
            fixes,
        );
    }

    assign_missing_ids(&mut config, &mut fixes);
    deduplicate_ids(&mut config, &mut fixes);

    let errors = normalize_actions(&mut config, &mut fixes);
    if !errors.is_empty() {
        return ValidationResult::invalid(errors, fixes);
    }

    repair_dependencies(&mut config, &mut fixes);
    normalize_on_error(&mut config, &mut fixes);
    normalize_output(&mut config, &mut fixes);

    ValidationResult::valid(config, fixes)
}

fn record(fixes: &mut Vec<ValidationFix>, fix: ValidationFix) {
    match fix.severity {
        crate::validation::Severity::Warning => warn!(
            "Auto-fix {}: '{}' -> '{}' ({})",
            fix.field, fix.original, fix.corrected, fix.reason
        ),
        crate::validation::Severity::Info => debug!(
            "Auto-fix {}: '{}' -> '{}' ({})",
            fix.field, fix.original, fix.corrected, fix.reason
        ),
    }
    fixes.push(fix);
}

fn fix_template(config: &mut PipelineConfig, template: &str, fixes: &mut Vec<ValidationFix>) -> Result<(), String> {
    match resolve(template, &TEMPLATE_NAMES, TEMPLATE_ALIASES) {
        Resolution::Exact(_) => {}
        Resolution::Aliased(name) => {
            record(
                fixes,
                ValidationFix::warning("template", template, name, "resolved template alias"),
            );
            config.template = Some(name.to_string());
        }
        Resolution::FuzzyMatched { value, score } => {
            record(
                fixes,
                ValidationFix::warning(
                    "template",
                    template,
                    value,
                    format!("closest known template (similarity {:.2})", score),
                ),
            );
            config.template = Some(value.to_string());
        }
        Resolution::Unresolved => {
            return Err(format!(
                "template: unknown template '{}' (known: {})",
                template,
                TEMPLATE_NAMES.join(", ")
            ));
        }
    }

    if !config.steps.is_empty() {
        record(
            fixes,
            ValidationFix::warning(
                "steps",
                format!("{} steps", config.steps.len()),
                "[]",
                "template drives execution, explicit steps ignored",
            ),
        );
        config.steps.clear();
    }

    Ok(())
}

fn assign_missing_ids(config: &mut PipelineConfig, fixes: &mut Vec<ValidationFix>) {
    let mut taken: HashSet<String> = config
        .steps
        .iter()
        .map(|s| s.id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    for (i, step) in config.steps.iter_mut().enumerate() {
        if !step.id.trim().is_empty() {
            continue;
        }

        let base = format!("step_{}", i + 1);
        let id = unique_id(&base, &taken);
        taken.insert(id.clone());

        record(
            fixes,
            ValidationFix::info(format!("steps[{}].id", i), step.id.as_str(), id.as_str(), "missing step id"),
        );
        step.id = id;
    }
}

fn deduplicate_ids(config: &mut PipelineConfig, fixes: &mut Vec<ValidationFix>) {
    let mut taken: HashSet<String> = config.steps.iter().map(|s| s.id.clone()).collect();
    let mut seen: HashSet<String> = HashSet::new();

    for (i, step) in config.steps.iter_mut().enumerate() {
        if seen.insert(step.id.clone()) {
            continue;
        }

        let id = unique_id(&step.id, &taken);
        taken.insert(id.clone());
        seen.insert(id.clone());

        record(
            fixes,
            ValidationFix::warning(
                format!("steps[{}].id", i),
                step.id.as_str(),
                id.as_str(),
                "duplicate step id",
            ),
        );
        step.id = id;
    }
}

/// `base` if free, else `base_2`, `base_3`, ...
fn unique_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn normalize_actions(config: &mut PipelineConfig, fixes: &mut Vec<ValidationFix>) -> Vec<String> {
    let known = Action::names();
    let mut errors = Vec::new();

    for (i, step) in config.steps.iter_mut().enumerate() {
        let field = format!("steps[{}].action", i);
        match resolve(&step.action, &known, ACTION_ALIASES) {
            Resolution::Exact(_) => {}
            Resolution::Aliased(name) => {
                record(
                    fixes,
                    ValidationFix::warning(field, step.action.as_str(), name, "resolved action alias"),
                );
                step.action = name.to_string();
            }
            Resolution::FuzzyMatched { value, score } => {
                record(
                    fixes,
                    ValidationFix::warning(
                        field,
                        step.action.as_str(),
                        value,
                        format!("closest known action (similarity {:.2})", score),
                    ),
                );
                step.action = value.to_string();
            }
            Resolution::Unresolved => errors.push(format!(
                "{}: unknown action '{}' in step '{}' (known: {})",
                field,
                step.action,
                step.id,
                known.join(", ")
            )),
        }
    }

    errors
}

fn repair_dependencies(config: &mut PipelineConfig, fixes: &mut Vec<ValidationFix>) {
    let ids: Vec<String> = config.steps.iter().map(|s| s.id.clone()).collect();

    for (i, step) in config.steps.iter_mut().enumerate() {
        let earlier = &ids[..i];
        let mut repaired: Vec<String> = Vec::with_capacity(step.inputs.len());

        for (j, input) in step.inputs.iter().enumerate() {
            let field = format!("steps[{}].inputs[{}]", i, j);

            if earlier.contains(input) {
                if repaired.contains(input) {
                    record(
                        fixes,
                        ValidationFix::info(field, input.as_str(), "", "input listed twice"),
                    );
                } else {
                    repaired.push(input.clone());
                }
                continue;
            }

            if *input == step.id {
                record(
                    fixes,
                    ValidationFix::warning(field, input.as_str(), "", "step cannot consume its own output"),
                );
                continue;
            }

            if ids[i..].contains(input) {
                record(
                    fixes,
                    ValidationFix::warning(
                        field,
                        input.as_str(),
                        "",
                        "input refers to a later step and would create a cycle",
                    ),
                );
                continue;
            }

            let candidate = closest_match(input, ids.iter().map(String::as_str))
                .and_then(|(matched, score)| {
                    let position = ids.iter().position(|id| id == matched)?;
                    (position < i).then_some((matched, score))
                });

            match candidate {
                Some((matched, score)) if !repaired.iter().any(|r| r == matched) => {
                    record(
                        fixes,
                        ValidationFix::warning(
                            field,
                            input.as_str(),
                            matched,
                            format!("unknown step, closest earlier step (similarity {:.2})", score),
                        ),
                    );
                    repaired.push(matched.to_string());
                }
                _ => {
                    record(
                        fixes,
                        ValidationFix::warning(field, input.as_str(), "", "unknown step id"),
                    );
                }
            }
        }

        step.inputs = repaired;
    }
}

fn normalize_on_error(config: &mut PipelineConfig, fixes: &mut Vec<ValidationFix>) {
    for (i, step) in config.steps.iter_mut().enumerate() {
        if step.on_error == "skip" || step.on_error == "abort" {
            continue;
        }

        let corrected = if step.on_error.trim().eq_ignore_ascii_case("abort") {
            "abort"
        } else {
            "skip"
        };
        record(
            fixes,
            ValidationFix::info(
                format!("steps[{}].on_error", i),
                step.on_error.as_str(),
                corrected,
                "on_error must be 'skip' or 'abort'",
            ),
        );
        step.on_error = corrected.to_string();
    }
}

fn normalize_output(config: &mut PipelineConfig, fixes: &mut Vec<ValidationFix>) {
    let output = &mut config.output;

    if !OutputFormat::NAMES.contains(&output.format.as_str()) {
        let normalized = output.format.trim().to_lowercase();
        let (corrected, reason) = if OutputFormat::NAMES.contains(&normalized.as_str()) {
            (normalized, "normalized output format")
        } else {
            ("markdown".to_string(), "unknown output format")
        };
        record(
            fixes,
            ValidationFix::info("output.format", output.format.as_str(), corrected.as_str(), reason),
        );
        output.format = corrected;
    }

    let ranking = output.ranking.clone();
    let corrected = match resolve(&ranking, &RankingPolicy::NAMES, RANKING_ALIASES) {
        Resolution::Exact(_) => None,
        Resolution::Aliased(name) => Some((name, "resolved ranking alias".to_string())),
        Resolution::FuzzyMatched { value, score } => Some((
            value,
            format!("closest known ranking (similarity {:.2})", score),
        )),
        Resolution::Unresolved => Some(("balanced", "unknown ranking, using default".to_string())),
    };
    if let Some((name, reason)) = corrected {
        record(
            fixes,
            ValidationFix::warning("output.ranking", ranking.as_str(), name, reason),
        );
        output.ranking = name.to_string();
    }

    if output.limit <= 0 {
        record(
            fixes,
            ValidationFix::info(
                "output.limit",
                output.limit.to_string(),
                DEFAULT_LIMIT.to_string(),
                "limit must be positive",
            ),
        );
        output.limit = DEFAULT_LIMIT;
    }
}
