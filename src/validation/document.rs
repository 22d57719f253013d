//! Untyped document -> `PipelineConfig`, coercing wrong shapes

use crate::core::config::{OutputConfig, DEFAULT_LIMIT};
use crate::core::{ParamValue, Params, PipelineConfig, StepConfig};
use crate::validation::{validate_and_fix, ValidationFix, ValidationResult};
use serde_json::{Map, Value};
use tracing::debug;

const TOP_LEVEL_KEYS: [&str; 5] = ["name", "template", "template_params", "steps", "output"];

/// Parse YAML or JSON text, then coerce and validate it
pub fn parse_document(text: &str) -> ValidationResult {
    match serde_yaml::from_str::<Value>(text) {
        Ok(raw) => parse_and_validate(&raw),
        Err(e) => ValidationResult::invalid(vec![format!("document: {}", e)], Vec::new()),
    }
}

/// Convert an untyped document (maps/lists of primitives) into a config,
/// recording an info fix for every coerced shape, then validate it
pub fn parse_and_validate(raw: &Value) -> ValidationResult {
    let mut fixes = Vec::new();

    let config = match to_config(raw, &mut fixes) {
        Ok(config) => config,
        Err(error) => return ValidationResult::invalid(vec![error], fixes),
    };

    let mut result = validate_and_fix(&config);
    fixes.append(&mut result.fixes);
    result.fixes = fixes;
    result
}

fn to_config(raw: &Value, fixes: &mut Vec<ValidationFix>) -> Result<PipelineConfig, String> {
    let doc = raw
        .as_object()
        .ok_or_else(|| format!("document: expected a mapping, found {}", kind(raw)))?;

    for key in doc.keys().filter(|k| !TOP_LEVEL_KEYS.contains(&k.as_str())) {
        debug!("Ignoring unknown top-level key '{}'", key);
    }

    let name = match doc.get("name") {
        None | Some(Value::Null) => String::new(),
        Some(value) => scalar_text("name", value, fixes),
    };

    let template = match doc.get("template") {
        None | Some(Value::Null) => None,
        Some(value) => Some(scalar_text("template", value, fixes)).filter(|t| !t.trim().is_empty()),
    };

    let template_params = match doc.get("template_params") {
        None | Some(Value::Null) => Params::new(),
        Some(value) => params("template_params", value, fixes),
    };

    let steps = match doc.get("steps") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| step(i, item, fixes))
            .collect::<Result<Vec<_>, _>>()?,
        Some(single @ (Value::Object(_) | Value::String(_))) => {
            fixes.push(ValidationFix::info(
                "steps",
                kind(single),
                "list of 1 step",
                "expected a list of steps",
            ));
            vec![step(0, single, fixes)?]
        }
        Some(other) => return Err(format!("steps: expected a list, found {}", kind(other))),
    };

    let output = match doc.get("output") {
        None | Some(Value::Null) => OutputConfig::default(),
        Some(Value::Object(map)) => output(map, fixes),
        Some(other) => {
            fixes.push(ValidationFix::info(
                "output",
                other.to_string(),
                "defaults",
                "expected a mapping",
            ));
            OutputConfig::default()
        }
    };

    Ok(PipelineConfig {
        name,
        template,
        template_params,
        steps,
        output,
    })
}

fn step(i: usize, raw: &Value, fixes: &mut Vec<ValidationFix>) -> Result<StepConfig, String> {
    let field = |key: &str| format!("steps[{}].{}", i, key);

    let map = match raw {
        Value::Object(map) => map,
        Value::String(action) => {
            fixes.push(ValidationFix::info(
                format!("steps[{}]", i),
                action.as_str(),
                format!("{{action: {}}}", action),
                "bare action name used as a step",
            ));
            return Ok(StepConfig::new("", action));
        }
        other => return Err(format!("steps[{}]: expected a mapping, found {}", i, kind(other))),
    };

    let id = match map.get("id") {
        None | Some(Value::Null) => String::new(),
        Some(value) => scalar_text(&field("id"), value, fixes),
    };

    let action = match map.get("action") {
        None | Some(Value::Null) => String::new(),
        Some(value) => scalar_text(&field("action"), value, fixes),
    };

    let step_params = match map.get("params") {
        None | Some(Value::Null) => Params::new(),
        Some(value) => params(&field("params"), value, fixes),
    };

    let inputs = match map.get("inputs") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(single)) => {
            fixes.push(ValidationFix::info(
                field("inputs"),
                single.as_str(),
                format!("[{}]", single),
                "expected a list of step ids",
            ));
            vec![single.clone()]
        }
        Some(other) => {
            fixes.push(ValidationFix::info(
                field("inputs"),
                other.to_string(),
                "[]",
                "expected a list of step ids",
            ));
            Vec::new()
        }
    };

    let on_error = match map.get("on_error") {
        None | Some(Value::Null) => "skip".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    Ok(StepConfig {
        id,
        action,
        params: step_params,
        inputs,
        on_error,
    })
}

fn output(map: &Map<String, Value>, fixes: &mut Vec<ValidationFix>) -> OutputConfig {
    let mut output = OutputConfig::default();

    if let Some(format) = map.get("format").filter(|v| !v.is_null()) {
        output.format = scalar_text("output.format", format, fixes);
    }
    if let Some(ranking) = map.get("ranking").filter(|v| !v.is_null()) {
        output.ranking = scalar_text("output.ranking", ranking, fixes);
    }

    match map.get("limit") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) => match n.as_i64() {
            Some(limit) => output.limit = limit,
            None => {
                let limit = n.as_f64().map(|f| f.trunc() as i64).unwrap_or(DEFAULT_LIMIT);
                fixes.push(ValidationFix::info(
                    "output.limit",
                    n.to_string(),
                    limit.to_string(),
                    "limit must be an integer",
                ));
                output.limit = limit;
            }
        },
        Some(other) => {
            let text = match other {
                Value::String(s) => s.clone(),
                _ => other.to_string(),
            };
            let limit = text.trim().parse::<i64>().unwrap_or(DEFAULT_LIMIT);
            fixes.push(ValidationFix::info(
                "output.limit",
                text,
                limit.to_string(),
                "limit must be an integer",
            ));
            output.limit = limit;
        }
    }

    output
}

fn params(field: &str, raw: &Value, fixes: &mut Vec<ValidationFix>) -> Params {
    match raw {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| ParamValue::from_json(v).map(|v| (k.clone(), v)))
            .collect(),
        Value::String(query) => {
            fixes.push(ValidationFix::info(
                field,
                query.as_str(),
                format!("{{query: {}}}", query),
                "expected a mapping, treating text as the query",
            ));
            Params::new().with("query", query.as_str())
        }
        other => {
            fixes.push(ValidationFix::info(field, other.to_string(), "{}", "expected a mapping"));
            Params::new()
        }
    }
}

/// Text of a scalar; non-strings are rendered with an info fix
fn scalar_text(field: &str, value: &Value, fixes: &mut Vec<ValidationFix>) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => {
            let text = match other {
                Value::Array(items) if items.len() == 1 => match &items[0] {
                    Value::String(s) => s.clone(),
                    item => item.to_string(),
                },
                _ => other.to_string(),
            };
            fixes.push(ValidationFix::info(field, other.to_string(), text.as_str(), "expected a string"));
            text
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
