//! Step domain model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of things a pipeline step can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Query one or more sources
    Search,
    /// Fetch full records for known identifiers
    Details,
    /// Articles similar to a seed article
    Related,
    /// Articles citing a seed article
    Citing,
    /// Articles cited by a seed article
    References,
    /// Attach citation metrics to the input records
    Metrics,
    /// Expand a query (vocabulary terms, synonyms) and search with it
    Expand,
    /// Drop input records by year, type or impact
    Filter,
    /// Deduplicate and rank several inputs into one set
    Merge,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::Search,
        Action::Details,
        Action::Related,
        Action::Citing,
        Action::References,
        Action::Metrics,
        Action::Expand,
        Action::Filter,
        Action::Merge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Details => "details",
            Action::Related => "related",
            Action::Citing => "citing",
            Action::References => "references",
            Action::Metrics => "metrics",
            Action::Expand => "expand",
            Action::Filter => "filter",
            Action::Merge => "merge",
        }
    }

    /// Whether the action needs a source provider to run
    pub fn uses_provider(&self) -> bool {
        !matches!(self, Action::Filter | Action::Merge)
    }

    /// Names accepted verbatim by the validator
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Action::as_str).collect()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// What to do with the rest of the pipeline when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Record the failure, treat the output as empty and continue
    #[default]
    Skip,
    /// Stop the pipeline after recording the failure
    Abort,
}

impl OnError {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnError::Skip => "skip",
            OnError::Abort => "abort",
        }
    }
}

impl FromStr for OnError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(OnError::Skip),
            "abort" => Ok(OnError::Abort),
            other => Err(format!("unknown on_error policy '{}'", other)),
        }
    }
}

/// A primitive parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Convert an untyped document value. Nulls are dropped, nested maps are
    /// kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ParamValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(ParamValue::Int(i)),
                None => n.as_f64().map(ParamValue::Float),
            },
            Value::String(s) => Some(ParamValue::Text(s.clone())),
            Value::Array(items) => Some(ParamValue::List(
                items.iter().filter_map(ParamValue::from_json).collect(),
            )),
            Value::Object(_) => Some(ParamValue::Text(value.to_string())),
        }
    }

    /// Render as plain text (lists are comma-joined)
    pub fn render(&self) -> String {
        match self {
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Text(s) => s.clone(),
            ParamValue::List(items) => items
                .iter()
                .map(ParamValue::render)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// Open, action-specific parameter map.
///
/// Keys are kept sorted so serialization (and the config hash) is stable.
/// Handlers read only the keys they declare, through the typed accessors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Non-empty string value (numbers are rendered)
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            ParamValue::List(_) | ParamValue::Bool(_) => None,
            other => {
                let text = other.render();
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            ParamValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Positive integer value
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_i64(key).filter(|v| *v > 0).map(|v| v as u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(i) => Some(*i != 0),
            ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            ParamValue::Float(_) | ParamValue::List(_) => None,
        }
    }

    /// List value; a comma-separated string counts as a list
    pub fn get_list(&self, key: &str) -> Vec<String> {
        let split = |s: &str| -> Vec<String> {
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        };

        match self.0.get(key) {
            None => Vec::new(),
            Some(ParamValue::List(items)) => items
                .iter()
                .map(ParamValue::render)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(ParamValue::Text(s)) => split(s),
            Some(other) => split(&other.render()),
        }
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Params(iter.into_iter().collect())
    }
}

/// A single validated step in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStep {
    /// Unique step identifier
    pub id: String,

    /// What the step does
    pub action: Action,

    /// Action-specific parameters
    pub params: Params,

    /// Indices of earlier steps whose outputs feed this step
    pub inputs: Vec<usize>,

    /// Failure policy
    pub on_error: OnError,
}
