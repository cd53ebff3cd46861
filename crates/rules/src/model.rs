//! Rule definitions as authored in rule book JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::path;

/// Expected JSON type of a rule's target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::Object => "object",
            ValueType::Array => "array",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Number => value.is_number(),
            ValueType::Integer => value.is_i64() || value.is_u64(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Object => value.is_object(),
            ValueType::Array => value.is_array(),
        }
    }
}

/// One path or a list of paths. Rule authors write either form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathList {
    One(String),
    Many(Vec<String>),
}

impl PathList {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            PathList::One(path) => {
                if path.is_empty() {
                    Vec::new()
                } else {
                    vec![path.as_str()]
                }
            }
            PathList::Many(paths) => paths
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.as_str())
                .collect(),
        }
    }
}

/// Guard deciding whether a rule applies to a document at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
}

impl RuleCondition {
    /// True when the guarded path resolves and, if `equals` is set,
    /// the resolved value compares equal to it.
    pub fn matches(&self, document: &Value) -> bool {
        match path::resolve(&self.path, document) {
            Some(value) => match &self.equals {
                Some(expected) => value == expected,
                None => true,
            },
            None => false,
        }
    }
}

fn default_severity() -> String {
    "warning".to_string()
}

/// A single declarative check.
///
/// Presence is driven by `required`/`recommended`; every other field
/// constrains the resolved value. `requires` names companion paths
/// that must exist once the rule path matched, `then_required` names
/// paths that must exist whenever the rule evaluates (its `when` guard
/// matched or it has none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<PathList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<RuleCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then_required: Option<PathList>,
}
