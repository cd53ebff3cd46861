//! Rule evaluation -- runs a document through a rule book and
//! classifies the findings.

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::str::FromStr;

use passage_core::compliance::{ComplianceIssue, ComplianceReport};

use crate::book::RuleBook;
use crate::model::Rule;
use crate::path;

/// Evaluate `payload` against the named regulations.
///
/// Regulations without rules in the book contribute nothing. A rule is
/// skipped entirely when its `when` guard does not match. Findings are
/// classified per rule: recommended rules produce recommendations,
/// severity `error` produces violations, everything else warnings.
pub fn evaluate(book: &RuleBook, payload: &Value, regulations: &[String]) -> ComplianceReport {
    let mut issues = Issues::default();

    for regulation in regulations {
        for rule in book.rules_for(regulation) {
            if let Some(when) = &rule.when {
                if !when.matches(payload) {
                    continue;
                }
            }

            let resolved = rule
                .path
                .as_deref()
                .and_then(|path| path::resolve(path, payload));

            // Presence check: missing required/recommended path is one
            // issue and ends the rule.
            if (rule.required || rule.recommended) && rule.path.is_some() && resolved.is_none() {
                if let Some(path) = rule.path.as_deref() {
                    issues.push(rule, regulation, path, "Missing required field");
                }
                continue;
            }

            if let Some(value) = resolved {
                for failure in constraint_failures(rule, value) {
                    if let Some(path) = rule.path.as_deref() {
                        issues.push(rule, regulation, path, &failure);
                    }
                }

                // Companion paths once the rule path matched.
                if let Some(requires) = &rule.requires {
                    for companion in requires.paths() {
                        if !path::exists(companion, payload) {
                            issues.push(
                                rule,
                                regulation,
                                companion,
                                &format!("Missing dependent field '{companion}'"),
                            );
                        }
                    }
                }
            }

            if let Some(then_required) = &rule.then_required {
                for required_path in then_required.paths() {
                    if !path::exists(required_path, payload) {
                        issues.push(
                            rule,
                            regulation,
                            required_path,
                            &format!("Conditional requirement missing '{required_path}'"),
                        );
                    }
                }
            }
        }
    }

    issues.into_report()
}

#[derive(Default)]
struct Issues {
    violations: Vec<ComplianceIssue>,
    warnings: Vec<ComplianceIssue>,
    recommendations: Vec<ComplianceIssue>,
}

impl Issues {
    fn push(&mut self, rule: &Rule, regulation: &str, path: &str, default_message: &str) {
        let issue = ComplianceIssue {
            id: rule.id.clone(),
            path: path.to_string(),
            message: rule
                .message
                .clone()
                .unwrap_or_else(|| default_message.to_string()),
            severity: rule.severity.clone(),
            regulation: Some(regulation.to_string()),
            remediation: rule.remediation.clone(),
        };
        if rule.recommended {
            self.recommendations.push(issue);
        } else if rule.severity == "error" {
            self.violations.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    fn into_report(self) -> ComplianceReport {
        ComplianceReport::new(self.violations, self.warnings, self.recommendations)
    }
}

// ──────────────────────────────────────────────
// Value constraints
// ──────────────────────────────────────────────

fn constraint_failures(rule: &Rule, value: &Value) -> Vec<String> {
    let mut failures = Vec::new();

    if let Some(expected) = rule.value_type {
        if !expected.matches(value) {
            failures.push(match expected {
                crate::model::ValueType::Number => "value must be a number".to_string(),
                crate::model::ValueType::Integer => "value must be an integer".to_string(),
                other => format!("value must be of type '{}'", other.as_str()),
            });
        }
    }

    if let Some(allowed) = &rule.enum_values {
        if !allowed.is_empty() && !allowed.contains(value) {
            failures.push(format!(
                "value must be one of {}",
                Value::Array(allowed.clone())
            ));
        }
    }

    if let Some(pattern) = rule.pattern.as_deref() {
        if !pattern.is_empty() {
            // Full-match semantics: the whole string must match.
            match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(re) => {
                    let matched = value.as_str().is_some_and(|s| re.is_match(s));
                    if !matched {
                        failures.push(format!("value must match pattern '{pattern}'"));
                    }
                }
                Err(_) => failures.push(format!("invalid pattern '{pattern}'")),
            }
        }
    }

    if rule.min.is_some() || rule.max.is_some() {
        match to_decimal(value) {
            None => failures.push("value must be numeric for min/max checks".to_string()),
            Some(actual) => {
                if let Some(min) = rule.min.as_ref().and_then(number_to_decimal) {
                    if actual < min {
                        if let Some(raw) = &rule.min {
                            failures.push(format!("value must be >= {raw}"));
                        }
                    }
                }
                if let Some(max) = rule.max.as_ref().and_then(number_to_decimal) {
                    if actual > max {
                        if let Some(raw) = &rule.max {
                            failures.push(format!("value must be <= {raw}"));
                        }
                    }
                }
            }
        }
    }

    if rule.min_length.is_some() || rule.max_length.is_some() {
        match length_of(value) {
            None => failures.push("value must support length checks".to_string()),
            Some(length) => {
                if let Some(min) = rule.min_length {
                    if length < min {
                        failures.push(format!("length must be >= {min}"));
                    }
                }
                if let Some(max) = rule.max_length {
                    if length > max {
                        failures.push(format!("length must be <= {max}"));
                    }
                }
            }
        }
    }

    failures
}

/// Exact decimal view of a JSON number, via its literal text so float
/// artifacts never leak into comparisons.
fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => number_to_decimal(number),
        _ => None,
    }
}

fn number_to_decimal(number: &Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}
