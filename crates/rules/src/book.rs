//! Rule books -- regulation-scoped rule sets with load-time checks.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use passage_core::error::Error;

use crate::model::Rule;

static DEFAULT_RULES_STR: &str = include_str!("../data/default-rules.json");

fn default_version() -> u32 {
    1
}

/// A named collection of rules per regulation. `BTreeMap` keeps
/// regulation listings deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBook {
    #[serde(default = "default_version")]
    pub version: u32,
    pub regulations: BTreeMap<String, Vec<Rule>>,
}

impl RuleBook {
    /// The embedded default book covering ESPR, Battery Regulation,
    /// WEEE, and RoHS.
    pub fn builtin() -> Result<RuleBook, Error> {
        RuleBook::from_json_str(DEFAULT_RULES_STR).map_err(|err| {
            Error::invalid_argument(format!("internal error: embedded rule book is invalid: {err}"))
        })
    }

    pub fn from_json_str(text: &str) -> Result<RuleBook, Error> {
        let book: RuleBook = serde_json::from_str(text)
            .map_err(|err| Error::invalid_argument(format!("rule book is not valid JSON: {err}")))?;
        book.check()?;
        Ok(book)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<RuleBook, Error> {
        let book: RuleBook = serde_json::from_value(value.clone())
            .map_err(|err| Error::invalid_argument(format!("rule book is malformed: {err}")))?;
        book.check()?;
        Ok(book)
    }

    pub fn rules_for(&self, regulation: &str) -> &[Rule] {
        self.regulations
            .get(regulation)
            .map(|rules| rules.as_slice())
            .unwrap_or(&[])
    }

    pub fn regulation_names(&self) -> Vec<&str> {
        self.regulations.keys().map(|name| name.as_str()).collect()
    }

    pub fn rule_count(&self) -> usize {
        self.regulations.values().map(|rules| rules.len()).sum()
    }

    /// Load-time validation: ids unique and non-empty, severities from
    /// the known vocabulary, patterns compile.
    fn check(&self) -> Result<(), Error> {
        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (regulation, rules) in &self.regulations {
            for rule in rules {
                if rule.id.is_empty() {
                    return Err(Error::invalid_field(
                        "id",
                        format!("regulation '{regulation}' has a rule without an id"),
                    ));
                }
                if !seen_ids.insert(rule.id.as_str()) {
                    return Err(Error::invalid_field(
                        "id",
                        format!("duplicate rule id '{}'", rule.id),
                    ));
                }
                if rule.severity != "error" && rule.severity != "warning" {
                    return Err(Error::invalid_field(
                        "severity",
                        format!(
                            "rule '{}' has unknown severity '{}'",
                            rule.id, rule.severity
                        ),
                    ));
                }
                if let Some(pattern) = rule.pattern.as_deref() {
                    if Regex::new(&format!("^(?:{pattern})$")).is_err() {
                        return Err(Error::invalid_field(
                            "pattern",
                            format!("rule '{}' has an invalid pattern '{pattern}'", rule.id),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_book_loads_and_covers_the_default_regulations() {
        let book = RuleBook::builtin().unwrap();
        assert_eq!(
            book.regulation_names(),
            vec!["Battery Regulation", "ESPR", "RoHS", "WEEE"]
        );
        assert!(book.rule_count() >= 10);
        assert!(!book.rules_for("ESPR").is_empty());
    }

    #[test]
    fn unknown_regulation_yields_an_empty_slice() {
        let book = RuleBook::builtin().unwrap();
        assert!(book.rules_for("REACH").is_empty());
    }

    #[test]
    fn duplicate_rule_ids_are_rejected() {
        let err = RuleBook::from_value(&json!({
            "regulations": {
                "A": [{"id": "r-1", "path": "$.x"}],
                "B": [{"id": "r-1", "path": "$.y"}]
            }
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("id"));
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let err = RuleBook::from_value(&json!({
            "regulations": {"A": [{"id": "r-1", "path": "$.x", "severity": "high"}]}
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("severity"));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_load() {
        let err = RuleBook::from_value(&json!({
            "regulations": {"A": [{"id": "r-1", "path": "$.x", "pattern": "(unclosed"}]}
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("pattern"));
    }

    #[test]
    fn version_defaults_to_one() {
        let book = RuleBook::from_value(&json!({"regulations": {}})).unwrap();
        assert_eq!(book.version, 1);
        assert_eq!(book.rule_count(), 0);
    }

    #[test]
    fn malformed_json_reports_invalid_argument() {
        let err = RuleBook::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
