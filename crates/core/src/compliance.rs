//! Compliance run model -- evaluation outcome plus fix history.
//!
//! A run captures one evaluation of a product payload against a set of
//! regulations. Fixes patch the stored payload but never touch the
//! recorded outcome; only an explicit re-evaluation replaces it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::now_rfc3339;

/// Regulation set used when a check request names none.
pub const DEFAULT_REGULATIONS: [&str; 4] = ["ESPR", "Battery Regulation", "WEEE", "RoHS"];

pub fn default_regulations() -> Vec<String> {
    DEFAULT_REGULATIONS.iter().map(|r| r.to_string()).collect()
}

// ──────────────────────────────────────────────
// Evaluation outcome
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Pending,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "non-compliant",
            ComplianceStatus::Pending => "pending",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding. Severity is carried as the rule author wrote it
/// (`error`, `warning`, ...); classification into the three lists has
/// already happened by the time an issue lands here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    pub id: String,
    pub path: String,
    pub message: String,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub violations: usize,
    pub warnings: usize,
    pub recommendations: usize,
}

/// Classified evaluation result. Status is derived: compliant exactly
/// when no violations were found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub status: ComplianceStatus,
    pub violations: Vec<ComplianceIssue>,
    pub warnings: Vec<ComplianceIssue>,
    pub recommendations: Vec<ComplianceIssue>,
    pub summary: ComplianceSummary,
}

impl ComplianceReport {
    pub fn new(
        violations: Vec<ComplianceIssue>,
        warnings: Vec<ComplianceIssue>,
        recommendations: Vec<ComplianceIssue>,
    ) -> Self {
        let status = if violations.is_empty() {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NonCompliant
        };
        let summary = ComplianceSummary {
            violations: violations.len(),
            warnings: warnings.len(),
            recommendations: recommendations.len(),
        };
        ComplianceReport {
            status,
            violations,
            warnings,
            recommendations,
            summary,
        }
    }

    pub fn compliant() -> Self {
        ComplianceReport::new(Vec::new(), Vec::new(), Vec::new())
    }
}

// ──────────────────────────────────────────────
// Stored run
// ──────────────────────────────────────────────

/// One applied fix, kept for audit. The patched value is recorded as
/// sent, the evaluation outcome is not touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRecord {
    pub id: String,
    pub path: String,
    pub value: Value,
    pub applied_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRun {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpp_id: Option<String>,
    #[serde(flatten)]
    pub report: ComplianceReport,
    /// The payload as evaluated, then mutated in place by fixes.
    pub payload: Value,
    pub regulations: Vec<String>,
    #[serde(default)]
    pub fixes: Vec<FixRecord>,
    pub created_at: String,
    pub updated_at: String,
}

impl ComplianceRun {
    pub fn new(
        id: impl Into<String>,
        dpp_id: Option<String>,
        payload: Value,
        regulations: Vec<String>,
        report: ComplianceReport,
    ) -> Self {
        let now = now_rfc3339();
        ComplianceRun {
            id: id.into(),
            dpp_id,
            report,
            payload,
            regulations,
            fixes: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Append a fix to the audit trail. The payload itself is patched
    /// by the caller before this is recorded.
    pub fn record_fix(&mut self, fix: FixRecord) {
        self.fixes.push(fix);
        self.updated_at = now_rfc3339();
    }

    /// Replace the evaluation outcome after a re-check.
    pub fn apply_report(&mut self, report: ComplianceReport) {
        self.report = report;
        self.updated_at = now_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn violation() -> ComplianceIssue {
        ComplianceIssue {
            id: "rule-product-name".to_string(),
            path: "$.product_name".to_string(),
            message: "product_name is required".to_string(),
            severity: "error".to_string(),
            regulation: Some("ESPR".to_string()),
            remediation: None,
        }
    }

    fn warning() -> ComplianceIssue {
        ComplianceIssue {
            id: "rule-description".to_string(),
            path: "$.description".to_string(),
            message: "description should be provided".to_string(),
            severity: "warning".to_string(),
            regulation: None,
            remediation: Some("add a short product description".to_string()),
        }
    }

    #[test]
    fn status_follows_violations_only() {
        let clean = ComplianceReport::new(vec![], vec![warning()], vec![]);
        assert_eq!(clean.status, ComplianceStatus::Compliant);

        let dirty = ComplianceReport::new(vec![violation()], vec![], vec![]);
        assert_eq!(dirty.status, ComplianceStatus::NonCompliant);
    }

    #[test]
    fn summary_counts_match_lists() {
        let report = ComplianceReport::new(vec![violation()], vec![warning(), warning()], vec![]);
        assert_eq!(report.summary.violations, 1);
        assert_eq!(report.summary.warnings, 2);
        assert_eq!(report.summary.recommendations, 0);
    }

    #[test]
    fn status_wire_form_is_kebab() {
        assert_eq!(
            serde_json::to_value(ComplianceStatus::NonCompliant).unwrap(),
            json!("non-compliant")
        );
        assert_eq!(
            serde_json::from_value::<ComplianceStatus>(json!("compliant")).unwrap(),
            ComplianceStatus::Compliant
        );
    }

    #[test]
    fn run_flattens_report_fields() {
        let run = ComplianceRun::new(
            "run-1",
            Some("urn:dpp:asset-001".to_string()),
            json!({"product_name": "EV Battery Module"}),
            default_regulations(),
            ComplianceReport::compliant(),
        );
        let wire = serde_json::to_value(&run).unwrap();
        assert_eq!(wire["status"], "compliant");
        assert!(wire["violations"].as_array().unwrap().is_empty());
        assert_eq!(wire["summary"]["warnings"], 0);
        assert!(wire.get("report").is_none());
    }

    #[test]
    fn record_fix_appends_without_touching_report() {
        let mut run = ComplianceRun::new(
            "run-1",
            None,
            json!({}),
            default_regulations(),
            ComplianceReport::new(vec![violation()], vec![], vec![]),
        );
        run.record_fix(FixRecord {
            id: "fix-1".to_string(),
            path: "/product_name".to_string(),
            value: json!("EV Battery Module"),
            applied_at: now_rfc3339(),
        });
        assert_eq!(run.fixes.len(), 1);
        assert_eq!(run.report.status, ComplianceStatus::NonCompliant);
        assert_eq!(run.report.summary.violations, 1);
        assert!(run.updated_at >= run.created_at);
    }

    #[test]
    fn apply_report_replaces_outcome() {
        let mut run = ComplianceRun::new(
            "run-1",
            None,
            json!({}),
            default_regulations(),
            ComplianceReport::new(vec![violation()], vec![], vec![]),
        );
        run.apply_report(ComplianceReport::compliant());
        assert_eq!(run.report.status, ComplianceStatus::Compliant);
        assert!(run.report.violations.is_empty());
    }

    #[test]
    fn optional_issue_fields_omitted_from_wire() {
        let wire = serde_json::to_value(violation()).unwrap();
        assert_eq!(wire["regulation"], "ESPR");
        assert!(wire.get("remediation").is_none());
    }

    #[test]
    fn default_set_is_the_canonical_four() {
        assert_eq!(
            default_regulations(),
            vec!["ESPR", "Battery Regulation", "WEEE", "RoHS"]
        );
    }
}
