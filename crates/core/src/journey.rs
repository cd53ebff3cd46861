//! Journey templates and runs -- guided step sequences over the
//! simulators.
//!
//! A template is an ordered list of steps, each bound to one action
//! kind. A run walks its template strictly in order: the next step is
//! always `current_step`, and the run completes when the pointer moves
//! past the final step.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::clock::now_rfc3339;
use crate::error::Error;

/// Sentinel `current_step` value once every template step has run.
pub const STEP_DONE: &str = "done";

/// Template used when a start request names none.
pub const DEFAULT_TEMPLATE: &str = "manufacturer-core-e2e";

pub const DEFAULT_ROLE: &str = "manufacturer";
pub const DEFAULT_LOCALE: &str = "en";

// ──────────────────────────────────────────────
// Templates
// ──────────────────────────────────────────────

/// What a step does when executed. The wire form matches the action
/// routing keys (`aas.create`, `edc.negotiate`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepActionKind {
    #[serde(rename = "aas.create")]
    AasCreate,
    #[serde(rename = "compliance.check")]
    ComplianceCheck,
    #[serde(rename = "edc.negotiate")]
    EdcNegotiate,
    #[serde(rename = "edc.transfer")]
    EdcTransfer,
    #[serde(rename = "feedback.csat")]
    FeedbackCsat,
}

impl StepActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepActionKind::AasCreate => "aas.create",
            StepActionKind::ComplianceCheck => "compliance.check",
            StepActionKind::EdcNegotiate => "edc.negotiate",
            StepActionKind::EdcTransfer => "edc.transfer",
            StepActionKind::FeedbackCsat => "feedback.csat",
        }
    }
}

impl std::fmt::Display for StepActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyStep {
    pub key: String,
    pub title: String,
    pub action: StepActionKind,
    pub help_text: String,
    pub default_payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyTemplate {
    pub code: String,
    pub name: String,
    pub description: String,
    pub target_role: String,
    pub steps: Vec<JourneyStep>,
}

impl JourneyTemplate {
    /// The built-in manufacturer happy path: create a passport, check
    /// it, negotiate, transfer, collect a rating.
    pub fn manufacturer_core_e2e() -> Self {
        let step = |key: &str,
                    title: &str,
                    action: StepActionKind,
                    help_text: &str,
                    default_payload: Value| JourneyStep {
            key: key.to_string(),
            title: title.to_string(),
            action,
            help_text: help_text.to_string(),
            default_payload,
        };
        JourneyTemplate {
            code: DEFAULT_TEMPLATE.to_string(),
            name: "Manufacturer Core E2E".to_string(),
            description: "Core manufacturer flow from passport creation to transfer".to_string(),
            target_role: DEFAULT_ROLE.to_string(),
            steps: vec![
                step(
                    "create-dpp",
                    "Create Digital Product Passport",
                    StepActionKind::AasCreate,
                    "Create an Asset Administration Shell for your product.",
                    json!({
                        "id": "urn:dpp:asset-001",
                        "product_name": "EV Battery Module",
                        "product_category": "battery"
                    }),
                ),
                step(
                    "run-compliance",
                    "Run Compliance Check",
                    StepActionKind::ComplianceCheck,
                    "Validate your DPP against ESPR, Battery Regulation, WEEE, and RoHS.",
                    json!({
                        "regulations": ["ESPR", "Battery Regulation", "WEEE", "RoHS"]
                    }),
                ),
                step(
                    "run-negotiation",
                    "Negotiate Data Transfer",
                    StepActionKind::EdcNegotiate,
                    "Initiate a dataspace negotiation for your DPP data.",
                    json!({
                        "asset_id": "urn:dpp:asset-001",
                        "consumer_id": "BPNL000000000001",
                        "provider_id": "BPNL000000000002"
                    }),
                ),
                step(
                    "run-transfer",
                    "Execute Data Transfer",
                    StepActionKind::EdcTransfer,
                    "Complete the data transfer through the dataspace connector.",
                    json!({
                        "asset_id": "urn:dpp:asset-001",
                        "consumer_id": "BPNL000000000001",
                        "provider_id": "BPNL000000000002"
                    }),
                ),
                step(
                    "collect-feedback",
                    "Share Your Feedback",
                    StepActionKind::FeedbackCsat,
                    "Rate your experience with this journey.",
                    json!({ "score": 5 }),
                ),
            ],
        }
    }

    /// All templates seeded into a fresh store.
    pub fn builtin() -> Vec<JourneyTemplate> {
        vec![JourneyTemplate::manufacturer_core_e2e()]
    }

    pub fn step(&self, key: &str) -> Option<&JourneyStep> {
        self.steps.iter().find(|step| step.key == key)
    }

    /// Entry point for new runs; `STEP_DONE` for an empty template.
    pub fn first_step(&self) -> &str {
        self.steps.first().map(|s| s.key.as_str()).unwrap_or(STEP_DONE)
    }

    /// The step after `key` in definition order, `STEP_DONE` when `key`
    /// is the last step or not part of the template.
    pub fn next_step_after(&self, key: &str) -> &str {
        let Some(index) = self.steps.iter().position(|step| step.key == key) else {
            return STEP_DONE;
        };
        self.steps
            .get(index + 1)
            .map(|s| s.key.as_str())
            .unwrap_or(STEP_DONE)
    }
}

// ──────────────────────────────────────────────
// Runs
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Active,
    Completed,
    Abandoned,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Active => "active",
            RunStatus::Completed => "completed",
            RunStatus::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed step. Metadata carries the linkage ids the step
/// produced (negotiation id, compliance run id, snapshot id, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_id: String,
    pub status: String,
    pub payload: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub executed_at: String,
}

impl StepExecution {
    pub fn completed(step_id: impl Into<String>, payload: Value, metadata: Map<String, Value>) -> Self {
        StepExecution {
            step_id: step_id.into(),
            status: "completed".to_string(),
            payload,
            metadata,
            executed_at: now_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyRun {
    pub id: String,
    pub template_code: String,
    pub role: String,
    pub locale: String,
    pub status: RunStatus,
    pub current_step: String,
    pub steps: Vec<StepExecution>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl JourneyRun {
    pub fn start(
        id: impl Into<String>,
        template: &JourneyTemplate,
        role: impl Into<String>,
        locale: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        let now = now_rfc3339();
        JourneyRun {
            id: id.into(),
            template_code: template.code.clone(),
            role: role.into(),
            locale: locale.into(),
            status: RunStatus::Active,
            current_step: template.first_step().to_string(),
            steps: Vec::new(),
            metadata,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, RunStatus::Active)
    }

    /// Check that `step_id` is the step this run accepts next.
    ///
    /// Split out of [`JourneyRun::advance`] so callers can validate
    /// before performing a step's side effects.
    pub fn ensure_step(&self, template: &JourneyTemplate, step_id: &str) -> Result<(), Error> {
        if self.is_terminal() {
            return Err(Error::invalid_transition(format!(
                "journey run '{}' is {} and accepts no further steps",
                self.id, self.status
            )));
        }
        if template.step(step_id).is_none() {
            return Err(Error::invalid_field(
                "step_id",
                format!(
                    "step '{}' is not part of template '{}'",
                    step_id, template.code
                ),
            ));
        }
        if step_id != self.current_step {
            return Err(Error::invalid_transition(format!(
                "expected step '{}', got '{}'",
                self.current_step, step_id
            )));
        }
        Ok(())
    }

    /// Record a completed step and move the pointer forward.
    ///
    /// Steps run strictly in template order: the execution's `step_id`
    /// must name a template step and must equal `current_step`. The run
    /// flips to `completed` once the pointer passes the last step.
    pub fn advance(&mut self, template: &JourneyTemplate, execution: StepExecution) -> Result<(), Error> {
        self.ensure_step(template, &execution.step_id)?;
        self.current_step = template.next_step_after(&execution.step_id).to_string();
        self.steps.push(execution);
        if self.current_step == STEP_DONE {
            self.status = RunStatus::Completed;
        }
        self.updated_at = now_rfc3339();
        Ok(())
    }

    pub fn abandon(&mut self) -> Result<(), Error> {
        if self.is_terminal() {
            return Err(Error::invalid_transition(format!(
                "journey run '{}' is already {}",
                self.id, self.status
            )));
        }
        self.status = RunStatus::Abandoned;
        self.updated_at = now_rfc3339();
        Ok(())
    }
}
