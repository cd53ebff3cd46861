//! Compliance orchestration: evaluate a payload into a stored run,
//! patch the stored payload with fixes, and re-evaluate on request.
//!
//! Fixes and evaluation stay separate on purpose. A fix patches the
//! payload and extends the audit trail; the recorded outcome only moves
//! when a recheck runs the evaluator again.

use serde::Deserialize;
use serde_json::Value;

use passage_core::clock::now_rfc3339;
use passage_core::compliance::default_regulations;
use passage_core::patch::apply_patch;
use passage_core::{ComplianceRun, Error, FixRecord, PatchOperation};
use passage_storage::{PassageStore, StorageError};

use crate::evaluator::ComplianceEvaluator;
use crate::{new_id, OCC_RETRY_LIMIT};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub dpp_id: Option<String>,
    #[serde(default)]
    pub regulations: Option<Vec<String>>,
    pub payload: Value,
}

/// Fix payloads arrive either as a JSON-Patch operation list or in the
/// legacy single-fix form (`{"path": ..., "value": ...}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FixRequest {
    Operations { operations: Vec<PatchOperation> },
    Single { path: String, value: Value },
}

impl FixRequest {
    fn into_operations(self) -> Result<Vec<PatchOperation>, Error> {
        match self {
            FixRequest::Operations { operations } => {
                if operations.is_empty() {
                    return Err(Error::invalid_field(
                        "operations",
                        "at least one operation is required",
                    ));
                }
                Ok(operations)
            }
            FixRequest::Single { path, value } => {
                Ok(vec![PatchOperation::legacy_fix(&path, value)?])
            }
        }
    }
}

/// An absent or empty regulation list means the canonical default set.
fn effective_regulations(regulations: Option<Vec<String>>) -> Vec<String> {
    match regulations {
        Some(list) if !list.is_empty() => list,
        _ => default_regulations(),
    }
}

/// Evaluate a payload and persist the outcome as a new run.
pub async fn run_check<S, E>(
    store: &S,
    evaluator: &E,
    request: CheckRequest,
) -> Result<ComplianceRun, Error>
where
    S: PassageStore,
    E: ComplianceEvaluator,
{
    let regulations = effective_regulations(request.regulations);
    let report = evaluator.evaluate(&request.payload, &regulations).await?;
    let run = ComplianceRun::new(
        new_id("cr"),
        request.dpp_id,
        request.payload,
        regulations,
        report,
    );
    store
        .insert_compliance_run(run.clone())
        .await
        .map_err(StorageError::into_core)?;
    tracing::info!(
        compliance_run_id = %run.id,
        status = %run.report.status,
        violations = run.report.summary.violations,
        "compliance check recorded"
    );
    Ok(run)
}

pub async fn get_compliance_run<S: PassageStore>(
    store: &S,
    id: &str,
) -> Result<ComplianceRun, Error> {
    Ok(store
        .get_compliance_run(id)
        .await
        .map_err(StorageError::into_core)?
        .value)
}

/// Patch the stored payload and append to the fix audit trail.
///
/// The recorded outcome is left as-is; a bad patch leaves the run
/// untouched.
pub async fn apply_fix<S: PassageStore>(
    store: &S,
    id: &str,
    request: FixRequest,
) -> Result<ComplianceRun, Error> {
    let operations = request.into_operations()?;
    for _ in 0..OCC_RETRY_LIMIT {
        let stored = store
            .get_compliance_run(id)
            .await
            .map_err(StorageError::into_core)?;
        let mut run = stored.value;
        run.payload = apply_patch(&run.payload, &operations)?;
        let applied_at = now_rfc3339();
        for operation in &operations {
            run.record_fix(FixRecord {
                id: new_id("fix"),
                path: operation.path.clone(),
                value: operation.value.clone().unwrap_or(Value::Null),
                applied_at: applied_at.clone(),
            });
        }
        match store
            .update_compliance_run(run.clone(), stored.version)
            .await
        {
            Ok(_) => {
                tracing::info!(
                    compliance_run_id = %id,
                    operations = operations.len(),
                    "fix applied"
                );
                return Ok(run);
            }
            Err(StorageError::ConcurrentConflict { .. }) => continue,
            Err(other) => return Err(other.into_core()),
        }
    }
    Err(Error::upstream(format!(
        "compliance run '{id}' kept conflicting after {OCC_RETRY_LIMIT} attempts"
    )))
}

/// Re-evaluate the current payload and replace the recorded outcome.
pub async fn recheck<S, E>(store: &S, evaluator: &E, id: &str) -> Result<ComplianceRun, Error>
where
    S: PassageStore,
    E: ComplianceEvaluator,
{
    for _ in 0..OCC_RETRY_LIMIT {
        let stored = store
            .get_compliance_run(id)
            .await
            .map_err(StorageError::into_core)?;
        let mut run = stored.value;
        // Evaluate inside the loop so a retry sees the freshest payload.
        let report = evaluator.evaluate(&run.payload, &run.regulations).await?;
        run.apply_report(report);
        match store
            .update_compliance_run(run.clone(), stored.version)
            .await
        {
            Ok(_) => {
                tracing::info!(
                    compliance_run_id = %id,
                    status = %run.report.status,
                    "compliance run re-evaluated"
                );
                return Ok(run);
            }
            Err(StorageError::ConcurrentConflict { .. }) => continue,
            Err(other) => return Err(other.into_core()),
        }
    }
    Err(Error::upstream(format!(
        "compliance run '{id}' kept conflicting after {OCC_RETRY_LIMIT} attempts"
    )))
}
