//! Negotiation and transfer orchestration: create, read, apply actions,
//! and the canonical drives the journey steps use.

use serde::Deserialize;
use serde_json::Value;

use passage_core::{Error, Negotiation, NegotiationAction, Transfer, TransferAction};
use passage_storage::{PassageStore, StorageError};

use crate::{new_id, OCC_RETRY_LIMIT};

/// The action sequence of a successful negotiation.
pub const NEGOTIATION_SEQUENCE: [NegotiationAction; 4] = [
    NegotiationAction::Request,
    NegotiationAction::Requested,
    NegotiationAction::Offer,
    NegotiationAction::Accept,
];

/// The action sequence of a successful transfer.
pub const TRANSFER_SEQUENCE: [TransferAction; 6] = [
    TransferAction::Provision,
    TransferAction::Provisioned,
    TransferAction::Request,
    TransferAction::Requested,
    TransferAction::Start,
    TransferAction::Complete,
];

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNegotiationRequest {
    pub asset_id: String,
    pub consumer_id: String,
    pub provider_id: String,
    #[serde(default)]
    pub policy: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransferRequest {
    pub asset_id: String,
    #[serde(default)]
    pub consumer_id: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
}

// ── Negotiations ──────────────────────────────────────────────────────────────

pub async fn create_negotiation<S: PassageStore>(
    store: &S,
    request: CreateNegotiationRequest,
) -> Result<Negotiation, Error> {
    let negotiation = Negotiation::new(
        new_id("neg"),
        request.asset_id,
        request.consumer_id,
        request.provider_id,
        request.policy,
    );
    store
        .insert_negotiation(negotiation.clone())
        .await
        .map_err(StorageError::into_core)?;
    tracing::info!(
        negotiation_id = %negotiation.id,
        asset_id = %negotiation.asset_id,
        "negotiation created"
    );
    Ok(negotiation)
}

pub async fn get_negotiation<S: PassageStore>(store: &S, id: &str) -> Result<Negotiation, Error> {
    Ok(store
        .get_negotiation(id)
        .await
        .map_err(StorageError::into_core)?
        .value)
}

/// Apply one action, retrying version conflicts.
pub async fn apply_negotiation_action<S: PassageStore>(
    store: &S,
    id: &str,
    action: NegotiationAction,
) -> Result<Negotiation, Error> {
    for _ in 0..OCC_RETRY_LIMIT {
        let stored = store
            .get_negotiation(id)
            .await
            .map_err(StorageError::into_core)?;
        let mut negotiation = stored.value;
        negotiation.apply(action)?;
        match store
            .update_negotiation(negotiation.clone(), stored.version)
            .await
        {
            Ok(_) => {
                tracing::info!(
                    negotiation_id = %id,
                    action = %action,
                    state = negotiation.state.as_str(),
                    "negotiation action applied"
                );
                return Ok(negotiation);
            }
            Err(StorageError::ConcurrentConflict { .. }) => continue,
            Err(other) => return Err(other.into_core()),
        }
    }
    Err(Error::upstream(format!(
        "negotiation '{id}' kept conflicting after {OCC_RETRY_LIMIT} attempts"
    )))
}

/// Create a negotiation and walk it through the canonical sequence to
/// `ACCEPT`.
pub async fn run_canonical_negotiation<S: PassageStore>(
    store: &S,
    request: CreateNegotiationRequest,
) -> Result<Negotiation, Error> {
    let mut negotiation = create_negotiation(store, request).await?;
    let id = negotiation.id.clone();
    for action in NEGOTIATION_SEQUENCE {
        negotiation = apply_negotiation_action(store, &id, action).await?;
    }
    Ok(negotiation)
}

// ── Transfers ─────────────────────────────────────────────────────────────────

pub async fn create_transfer<S: PassageStore>(
    store: &S,
    request: CreateTransferRequest,
) -> Result<Transfer, Error> {
    let transfer = Transfer::new(
        new_id("tp"),
        request.asset_id,
        request.consumer_id,
        request.provider_id,
    );
    store
        .insert_transfer(transfer.clone())
        .await
        .map_err(StorageError::into_core)?;
    tracing::info!(
        transfer_id = %transfer.id,
        asset_id = %transfer.asset_id,
        "transfer created"
    );
    Ok(transfer)
}

pub async fn get_transfer<S: PassageStore>(store: &S, id: &str) -> Result<Transfer, Error> {
    Ok(store
        .get_transfer(id)
        .await
        .map_err(StorageError::into_core)?
        .value)
}

/// Apply one action, retrying version conflicts.
pub async fn apply_transfer_action<S: PassageStore>(
    store: &S,
    id: &str,
    action: TransferAction,
) -> Result<Transfer, Error> {
    for _ in 0..OCC_RETRY_LIMIT {
        let stored = store
            .get_transfer(id)
            .await
            .map_err(StorageError::into_core)?;
        let mut transfer = stored.value;
        transfer.apply(action)?;
        match store.update_transfer(transfer.clone(), stored.version).await {
            Ok(_) => {
                tracing::info!(
                    transfer_id = %id,
                    action = %action,
                    state = transfer.state.as_str(),
                    "transfer action applied"
                );
                return Ok(transfer);
            }
            Err(StorageError::ConcurrentConflict { .. }) => continue,
            Err(other) => return Err(other.into_core()),
        }
    }
    Err(Error::upstream(format!(
        "transfer '{id}' kept conflicting after {OCC_RETRY_LIMIT} attempts"
    )))
}

/// Create a transfer and walk it through the canonical sequence to
/// `COMPLETE`.
pub async fn run_canonical_transfer<S: PassageStore>(
    store: &S,
    request: CreateTransferRequest,
) -> Result<Transfer, Error> {
    let mut transfer = create_transfer(store, request).await?;
    let id = transfer.id.clone();
    for action in TRANSFER_SEQUENCE {
        transfer = apply_transfer_action(store, &id, action).await?;
    }
    Ok(transfer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use passage_core::{NegotiationState, TransferState};
    use passage_storage::MemoryStore;

    fn negotiation_request() -> CreateNegotiationRequest {
        CreateNegotiationRequest {
            asset_id: "urn:dpp:asset-001".to_string(),
            consumer_id: "BPNL000000000001".to_string(),
            provider_id: "BPNL000000000002".to_string(),
            policy: None,
        }
    }

    #[tokio::test]
    async fn canonical_negotiation_lands_on_accept_with_full_history() {
        let store = MemoryStore::new();
        let negotiation = run_canonical_negotiation(&store, negotiation_request())
            .await
            .unwrap();
        assert_eq!(negotiation.state, NegotiationState::Accept);
        let states: Vec<&str> = negotiation
            .state_history
            .iter()
            .map(|entry| entry.state.as_str())
            .collect();
        assert_eq!(
            states,
            vec!["INITIAL", "REQUEST", "REQUESTED", "OFFER", "ACCEPT"]
        );

        // And the stored copy matches what was returned.
        let fetched = get_negotiation(&store, &negotiation.id).await.unwrap();
        assert_eq!(fetched.state, NegotiationState::Accept);
    }

    #[tokio::test]
    async fn canonical_transfer_lands_on_complete_with_seven_entries() {
        let store = MemoryStore::new();
        let transfer = run_canonical_transfer(
            &store,
            CreateTransferRequest {
                asset_id: "urn:dpp:asset-001".to_string(),
                consumer_id: Some("BPNL000000000001".to_string()),
                provider_id: Some("BPNL000000000002".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(transfer.state, TransferState::Complete);
        assert_eq!(transfer.state_history.len(), 7);
    }

    #[tokio::test]
    async fn terminate_blocks_further_actions() {
        let store = MemoryStore::new();
        let negotiation = create_negotiation(&store, negotiation_request())
            .await
            .unwrap();
        apply_negotiation_action(&store, &negotiation.id, NegotiationAction::Terminate)
            .await
            .unwrap();
        let err = apply_negotiation_action(&store, &negotiation.id, NegotiationAction::Request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn complete_is_not_terminal_for_transfers() {
        let store = MemoryStore::new();
        let transfer = run_canonical_transfer(
            &store,
            CreateTransferRequest {
                asset_id: "urn:dpp:asset-001".to_string(),
                consumer_id: None,
                provider_id: None,
            },
        )
        .await
        .unwrap();
        let terminated =
            apply_transfer_action(&store, &transfer.id, TransferAction::Terminate)
                .await
                .unwrap();
        assert_eq!(terminated.state, TransferState::Terminate);
    }

    #[tokio::test]
    async fn unknown_negotiation_is_not_found() {
        let store = MemoryStore::new();
        let err = get_negotiation(&store, "neg-ghost").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
