use passage_core::EntityKind;

/// All errors that can be returned by a `PassageStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record of this kind under the given id.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    /// A record of this kind already exists under the given id.
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: EntityKind, id: String },

    /// Optimistic concurrency conflict -- another writer moved the record
    /// past the version this mutation was read at.
    #[error("concurrent conflict on {kind} '{id}': expected version {expected_version}")]
    ConcurrentConflict {
        kind: EntityKind,
        id: String,
        expected_version: i64,
    },

    /// A backend-specific storage error (connection loss, serialization, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Map onto the core error taxonomy for callers that surface storage
    /// failures to users. Conflicts are retried by the engine and only
    /// reach this path when retries are exhausted.
    pub fn into_core(self) -> passage_core::Error {
        match self {
            StorageError::NotFound { kind, id } => passage_core::Error::not_found(kind, id),
            StorageError::AlreadyExists { kind, id } => passage_core::Error::invalid_argument(
                format!("{kind} '{id}' already exists"),
            ),
            StorageError::ConcurrentConflict { kind, id, .. } => passage_core::Error::upstream(
                format!("persistent write conflict on {kind} '{id}'"),
            ),
            StorageError::Backend(msg) => {
                passage_core::Error::upstream(format!("storage backend error: {msg}"))
            }
        }
    }
}
