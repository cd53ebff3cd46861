use serde::{Deserialize, Serialize};

/// A stored entity together with the version stamp used for optimistic
/// concurrency.
///
/// Versions start at 0 on insert and increase by exactly one per committed
/// update. A mutator reads a `Versioned<T>`, applies the pure core mutation
/// to `value`, and writes back with the version it read; the store rejects
/// the write with `ConcurrentConflict` if another writer got there first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

impl<T> Versioned<T> {
    pub fn new(value: T) -> Self {
        Versioned { value, version: 0 }
    }
}
