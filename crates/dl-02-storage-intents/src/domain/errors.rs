//! # Domain Errors
//!
//! Storage failures are propagated unchanged to the caller. Nothing in this
//! crate retries.

use crate::domain::schema::Collection;
use thiserror::Error;

/// Failures raised by a `StatementStore`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Insert collided with an existing primary key.
    #[error("Duplicate key on {collection}: {key}")]
    DuplicateKey { collection: Collection, key: String },

    /// Upsert or insert is missing a primary key column.
    #[error("Missing primary key column {column} on {collection}")]
    MissingPrimaryKey {
        collection: Collection,
        column: &'static str,
    },

    /// Upsert against an append-only collection.
    #[error("Collection {collection} has no primary key")]
    NoPrimaryKey { collection: Collection },

    /// Increment of a non-integer column, or integer overflow.
    #[error("Cannot increment {collection}.{column}: {reason}")]
    InvalidIncrement {
        collection: Collection,
        column: String,
        reason: &'static str,
    },

    /// Backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Failures of one executor call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// Update or remove without a bounding predicate. Rejected before any
    /// statement runs.
    #[error("Unbounded {kind} on {collection} at intent {index}")]
    UnboundedPredicate {
        index: usize,
        kind: &'static str,
        collection: Collection,
    },

    /// A statement batch failed; the enclosing transaction must roll back.
    #[error("Batch {batch} failed: {source}")]
    Batch {
        batch: usize,
        #[source]
        source: StoreError,
    },

    /// Opening, committing or rolling back the executor-owned transaction failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExecutorError {
    /// The underlying storage failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ExecutorError::Batch { source, .. } => Some(source),
            ExecutorError::Store(source) => Some(source),
            ExecutorError::UnboundedPredicate { .. } => None,
        }
    }
}
