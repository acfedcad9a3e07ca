//! # Outbound Ports (Driven Ports)
//!
//! What the executor needs from the persistent engine: ordered statement
//! batches inside a transaction. Production binds these to a SQL engine;
//! tests use `InMemoryStatementStore`.

use crate::domain::{Collection, Predicate, Row, Statement, StoreError};
use async_trait::async_trait;

/// Transactional statement execution.
///
/// Implementations must apply a batch's statements in order and must not let
/// two open transactions write concurrently.
#[async_trait]
pub trait StatementStore: Send + Sync {
    /// Open transaction handle. Dropping it without commit discards its writes.
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Execute `batch` in order. Returns the number of rows affected.
    async fn execute_batch(&self, tx: &mut Self::Tx, batch: &[Statement])
        -> Result<u64, StoreError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}

/// Read access to committed rows.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn select(
        &self,
        collection: Collection,
        predicate: &Predicate,
    ) -> Result<Vec<Row>, StoreError>;
}
