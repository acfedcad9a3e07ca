//! Driving ports (Inbound API)

use crate::domain::{
    Block, LedgerResult, RawTransaction, RollbackCause, RoundSnapshot, Transaction,
    TransactionHeader,
};
use async_trait::async_trait;

/// Ledger state transitions.
///
/// Callers serialise block application strictly in height order. An error
/// from `apply_block` or `undo_block` with `requires_halt()` means this node
/// has diverged and must resync.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Apply a consensus-accepted block. Returns the round snapshot when the
    /// block closes a round; the caller keeps it for a later `undo_block`.
    async fn apply_block(&self, block: &Block) -> LedgerResult<Option<RoundSnapshot>>;

    /// Revert the chain tip. A round-closing block needs the snapshot its
    /// application returned.
    async fn undo_block(
        &self,
        block: &Block,
        snapshot: Option<&RoundSnapshot>,
        cause: RollbackCause,
    ) -> LedgerResult<()>;

    /// Pool admission: mutate unconfirmed state only.
    async fn apply_unconfirmed(&self, tx: &Transaction) -> LedgerResult<()>;

    async fn undo_unconfirmed(&self, tx: &Transaction) -> LedgerResult<()>;

    /// Full validation against current state at `height`.
    async fn verify(&self, tx: &Transaction, height: u64) -> LedgerResult<()>;

    /// Multisignature readiness of `tx` against its sender.
    async fn ready(&self, tx: &Transaction) -> LedgerResult<bool>;

    fn normalize(&self, raw: &RawTransaction) -> LedgerResult<Transaction>;

    /// Load persisted assets for stored transaction headers.
    async fn attach_assets(
        &self,
        headers: Vec<TransactionHeader>,
    ) -> LedgerResult<Vec<Transaction>>;
}
