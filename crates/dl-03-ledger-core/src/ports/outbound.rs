//! Driven ports (Outbound dependencies)
//!
//! Every reader sees committed state only. Changes made earlier in the same
//! block are tracked by the service, not by the readers.

use crate::domain::{Account, AccountKey, LedgerResult, ScratchEntry, TransactionType};
use async_trait::async_trait;
use dl_02_storage_intents::Row;
use shared_types::{Address, BlockSummary, Hash, PublicKey, Signature};

/// Account lookup.
#[async_trait]
pub trait AccountReader: Send + Sync {
    async fn get_account(&self, key: AccountKey) -> LedgerResult<Option<Account>>;

    /// Account holding `username` as confirmed or unconfirmed username.
    async fn get_account_by_username(&self, username: &str) -> LedgerResult<Option<Account>>;
}

/// Round inputs: accepted blocks, the forging list and the scratch rows.
#[async_trait]
pub trait RoundReader: Send + Sync {
    /// Accepted blocks with height in `first..=last`, ascending.
    async fn round_blocks(&self, first: u64, last: u64) -> LedgerResult<Vec<BlockSummary>>;

    /// Delegates forging in `round`, in slot order.
    async fn round_delegates(&self, round: u64) -> LedgerResult<Vec<PublicKey>>;

    async fn scratch_entries(&self, round: u64) -> LedgerResult<Vec<ScratchEntry>>;
}

/// Batch load of persisted transaction assets.
#[async_trait]
pub trait AssetReader: Send + Sync {
    /// Asset rows of the given transactions, keyed by `transaction_id`.
    async fn asset_rows(&self, tx_type: TransactionType, ids: &[Hash]) -> LedgerResult<Vec<Row>>;
}

/// Signature verification and address derivation.
///
/// Synchronous: both operations are pure CPU work.
pub trait CryptoService: Send + Sync {
    fn verify(&self, hash: &Hash, signature: &Signature, public_key: &PublicKey) -> bool;

    fn derive_address(&self, public_key: &PublicKey) -> Address;
}
