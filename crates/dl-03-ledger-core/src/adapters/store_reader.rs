//! # Store-Backed Readers
//!
//! Implements every outbound reader port over a `RowSource`. Block headers
//! and the forging list per round live outside the ledger's collections, so
//! the adapter keeps a small chain index the block pipeline feeds through
//! `record_block` / `forget_block` / `set_round_delegates`.

use crate::domain::account::{by_address, by_public_key, by_username};
use crate::domain::lifecycle::TransactionHandler;
use crate::domain::{
    Account, AccountKey, AccountMemberships, LedgerResult, ScratchEntry, TransactionType,
};
use crate::ports::{AccountReader, AssetReader, RoundReader};
use async_trait::async_trait;
use dl_02_storage_intents::{Collection, Predicate, Row, RowSource, Value};
use parking_lot::RwLock;
use shared_types::{BlockSummary, Hash, InvariantError, PublicKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct ChainIndex {
    blocks: BTreeMap<u64, BlockSummary>,
    round_delegates: BTreeMap<u64, Vec<PublicKey>>,
}

pub struct StoreLedgerReader<R: RowSource> {
    source: Arc<R>,
    chain: RwLock<ChainIndex>,
}

impl<R: RowSource> StoreLedgerReader<R> {
    pub fn new(source: Arc<R>) -> Self {
        Self {
            source,
            chain: RwLock::new(ChainIndex::default()),
        }
    }

    /// Register an accepted block.
    pub fn record_block(&self, block: BlockSummary) {
        self.chain.write().blocks.insert(block.height, block);
    }

    /// Drop the block at `height` after it was rolled back.
    pub fn forget_block(&self, height: u64) -> Option<BlockSummary> {
        self.chain.write().blocks.remove(&height)
    }

    /// Forging list of `round`, in slot order.
    pub fn set_round_delegates(&self, round: u64, delegates: Vec<PublicKey>) {
        self.chain.write().round_delegates.insert(round, delegates);
    }

    async fn load(&self, predicate: Predicate) -> LedgerResult<Option<Account>> {
        let rows = self.source.select(Collection::Accounts, &predicate).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let address = row
            .get("address")
            .cloned()
            .ok_or(InvariantError::MalformedColumn { column: "address" })?;

        let mut memberships = AccountMemberships::default();
        let owner = Predicate::eq("account_id", address);
        for collection in AccountMemberships::COLLECTIONS {
            let rows = self.source.select(collection, &owner).await?;
            memberships.extend(collection, &rows)?;
        }
        Ok(Some(Account::from_rows(row, &memberships)?))
    }
}

#[async_trait]
impl<R: RowSource> AccountReader for StoreLedgerReader<R> {
    async fn get_account(&self, key: AccountKey) -> LedgerResult<Option<Account>> {
        let predicate = match key {
            AccountKey::Address(address) => by_address(&address),
            AccountKey::PublicKey(public_key) => by_public_key(&public_key),
        };
        self.load(predicate).await
    }

    async fn get_account_by_username(&self, username: &str) -> LedgerResult<Option<Account>> {
        for column in ["username", "u_username"] {
            if let Some(account) = self.load(by_username(column, username)).await? {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<R: RowSource> RoundReader for StoreLedgerReader<R> {
    async fn round_blocks(&self, first: u64, last: u64) -> LedgerResult<Vec<BlockSummary>> {
        Ok(self
            .chain
            .read()
            .blocks
            .range(first..=last)
            .map(|(_, block)| block.clone())
            .collect())
    }

    async fn round_delegates(&self, round: u64) -> LedgerResult<Vec<PublicKey>> {
        let delegates = self
            .chain
            .read()
            .round_delegates
            .get(&round)
            .cloned()
            .ok_or(InvariantError::EmptyDelegateSet { round })?;
        Ok(delegates)
    }

    async fn scratch_entries(&self, round: u64) -> LedgerResult<Vec<ScratchEntry>> {
        let rows = self
            .source
            .select(Collection::RoundScratch, &Predicate::eq("round", Value::Int(round as i64)))
            .await?;
        trace!(round, rows = rows.len(), "Loaded round scratch");
        Ok(rows
            .iter()
            .map(ScratchEntry::from_row)
            .collect::<Result<Vec<_>, InvariantError>>()?)
    }
}

#[async_trait]
impl<R: RowSource> AssetReader for StoreLedgerReader<R> {
    async fn asset_rows(&self, tx_type: TransactionType, ids: &[Hash]) -> LedgerResult<Vec<Row>> {
        let collection = TransactionHandler::for_type(tx_type).logic().asset_collection();
        let Some(collection) = collection.filter(|_| !ids.is_empty()) else {
            return Ok(Vec::new());
        };
        let predicate = Predicate::one_of("transaction_id", ids.iter().copied());
        Ok(self.source.select(collection, &predicate).await?)
    }
}
