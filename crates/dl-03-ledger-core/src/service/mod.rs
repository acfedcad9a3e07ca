//! # Ledger Service
//!
//! Orchestrates blocks and pool transactions over the pure domain:
//!
//! 1. Load the accounts a transaction reads into an `AccountOverlay`
//! 2. Ask the `TransactionRegistry` for the account changes
//! 3. Turn every change into intents with `LedgerDeltaBuilder`
//! 4. On a round's last block, land the round through `RoundLedger`
//! 5. Hand all intents of the call to the `IntentExecutor` at once
//!
//! A failed call writes nothing.

mod overlay;
#[cfg(test)]
mod tests;

use crate::config::LedgerConfig;
use crate::domain::{
    Block, LedgerDeltaBuilder, LedgerError, LedgerResult, RawTransaction, RollbackCause,
    RoundLedger, RoundScope, RoundSnapshot, RoundTag, ScratchEntry, Transaction,
    TransactionAsset, TransactionError, TransactionHeader, TransactionRegistry, TransactionType,
    TxContext, TxState,
};
use crate::domain::lifecycle::AccountChange;
use crate::ports::{AccountReader, AssetReader, CryptoService, LedgerApi, RoundReader};
use async_trait::async_trait;
use dl_02_storage_intents::{IntentExecutor, Row, StatementStore, StorageIntent, Value};
use overlay::AccountOverlay;
use shared_types::{to_hex, Hash, InvariantError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dependencies for LedgerService
pub struct LedgerDependencies<S, R, C> {
    pub store: Arc<S>,
    pub reader: Arc<R>,
    pub crypto: C,
}

pub struct LedgerService<S, R, C>
where
    S: StatementStore,
    R: AccountReader + RoundReader + AssetReader,
    C: CryptoService,
{
    executor: IntentExecutor<S>,
    reader: Arc<R>,
    crypto: C,
    registry: TransactionRegistry,
    rounds: RoundLedger,
    config: LedgerConfig,
    /// Height of the last applied block.
    tip: AtomicU64,
}

/// Intents and scratch rows collected during one call.
#[derive(Default)]
struct Pending {
    intents: Vec<Option<StorageIntent>>,
    scratch: Vec<ScratchEntry>,
}

impl<S, R, C> LedgerService<S, R, C>
where
    S: StatementStore,
    R: AccountReader + RoundReader + AssetReader,
    C: CryptoService,
{
    pub fn new(deps: LedgerDependencies<S, R, C>, config: LedgerConfig) -> LedgerResult<Self> {
        let economics = config.economics.build()?;
        Ok(Self {
            executor: IntentExecutor::new(deps.store, config.executor.clone()),
            reader: deps.reader,
            crypto: deps.crypto,
            registry: TransactionRegistry::new(),
            rounds: RoundLedger::new(economics.rounds),
            config,
            tip: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    pub fn rounds(&self) -> &RoundLedger {
        &self.rounds
    }

    /// Height of the last applied block, `0` before the first one.
    pub fn tip(&self) -> u64 {
        self.tip.load(Ordering::Acquire)
    }

    fn context(&self, height: u64, round: Option<RoundTag>) -> TxContext<'_> {
        TxContext {
            height,
            round,
            config: &self.config,
        }
    }

    fn overlay(&self) -> AccountOverlay<'_, R> {
        AccountOverlay::new(self.reader.as_ref(), &self.crypto)
    }

    /// Accounts `tx` reads, as the overlay currently sees them.
    async fn tx_state(
        &self,
        overlay: &mut AccountOverlay<'_, R>,
        tx: &Transaction,
    ) -> LedgerResult<TxState> {
        let sender = overlay.sender(&tx.header.sender_public_key).await?;
        let mut state = TxState::new(sender);
        match &tx.asset {
            TransactionAsset::Vote { votes } => {
                for change in votes.iter() {
                    if let Some(target) = overlay.find_public_key(change.key()).await? {
                        state.vote_targets.insert(*change.key(), target);
                    }
                }
            }
            TransactionAsset::Delegate { username } => {
                state.username_owner = overlay
                    .username_owner(username, &state.sender.address)
                    .await?;
            }
            _ => {}
        }
        Ok(state)
    }

    /// Lower `changes` to intents and fold them into the overlay.
    async fn merge(
        &self,
        overlay: &mut AccountOverlay<'_, R>,
        changes: Vec<AccountChange>,
        pending: &mut Pending,
    ) -> LedgerResult<()> {
        for change in changes {
            let account = overlay.by_address(&change.address).await?;
            let output = LedgerDeltaBuilder::merge_account(&account, &change.diff)?;
            pending.intents.extend(output.intents.into_iter().map(Some));
            pending.scratch.extend(output.scratch);
            overlay.apply(&change)?;
        }
        Ok(())
    }

    /// Inputs for landing or un-landing `round`, closed by `block`.
    async fn round_scope(
        &self,
        overlay: &mut AccountOverlay<'_, R>,
        block: &Block,
        round: u64,
        block_scratch: Vec<ScratchEntry>,
    ) -> LedgerResult<RoundScope> {
        let (first, _) = self.rounds.schedule().bounds(round)?;
        let mut blocks = self
            .reader
            .round_blocks(first, block.height.saturating_sub(1))
            .await?;
        blocks.push(block.summary());

        let mut scratch = self.reader.scratch_entries(round).await?;
        scratch.extend(block_scratch);

        let mut generators = BTreeMap::new();
        for summary in &blocks {
            let key = summary.generator_public_key;
            if generators.contains_key(&key) {
                continue;
            }
            if let Some(account) = overlay.find_public_key(&key).await? {
                generators.insert(key, account);
            }
        }

        Ok(RoundScope {
            round,
            block_id: block.id,
            blocks,
            delegates: self.reader.round_delegates(round).await?,
            scratch,
            generators,
        })
    }

    fn reject(&self, tx: &Transaction, error: TransactionError) -> LedgerError {
        debug!(
            id = %to_hex(&tx.header.id),
            tx_type = %tx.tx_type(),
            %error,
            "Transaction rejected"
        );
        error.into()
    }

    /// Rejection inside a block the network already accepted.
    fn diverge(&self, tx: &Transaction, height: u64, error: TransactionError) -> LedgerError {
        warn!(
            id = %to_hex(&tx.header.id),
            tx_type = %tx.tx_type(),
            height,
            %error,
            "Block transaction failed"
        );
        LedgerError::BlockApplication {
            height,
            source: error,
        }
    }

    async fn execute(&self, pending: Pending) -> LedgerResult<()> {
        let report = self.executor.execute(pending.intents, None).await?;
        debug!(
            statements = report.statements,
            batches = report.batches,
            rows = report.rows_affected,
            "Executed ledger intents"
        );
        Ok(())
    }

    /// Asset row of every header, keyed by transaction id.
    async fn load_asset_rows(
        &self,
        headers: &[TransactionHeader],
    ) -> LedgerResult<BTreeMap<Hash, Row>> {
        let mut ids: BTreeMap<TransactionType, Vec<Hash>> = BTreeMap::new();
        for header in headers {
            ids.entry(header.tx_type).or_default().push(header.id);
        }
        let mut rows = BTreeMap::new();
        for (tx_type, ids) in ids {
            for row in self.reader.asset_rows(tx_type, &ids).await? {
                let id = row
                    .get("transaction_id")
                    .and_then(Value::as_bytes)
                    .and_then(|b| Hash::try_from(b).ok())
                    .ok_or(InvariantError::MalformedColumn {
                        column: "transaction_id",
                    })?;
                rows.insert(id, row);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl<S, R, C> LedgerApi for LedgerService<S, R, C>
where
    S: StatementStore,
    R: AccountReader + RoundReader + AssetReader,
    C: CryptoService,
{
    async fn apply_block(&self, block: &Block) -> LedgerResult<Option<RoundSnapshot>> {
        let round = self.rounds.schedule().round(block.height);
        let tag = RoundTag {
            round,
            block_id: block.id,
        };
        let mut overlay = self.overlay();
        let mut pending = Pending::default();

        for tx in &block.transactions {
            let ctx = self.context(block.height, None);
            let state = self.tx_state(&mut overlay, tx).await?;
            let changes = self
                .registry
                .apply_unconfirmed(tx, &state, &ctx)
                .map_err(|e| self.diverge(tx, block.height, e))?;
            self.merge(&mut overlay, changes, &mut pending).await?;

            let ctx = self.context(block.height, Some(tag));
            let state = self.tx_state(&mut overlay, tx).await?;
            let changes = self
                .registry
                .apply(tx, &state, &ctx)
                .map_err(|e| self.diverge(tx, block.height, e))?;
            self.merge(&mut overlay, changes, &mut pending).await?;
            pending.intents.push(self.registry.db_save(tx));
        }
        pending
            .intents
            .push(Some(RoundLedger::merge_block_generator(&block.summary(), 1)));

        let mut snapshot = None;
        if self.rounds.schedule().is_last_in_round(block.height) {
            let block_scratch = std::mem::take(&mut pending.scratch);
            let scope = self.round_scope(&mut overlay, block, round, block_scratch).await?;
            let mut votes = Vec::new();
            for delegate in scope.touched_delegates() {
                if let Some(account) = overlay.find_public_key(&delegate).await? {
                    votes.push((delegate, account.vote));
                }
            }
            let captured = RoundSnapshot::capture(&scope, votes);
            let output = self.rounds.land(&scope)?;
            pending.intents.extend(output.intents.into_iter().map(Some));
            snapshot = Some(captured);
        }

        self.execute(pending).await?;
        self.tip.store(block.height, Ordering::Release);
        info!(
            height = block.height,
            round,
            transactions = block.transactions.len(),
            landed = snapshot.is_some(),
            "Applied block"
        );
        Ok(snapshot)
    }

    async fn undo_block(
        &self,
        block: &Block,
        snapshot: Option<&RoundSnapshot>,
        cause: RollbackCause,
    ) -> LedgerResult<()> {
        let round = self.rounds.schedule().round(block.height);
        let tag = RoundTag {
            round,
            block_id: block.id,
        };
        let mut overlay = self.overlay();
        let mut pending = Pending::default();

        if self.rounds.schedule().is_last_in_round(block.height) {
            let snapshot = snapshot.ok_or(InvariantError::MissingRoundSnapshot { round })?;
            let scope = self.round_scope(&mut overlay, block, round, Vec::new()).await?;
            let output = self
                .rounds
                .backward_land(&scope, snapshot, cause, block.height)?;
            for credit in &output.credits {
                overlay.by_address(&credit.address).await?;
                overlay.apply(credit)?;
            }
            pending.intents.extend(output.intents.into_iter().map(Some));
        }
        pending
            .intents
            .push(Some(RoundLedger::merge_block_generator(&block.summary(), -1)));

        for tx in block.transactions.iter().rev() {
            let ctx = self.context(block.height, Some(tag));
            let state = self.tx_state(&mut overlay, tx).await?;
            let changes = self
                .registry
                .undo(tx, &state, &ctx)
                .map_err(|e| self.diverge(tx, block.height, e))?;
            self.merge(&mut overlay, changes, &mut pending).await?;

            let ctx = self.context(block.height, None);
            let state = self.tx_state(&mut overlay, tx).await?;
            let changes = self
                .registry
                .undo_unconfirmed(tx, &state, &ctx)
                .map_err(|e| self.diverge(tx, block.height, e))?;
            self.merge(&mut overlay, changes, &mut pending).await?;
            pending.intents.push(self.registry.db_delete(tx));
        }

        self.execute(pending).await?;
        self.tip
            .store(block.height.saturating_sub(1), Ordering::Release);
        info!(height = block.height, round, %cause, "Reverted block");
        Ok(())
    }

    async fn apply_unconfirmed(&self, tx: &Transaction) -> LedgerResult<()> {
        let mut overlay = self.overlay();
        let mut pending = Pending::default();
        let ctx = self.context(self.tip() + 1, None);
        let state = self.tx_state(&mut overlay, tx).await?;
        let changes = self
            .registry
            .apply_unconfirmed(tx, &state, &ctx)
            .map_err(|e| self.reject(tx, e))?;
        self.merge(&mut overlay, changes, &mut pending).await?;
        self.execute(pending).await
    }

    async fn undo_unconfirmed(&self, tx: &Transaction) -> LedgerResult<()> {
        let mut overlay = self.overlay();
        let mut pending = Pending::default();
        let ctx = self.context(self.tip() + 1, None);
        let state = self.tx_state(&mut overlay, tx).await?;
        let changes = self
            .registry
            .undo_unconfirmed(tx, &state, &ctx)
            .map_err(|e| self.reject(tx, e))?;
        self.merge(&mut overlay, changes, &mut pending).await?;
        self.execute(pending).await
    }

    async fn verify(&self, tx: &Transaction, height: u64) -> LedgerResult<()> {
        let mut overlay = self.overlay();
        let state = self.tx_state(&mut overlay, tx).await?;
        let ctx = self.context(height, None);
        self.registry
            .verify(tx, &state, &ctx, &self.crypto)
            .map_err(|e| self.reject(tx, e))
    }

    async fn ready(&self, tx: &Transaction) -> LedgerResult<bool> {
        let mut overlay = self.overlay();
        let sender = overlay.sender(&tx.header.sender_public_key).await?;
        Ok(self.registry.ready(tx, &sender))
    }

    fn normalize(&self, raw: &RawTransaction) -> LedgerResult<Transaction> {
        Ok(self.registry.normalize(raw, &self.crypto)?)
    }

    async fn attach_assets(
        &self,
        headers: Vec<TransactionHeader>,
    ) -> LedgerResult<Vec<Transaction>> {
        let rows = self.load_asset_rows(&headers).await?;
        let empty = Row::new();
        headers
            .into_iter()
            .map(|header| -> LedgerResult<Transaction> {
                let handler = self.registry.handler(header.tx_type);
                let row = match handler.logic().asset_collection() {
                    None => &empty,
                    Some(_) => rows.get(&header.id).ok_or_else(|| {
                        TransactionError::Malformed(format!(
                            "missing asset row for {}",
                            to_hex(&header.id)
                        ))
                    })?,
                };
                let asset = self.registry.db_read(header.tx_type, row)?;
                Ok(Transaction { header, asset })
            })
            .collect()
    }
}
