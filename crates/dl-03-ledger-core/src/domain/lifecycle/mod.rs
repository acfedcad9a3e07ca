//! # Transaction Lifecycle
//!
//! One `TransactionLogic` implementation per transaction kind, held in a
//! closed `TransactionHandler` union and looked up by type tag through the
//! `TransactionRegistry` built at startup.
//!
//! The registry wraps every kind with the shared behaviour:
//!
//! - `apply` debits `amount + fee` from the sender, then applies the kind.
//! - `undo` reverts the kind first, then credits the sender.
//! - The unconfirmed variants do the same on `u_balance` and `u_*` fields.
//!
//! Nothing here mutates state. Every operation returns the `AccountChange`s
//! to merge, or a `TransactionError` and no changes at all.

mod delegate;
mod multisignature;
mod second_signature;
mod send;
mod vote;

pub use delegate::{validate_username, DelegateLogic};
pub use multisignature::MultisignatureLogic;
pub use second_signature::SecondSignatureLogic;
pub use send::SendLogic;
pub use vote::VoteLogic;

use crate::config::LedgerConfig;
use crate::domain::account::Account;
use crate::domain::delta::{AccountDiff, MembershipChange, MembershipDiff, RoundTag};
use crate::domain::errors::TransactionError;
use crate::domain::fees::Fees;
use crate::domain::transaction::{
    sha256, RawTransaction, Transaction, TransactionAsset, TransactionHeader, TransactionType,
};
use crate::ports::CryptoService;
use dl_02_storage_intents::{Collection, Predicate, Row, StorageIntent, Value};
use shared_types::{
    parse_address, parse_public_key, parse_signature, to_hex, Address, Amount, Hash, PublicKey,
    ZERO_HASH,
};
use std::collections::BTreeMap;

// =============================================================================
// CONTEXT AND STATE
// =============================================================================

/// Where a transaction is being processed.
#[derive(Debug, Clone, Copy)]
pub struct TxContext<'a> {
    pub height: u64,
    /// Set when confirmed state changes inside a block.
    pub round: Option<RoundTag>,
    pub config: &'a LedgerConfig,
}

impl TxContext<'_> {
    pub fn fees(&self) -> Fees {
        self.config.fees.fees_at(self.height)
    }
}

/// Accounts a transaction reads, as of just before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxState {
    pub sender: Account,
    /// Vote targets by public key. Vote transactions only.
    pub vote_targets: BTreeMap<PublicKey, Account>,
    /// Current holder of the requested username. Delegate transactions only.
    pub username_owner: Option<Account>,
}

impl TxState {
    pub fn new(sender: Account) -> Self {
        Self {
            sender,
            vote_targets: BTreeMap::new(),
            username_owner: None,
        }
    }
}

/// A diff to merge into one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChange {
    pub address: Address,
    pub diff: AccountDiff,
}

impl AccountChange {
    pub fn new(address: Address, diff: AccountDiff) -> Self {
        Self { address, diff }
    }
}

// =============================================================================
// PER-KIND CAPABILITIES
// =============================================================================

/// Behaviour specific to one transaction kind.
pub trait TransactionLogic: Send + Sync {
    fn calculate_fee(&self, tx: &Transaction, sender: &Account, fees: &Fees) -> Amount;

    /// Kind-specific checks; signatures and fee are checked by the registry.
    fn verify(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<(), TransactionError>;

    /// Asset part of the canonical bytes.
    fn asset_bytes(&self, asset: &TransactionAsset) -> Vec<u8>;

    fn normalize_asset(
        &self,
        raw: &serde_json::Value,
    ) -> Result<TransactionAsset, TransactionError>;

    fn apply(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError>;

    fn undo(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError>;

    fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError>;

    fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError>;

    /// Collection holding this kind's asset rows.
    fn asset_collection(&self) -> Option<Collection>;

    fn db_save(&self, tx: &Transaction) -> Option<StorageIntent>;

    fn db_read(&self, row: &Row) -> Result<TransactionAsset, TransactionError>;

    /// Co-signatures needed before the transaction may enter unconfirmed state.
    fn required_signatures(&self, _tx: &Transaction, sender: &Account) -> usize {
        if sender.is_multisignature() {
            sender.multimin as usize
        } else {
            0
        }
    }

    fn ready(&self, tx: &Transaction, sender: &Account) -> bool {
        tx.header.signatures.len() >= self.required_signatures(tx, sender)
    }
}

/// Closed set of transaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionHandler {
    Send(SendLogic),
    SecondSignature(SecondSignatureLogic),
    Delegate(DelegateLogic),
    Vote(VoteLogic),
    Multisignature(MultisignatureLogic),
}

impl TransactionHandler {
    pub fn for_type(tx_type: TransactionType) -> Self {
        match tx_type {
            TransactionType::Send => TransactionHandler::Send(SendLogic),
            TransactionType::SecondSignature => {
                TransactionHandler::SecondSignature(SecondSignatureLogic)
            }
            TransactionType::Delegate => TransactionHandler::Delegate(DelegateLogic),
            TransactionType::Vote => TransactionHandler::Vote(VoteLogic),
            TransactionType::Multisignature => {
                TransactionHandler::Multisignature(MultisignatureLogic)
            }
        }
    }

    pub fn tx_type(&self) -> TransactionType {
        match self {
            TransactionHandler::Send(_) => TransactionType::Send,
            TransactionHandler::SecondSignature(_) => TransactionType::SecondSignature,
            TransactionHandler::Delegate(_) => TransactionType::Delegate,
            TransactionHandler::Vote(_) => TransactionType::Vote,
            TransactionHandler::Multisignature(_) => TransactionType::Multisignature,
        }
    }

    pub fn logic(&self) -> &dyn TransactionLogic {
        match self {
            TransactionHandler::Send(logic) => logic,
            TransactionHandler::SecondSignature(logic) => logic,
            TransactionHandler::Delegate(logic) => logic,
            TransactionHandler::Vote(logic) => logic,
            TransactionHandler::Multisignature(logic) => logic,
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Type tag to handler table.
#[derive(Debug, Clone)]
pub struct TransactionRegistry {
    handlers: [TransactionHandler; 5],
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: TransactionType::ALL.map(TransactionHandler::for_type),
        }
    }

    pub fn handler(&self, tx_type: TransactionType) -> &TransactionHandler {
        &self.handlers[tx_type as usize]
    }

    fn logic(&self, tx: &Transaction) -> Result<&dyn TransactionLogic, TransactionError> {
        if tx.asset.tx_type() != tx.header.tx_type {
            return Err(TransactionError::AssetMismatch {
                expected: tx.header.tx_type,
            });
        }
        Ok(self.handler(tx.header.tx_type).logic())
    }

    pub fn calculate_fee(
        &self,
        tx: &Transaction,
        sender: &Account,
        height: u64,
        config: &LedgerConfig,
    ) -> Amount {
        self.handler(tx.header.tx_type)
            .logic()
            .calculate_fee(tx, sender, &config.fees.fees_at(height))
    }

    /// Canonical bytes (`getBytes`).
    pub fn get_bytes(
        &self,
        tx: &Transaction,
        skip_signature: bool,
        skip_second_signature: bool,
    ) -> Vec<u8> {
        let asset = self.handler(tx.header.tx_type).logic().asset_bytes(&tx.asset);
        tx.bytes(&asset, skip_signature, skip_second_signature)
    }

    /// Hash the sender signs.
    pub fn signing_hash(&self, tx: &Transaction) -> Hash {
        sha256(&self.get_bytes(tx, true, true))
    }

    /// Hash the second signature covers: everything but itself.
    pub fn second_signing_hash(&self, tx: &Transaction) -> Hash {
        sha256(&self.get_bytes(tx, false, true))
    }

    /// Transaction id; also the hash co-signers sign.
    pub fn transaction_id(&self, tx: &Transaction) -> Hash {
        sha256(&self.get_bytes(tx, false, false))
    }

    /// Full validation against `state`.
    pub fn verify(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
        crypto: &dyn CryptoService,
    ) -> Result<(), TransactionError> {
        let logic = self.logic(tx)?;
        let header = &tx.header;
        let sender = &state.sender;

        if crypto.derive_address(&header.sender_public_key) != header.sender_id
            || sender.address != header.sender_id
            || sender.public_key.is_some_and(|key| key != header.sender_public_key)
        {
            return Err(TransactionError::SenderMismatch);
        }

        let expected = logic.calculate_fee(tx, sender, &ctx.fees());
        if header.fee != expected {
            return Err(TransactionError::FeeMismatch {
                expected,
                actual: header.fee,
            });
        }

        if !crypto.verify(&self.signing_hash(tx), &header.signature, &header.sender_public_key) {
            return Err(TransactionError::InvalidSignature);
        }

        let second_key = sender.second_public_key.filter(|_| sender.second_signature);
        match (second_key, &header.sign_signature) {
            (Some(key), Some(signature)) => {
                if !crypto.verify(&self.second_signing_hash(tx), signature, &key) {
                    return Err(TransactionError::InvalidSecondSignature);
                }
            }
            (Some(_), None) => return Err(TransactionError::MissingSecondSignature),
            (None, Some(_)) => {
                return Err(TransactionError::Malformed(
                    "second signature on an account without one".into(),
                ))
            }
            (None, None) => {}
        }

        self.verify_cosignatures(tx, sender, crypto)?;
        logic.verify(tx, state, ctx)
    }

    /// Every co-signature must come from a distinct keysgroup member.
    fn verify_cosignatures(
        &self,
        tx: &Transaction,
        sender: &Account,
        crypto: &dyn CryptoService,
    ) -> Result<(), TransactionError> {
        let mut signers: Vec<PublicKey> = match &tx.asset {
            TransactionAsset::Multisignature { keysgroup, .. } => {
                keysgroup.added().copied().collect()
            }
            _ => sender.multisignatures.iter().copied().collect(),
        };
        if tx.header.signatures.is_empty() {
            return Ok(());
        }
        let hash = self.transaction_id(tx);
        for signature in &tx.header.signatures {
            let signer = signers
                .iter()
                .position(|key| crypto.verify(&hash, signature, key))
                .ok_or(TransactionError::InvalidMultisignature)?;
            signers.swap_remove(signer);
        }
        Ok(())
    }

    pub fn apply(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let logic = self.logic(tx)?;
        let (required, delta) = spend(tx)?;
        let sender = &state.sender;
        if sender.balance < required {
            return Err(insufficient(sender, sender.balance, required));
        }

        let debit = AccountDiff {
            balance: -delta,
            ..Default::default()
        };
        let mut changes = vec![AccountChange::new(sender.address, debit.with_round(ctx.round))];
        changes.extend(tagged(logic.apply(tx, state, ctx)?, ctx.round));
        Ok(changes)
    }

    pub fn undo(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let logic = self.logic(tx)?;
        let (_, delta) = spend(tx)?;
        let credit = AccountDiff {
            balance: delta,
            ..Default::default()
        };
        let mut changes = tagged(logic.undo(tx, state, ctx)?, ctx.round);
        changes.push(AccountChange::new(state.sender.address, credit.with_round(ctx.round)));
        Ok(changes)
    }

    pub fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let logic = self.logic(tx)?;
        let sender = &state.sender;
        let required_signatures = logic.required_signatures(tx, sender);
        if tx.header.signatures.len() < required_signatures {
            return Err(TransactionError::NotReady {
                collected: tx.header.signatures.len(),
                required: required_signatures,
            });
        }

        let (required, delta) = spend(tx)?;
        if sender.u_balance < required {
            return Err(insufficient(sender, sender.u_balance, required));
        }

        let debit = AccountDiff {
            u_balance: -delta,
            ..Default::default()
        };
        let mut changes = vec![AccountChange::new(sender.address, debit)];
        changes.extend(logic.apply_unconfirmed(tx, state, ctx)?);
        Ok(changes)
    }

    pub fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let logic = self.logic(tx)?;
        let (_, delta) = spend(tx)?;
        let credit = AccountDiff {
            u_balance: delta,
            ..Default::default()
        };
        let mut changes = logic.undo_unconfirmed(tx, state, ctx)?;
        changes.push(AccountChange::new(state.sender.address, credit));
        Ok(changes)
    }

    pub fn ready(&self, tx: &Transaction, sender: &Account) -> bool {
        self.handler(tx.header.tx_type).logic().ready(tx, sender)
    }

    pub fn db_save(&self, tx: &Transaction) -> Option<StorageIntent> {
        self.handler(tx.header.tx_type).logic().db_save(tx)
    }

    /// Removes the asset row written by `db_save`.
    pub fn db_delete(&self, tx: &Transaction) -> Option<StorageIntent> {
        let collection = self.handler(tx.header.tx_type).logic().asset_collection()?;
        Some(StorageIntent::Remove {
            collection,
            predicate: by_transaction(&tx.header.id),
        })
    }

    pub fn db_read(
        &self,
        tx_type: TransactionType,
        row: &Row,
    ) -> Result<TransactionAsset, TransactionError> {
        self.handler(tx_type).logic().db_read(row)
    }

    /// `objectNormalize`: decode a raw record into a typed transaction with
    /// derived sender address and id.
    pub fn normalize(
        &self,
        raw: &RawTransaction,
        crypto: &dyn CryptoService,
    ) -> Result<Transaction, TransactionError> {
        let tx_type = TransactionType::try_from(raw.tx_type)?;
        let sender_public_key = parse_public_key(&raw.sender_public_key)?;
        let recipient_id = raw.recipient_id.as_deref().map(parse_address).transpose()?;
        let signature = parse_signature(&raw.signature)?;
        let sign_signature = raw.sign_signature.as_deref().map(parse_signature).transpose()?;
        let signatures = raw
            .signatures
            .iter()
            .map(|s| parse_signature(s))
            .collect::<Result<Vec<_>, _>>()?;
        let asset = self.handler(tx_type).logic().normalize_asset(&raw.asset)?;

        let mut tx = Transaction {
            header: TransactionHeader {
                id: ZERO_HASH,
                tx_type,
                sender_public_key,
                sender_id: crypto.derive_address(&sender_public_key),
                recipient_id,
                amount: raw.amount,
                fee: raw.fee,
                timestamp: raw.timestamp,
                signature,
                sign_signature,
                signatures,
            },
            asset,
        };
        tx.header.id = self.transaction_id(&tx);
        Ok(tx)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// `amount + fee`, as an amount and as a column delta.
fn spend(tx: &Transaction) -> Result<(Amount, i64), TransactionError> {
    let total = tx
        .header
        .amount
        .checked_add(tx.header.fee)
        .ok_or(TransactionError::InvalidAmount {
            amount: tx.header.amount,
        })?;
    let delta =
        i64::try_from(total).map_err(|_| TransactionError::InvalidAmount { amount: total })?;
    Ok((total, delta))
}

fn insufficient(sender: &Account, balance: Amount, required: Amount) -> TransactionError {
    TransactionError::InsufficientBalance {
        address: to_hex(&sender.address),
        balance,
        required,
    }
}

fn tagged(changes: Vec<AccountChange>, round: Option<RoundTag>) -> Vec<AccountChange> {
    changes
        .into_iter()
        .map(|change| AccountChange {
            diff: change.diff.with_round(round),
            ..change
        })
        .collect()
}

pub(crate) fn by_transaction(id: &Hash) -> Predicate {
    Predicate::eq("transaction_id", *id)
}

pub(crate) fn asset_str<'a>(
    raw: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, TransactionError> {
    raw.get(field)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| TransactionError::Malformed(format!("asset.{field} must be a string")))
}

pub(crate) fn asset_u32(raw: &serde_json::Value, field: &str) -> Result<u32, TransactionError> {
    raw.get(field)
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            TransactionError::Malformed(format!("asset.{field} must be an unsigned integer"))
        })
}

/// `["+hex", "-hex", ...]` under `field`.
pub(crate) fn asset_membership(
    raw: &serde_json::Value,
    field: &str,
) -> Result<MembershipDiff, TransactionError> {
    let entries = raw
        .get(field)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| TransactionError::Malformed(format!("asset.{field} must be an array")))?;
    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| {
                    TransactionError::Malformed(format!("asset.{field} entries must be strings"))
                })?
                .parse::<MembershipChange>()
        })
        .collect()
}

pub(crate) fn row_text<'a>(row: &'a Row, column: &str) -> Result<&'a str, TransactionError> {
    row.get(column)
        .and_then(Value::as_text)
        .ok_or_else(|| TransactionError::Malformed(format!("asset row is missing {column}")))
}

pub(crate) fn row_u32(row: &Row, column: &str) -> Result<u32, TransactionError> {
    row.get(column)
        .and_then(Value::as_int)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| TransactionError::Malformed(format!("asset row is missing {column}")))
}
