//! # Ledger Errors
//!
//! Three failure classes:
//!
//! - `TransactionError`: the transaction or account state breaks a rule.
//!   Recoverable; state is left untouched and the pool drops the transaction.
//! - `InvariantError`: arithmetic or round accounting is inconsistent. A defect.
//! - Storage failures (`ExecutorError`, `StoreError`), propagated unchanged.
//!
//! Invariant and storage failures while applying a consensus-accepted block
//! mean this node has diverged; the caller must halt and resync.

use crate::domain::transaction::TransactionType;
use dl_01_round_economics::EconomicsError;
use dl_02_storage_intents::{ExecutorError, StoreError};
use shared_types::{Amount, InvariantError, KeyError};
use thiserror::Error;

/// Validation failures of a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("Unknown transaction type {0}")]
    UnknownType(u8),

    #[error("Asset does not match transaction type {expected}")]
    AssetMismatch { expected: TransactionType },

    #[error("Malformed transaction: {0}")]
    Malformed(String),

    #[error("Sender public key does not match sender address")]
    SenderMismatch,

    #[error("Invalid transaction signature")]
    InvalidSignature,

    #[error("Missing second signature")]
    MissingSecondSignature,

    #[error("Invalid second signature")]
    InvalidSecondSignature,

    #[error("Fee mismatch: expected {expected}, got {actual}")]
    FeeMismatch { expected: Amount, actual: Amount },

    #[error("Insufficient balance in {address}: balance {balance}, required {required}")]
    InsufficientBalance {
        address: String,
        balance: Amount,
        required: Amount,
    },

    #[error("Missing recipient")]
    MissingRecipient,

    #[error("Unexpected recipient")]
    UnexpectedRecipient,

    #[error("Invalid amount {amount}")]
    InvalidAmount { amount: Amount },

    #[error("Second signature already registered")]
    SecondSignatureExists,

    #[error("Account is already a delegate")]
    AlreadyDelegate,

    #[error("Username {username} is already taken")]
    UsernameTaken { username: String },

    #[error("Invalid username: {reason}")]
    InvalidUsername { reason: &'static str },

    #[error("Vote recipient must be the sender")]
    VoteRecipientMismatch,

    #[error("Invalid vote count {count}, allowed 1..={max}")]
    InvalidVoteCount { count: usize, max: usize },

    #[error("Duplicate vote entry for {delegate}")]
    DuplicateVote { delegate: String },

    #[error("Account {delegate} is not a delegate")]
    NotADelegate { delegate: String },

    #[error("Already voted for {delegate}")]
    AlreadyVoted { delegate: String },

    #[error("Not voted for {delegate}")]
    NotVoted { delegate: String },

    #[error("Too many votes: {count}, maximum {max}")]
    TooManyVotes { count: usize, max: usize },

    #[error("Multisignature already registered")]
    MultisignatureExists,

    #[error("Invalid keysgroup: {reason}")]
    InvalidKeysgroup { reason: &'static str },

    #[error("Invalid multisignature min {min}")]
    InvalidMin { min: u32 },

    #[error("Invalid multisignature lifetime {lifetime}")]
    InvalidLifetime { lifetime: u32 },

    #[error("Invalid multisignature signature")]
    InvalidMultisignature,

    #[error("Multisignature not ready: {collected} of {required} signatures")]
    NotReady { collected: usize, required: usize },
}

impl TransactionError {
    /// Validation failures never leave partial state behind.
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

/// Top-level ledger error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// A transaction of an accepted block could not be applied or undone.
    #[error("Block {height} diverges: {source}")]
    BlockApplication {
        height: u64,
        source: TransactionError,
    },

    #[error("Invariant violated: {0}")]
    Invariant(#[from] InvariantError),

    #[error("Intent execution failed: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Store read failed: {0}")]
    Store(#[from] StoreError),

    #[error("Economics: {0}")]
    Economics(#[from] EconomicsError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LedgerError {
    /// Only validation failures may be handled locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LedgerError::Transaction(e) if e.is_recoverable())
    }

    /// Failures that signal divergence when hit during block application.
    pub fn requires_halt(&self) -> bool {
        match self {
            LedgerError::BlockApplication { .. }
            | LedgerError::Invariant(_)
            | LedgerError::Executor(_)
            | LedgerError::Store(_) => true,
            LedgerError::Economics(e) => matches!(e, EconomicsError::Invariant(_)),
            LedgerError::Transaction(_) | LedgerError::Config(_) => false,
        }
    }
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let validation: LedgerError = TransactionError::AlreadyDelegate.into();
        assert!(validation.is_recoverable());
        assert!(!validation.requires_halt());

        let defect: LedgerError = InvariantError::MissingRoundSnapshot { round: 4 }.into();
        assert!(!defect.is_recoverable());
        assert!(defect.requires_halt());

        let storage: LedgerError = StoreError::Backend("disk".into()).into();
        assert!(storage.requires_halt());

        let diverged = LedgerError::BlockApplication {
            height: 7,
            source: TransactionError::AlreadyDelegate,
        };
        assert!(!diverged.is_recoverable());
        assert!(diverged.requires_halt());
    }
}
