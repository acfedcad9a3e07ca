//! # Error Types
//!
//! Errors shared across subsystems.
//!
//! `InvariantError` is the "defect" class of the ledger taxonomy: arithmetic or
//! round-accounting inconsistencies. They are never recoverable locally; a node
//! hitting one inside confirmed application must halt and resync.

use thiserror::Error;

/// Key, signature and address decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Hex decoding failed.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded byte length does not match the key type.
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Arithmetic or accounting inconsistency. Indicates a defect, never bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    /// Checked arithmetic overflowed or underflowed.
    #[error("Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    /// The fee remainder fell outside `[0, delegates)`.
    #[error("Fee remainder {remainder} out of range for {delegates} delegates")]
    RemainderOutOfRange { remainder: u64, delegates: u64 },

    /// A round must be settled over exactly one entry per slot.
    #[error("Round {round} has {actual} slots, expected {expected}")]
    SlotCountMismatch {
        round: u64,
        expected: u64,
        actual: u64,
    },

    /// A round has no delegates.
    #[error("Round {round} has an empty delegate set")]
    EmptyDelegateSet { round: u64 },

    /// Round bounds are not contiguous.
    #[error("Round bounds broken at round {round}: first {first}, last {last}")]
    RoundBounds { round: u64, first: u64, last: u64 },

    /// A stored ledger column holds a value outside its domain.
    #[error("Column {column} holds out-of-range value {value}")]
    ColumnOutOfRange { column: &'static str, value: i64 },

    /// A stored ledger column has the wrong type or encoding.
    #[error("Column {column} is malformed")]
    MalformedColumn { column: &'static str },

    /// A round-closing block was rolled back without the snapshot taken at landing.
    #[error("Missing round snapshot for round {round}")]
    MissingRoundSnapshot { round: u64 },

    /// The supplied snapshot belongs to another round.
    #[error("Round snapshot mismatch: expected round {expected}, got {actual}")]
    SnapshotRoundMismatch { expected: u64, actual: u64 },

    /// A round delegate could not be resolved to an account.
    #[error("Unknown round delegate {public_key}")]
    UnknownRoundDelegate { public_key: String },
}
