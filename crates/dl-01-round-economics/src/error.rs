//! Error types for round economics

use shared_types::InvariantError;
use thiserror::Error;

/// Result type alias for round economics operations
pub type Result<T> = std::result::Result<T, EconomicsError>;

/// Errors raised by slot, round and reward computations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EconomicsError {
    /// Heights start at 1
    #[error("Invalid height: {height}, heights start at 1")]
    InvalidHeight {
        /// Offending height
        height: u64,
    },

    /// A milestone table or round schedule is malformed
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Accounting inconsistency
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}
