//! # Persisted Collections
//!
//! The closed set of collections the ledger core writes to, with their
//! primary keys and insert-time column defaults.

use crate::domain::values::{row, Row, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Collection {
    /// `mem_accounts`, keyed by address.
    Accounts,
    /// Confirmed votes: `mem_accounts2delegates`.
    AccountDelegates,
    /// Unconfirmed votes: `mem_accounts2u_delegates`.
    AccountUnconfirmedDelegates,
    /// Confirmed multisignature keysgroup: `mem_accounts2multisignatures`.
    AccountMultisignatures,
    /// Unconfirmed multisignature keysgroup: `mem_accounts2u_multisignatures`.
    AccountUnconfirmedMultisignatures,
    /// Per-round scratch rows of vote-weight deltas: `mem_round`.
    RoundScratch,
    /// Rollback audit: `round_rollbacks`.
    RoundRollbacks,
    /// Vote transaction assets.
    Votes,
    /// Delegate registration assets.
    Delegates,
    /// Second signature assets.
    Signatures,
    /// Multisignature registration assets.
    Multisignatures,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::Accounts,
        Collection::AccountDelegates,
        Collection::AccountUnconfirmedDelegates,
        Collection::AccountMultisignatures,
        Collection::AccountUnconfirmedMultisignatures,
        Collection::RoundScratch,
        Collection::RoundRollbacks,
        Collection::Votes,
        Collection::Delegates,
        Collection::Signatures,
        Collection::Multisignatures,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Accounts => "mem_accounts",
            Collection::AccountDelegates => "mem_accounts2delegates",
            Collection::AccountUnconfirmedDelegates => "mem_accounts2u_delegates",
            Collection::AccountMultisignatures => "mem_accounts2multisignatures",
            Collection::AccountUnconfirmedMultisignatures => "mem_accounts2u_multisignatures",
            Collection::RoundScratch => "mem_round",
            Collection::RoundRollbacks => "round_rollbacks",
            Collection::Votes => "votes",
            Collection::Delegates => "delegates",
            Collection::Signatures => "signatures",
            Collection::Multisignatures => "multisignatures",
        }
    }

    /// Primary key columns. Empty for append-only collections.
    pub fn primary_key(&self) -> &'static [&'static str] {
        match self {
            Collection::Accounts => &["address"],
            Collection::AccountDelegates
            | Collection::AccountUnconfirmedDelegates
            | Collection::AccountMultisignatures
            | Collection::AccountUnconfirmedMultisignatures => &["account_id", "dependent_id"],
            Collection::RoundScratch | Collection::RoundRollbacks => &[],
            Collection::Votes
            | Collection::Delegates
            | Collection::Signatures
            | Collection::Multisignatures => &["transaction_id"],
        }
    }

    /// Columns filled in when an insert omits them.
    pub fn defaults(&self) -> Row {
        match self {
            Collection::Accounts => row([
                ("public_key", Value::Null),
                ("second_public_key", Value::Null),
                ("balance", Value::Int(0)),
                ("u_balance", Value::Int(0)),
                ("vote", Value::Int(0)),
                ("username", Value::Null),
                ("u_username", Value::Null),
                ("is_delegate", Value::Bool(false)),
                ("u_is_delegate", Value::Bool(false)),
                ("second_signature", Value::Bool(false)),
                ("u_second_signature", Value::Bool(false)),
                ("multimin", Value::Int(0)),
                ("u_multimin", Value::Int(0)),
                ("multilifetime", Value::Int(0)),
                ("u_multilifetime", Value::Int(0)),
                ("produced_blocks", Value::Int(0)),
                ("missed_blocks", Value::Int(0)),
                ("fees", Value::Int(0)),
                ("rewards", Value::Int(0)),
                ("virgin", Value::Bool(true)),
                ("block_id", Value::Null),
            ]),
            _ => Row::new(),
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
