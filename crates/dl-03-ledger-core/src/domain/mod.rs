//! Ledger domain: accounts and their diffs, transactions and their lifecycle,
//! blocks and round landing. Everything here is pure; storage is reached only
//! through the intents it returns.

pub mod account;
pub mod block;
pub mod delta;
pub mod errors;
pub mod fees;
pub mod lifecycle;
pub mod round;
pub mod transaction;

pub use account::{Account, AccountKey, AccountMemberships};
pub use block::Block;
pub use delta::{
    AccountDiff, LedgerDeltaBuilder, MembershipChange, MembershipDiff, MergeOutput, RoundTag,
    ScratchEntry,
};
pub use errors::{LedgerError, LedgerResult, TransactionError};
pub use fees::{FeeMilestone, FeeSchedule, Fees};
pub use lifecycle::{
    AccountChange, TransactionHandler, TransactionLogic, TransactionRegistry, TxContext, TxState,
};
pub use round::{RollbackCause, RoundLedger, RoundOutput, RoundScope, RoundSnapshot};
pub use transaction::{
    RawTransaction, Transaction, TransactionAsset, TransactionHeader, TransactionType,
};
