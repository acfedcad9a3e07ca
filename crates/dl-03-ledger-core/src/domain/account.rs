//! # Accounts
//!
//! In-memory view of a `mem_accounts` row plus its membership rows.
//! Every `u_` field is the unconfirmed twin of the confirmed field.

use dl_02_storage_intents::{Collection, Predicate, Row, Value};
use serde::{Deserialize, Serialize};
use shared_types::{to_hex, Address, Amount, Hash, InvariantError, PublicKey};
use std::collections::BTreeSet;

/// How an account is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKey {
    Address(Address),
    PublicKey(PublicKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub public_key: Option<PublicKey>,
    pub second_public_key: Option<PublicKey>,
    pub balance: Amount,
    pub u_balance: Amount,
    /// Sum of the confirmed balances of every account voting for this one.
    pub vote: Amount,
    pub username: Option<String>,
    pub u_username: Option<String>,
    pub is_delegate: bool,
    pub u_is_delegate: bool,
    pub second_signature: bool,
    pub u_second_signature: bool,
    /// Delegates this account votes for.
    pub delegates: BTreeSet<PublicKey>,
    pub u_delegates: BTreeSet<PublicKey>,
    /// Multisignature keysgroup.
    pub multisignatures: BTreeSet<PublicKey>,
    pub u_multisignatures: BTreeSet<PublicKey>,
    pub multimin: u32,
    pub u_multimin: u32,
    pub multilifetime: u32,
    pub u_multilifetime: u32,
    pub produced_blocks: u64,
    pub missed_blocks: u64,
    pub fees: Amount,
    pub rewards: Amount,
    /// Set until the first balance-reducing unconfirmed mutation.
    pub virgin: bool,
    /// Block of the last confirmed change.
    pub block_id: Option<Hash>,
}

impl Account {
    /// Fresh account as it is created lazily on first reference.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            public_key: None,
            second_public_key: None,
            balance: 0,
            u_balance: 0,
            vote: 0,
            username: None,
            u_username: None,
            is_delegate: false,
            u_is_delegate: false,
            second_signature: false,
            u_second_signature: false,
            delegates: BTreeSet::new(),
            u_delegates: BTreeSet::new(),
            multisignatures: BTreeSet::new(),
            u_multisignatures: BTreeSet::new(),
            multimin: 0,
            u_multimin: 0,
            multilifetime: 0,
            u_multilifetime: 0,
            produced_blocks: 0,
            missed_blocks: 0,
            fees: 0,
            rewards: 0,
            virgin: true,
            block_id: None,
        }
    }

    pub fn with_public_key(address: Address, public_key: PublicKey) -> Self {
        Self {
            public_key: Some(public_key),
            ..Self::new(address)
        }
    }

    /// Confirmed multisignature configured.
    pub fn is_multisignature(&self) -> bool {
        !self.multisignatures.is_empty()
    }

    /// Build from a `mem_accounts` row and the account's membership rows.
    pub fn from_rows(row: &Row, memberships: &AccountMemberships) -> Result<Self, InvariantError> {
        Ok(Self {
            address: bytes(row, "address")?.ok_or(InvariantError::MalformedColumn {
                column: "address",
            })?,
            public_key: bytes(row, "public_key")?,
            second_public_key: bytes(row, "second_public_key")?,
            balance: amount(row, "balance")?,
            u_balance: amount(row, "u_balance")?,
            vote: amount(row, "vote")?,
            username: text(row, "username")?,
            u_username: text(row, "u_username")?,
            is_delegate: flag(row, "is_delegate")?,
            u_is_delegate: flag(row, "u_is_delegate")?,
            second_signature: flag(row, "second_signature")?,
            u_second_signature: flag(row, "u_second_signature")?,
            delegates: memberships.delegates.clone(),
            u_delegates: memberships.u_delegates.clone(),
            multisignatures: memberships.multisignatures.clone(),
            u_multisignatures: memberships.u_multisignatures.clone(),
            multimin: small(row, "multimin")?,
            u_multimin: small(row, "u_multimin")?,
            multilifetime: small(row, "multilifetime")?,
            u_multilifetime: small(row, "u_multilifetime")?,
            produced_blocks: amount(row, "produced_blocks")?,
            missed_blocks: amount(row, "missed_blocks")?,
            fees: amount(row, "fees")?,
            rewards: amount(row, "rewards")?,
            virgin: flag(row, "virgin")?,
            block_id: bytes(row, "block_id")?,
        })
    }
}

/// Membership rows of one account, split by collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountMemberships {
    pub delegates: BTreeSet<PublicKey>,
    pub u_delegates: BTreeSet<PublicKey>,
    pub multisignatures: BTreeSet<PublicKey>,
    pub u_multisignatures: BTreeSet<PublicKey>,
}

impl AccountMemberships {
    pub const COLLECTIONS: [Collection; 4] = [
        Collection::AccountDelegates,
        Collection::AccountUnconfirmedDelegates,
        Collection::AccountMultisignatures,
        Collection::AccountUnconfirmedMultisignatures,
    ];

    /// Record the `dependent_id` of `rows` under `collection`.
    pub fn extend(&mut self, collection: Collection, rows: &[Row]) -> Result<(), InvariantError> {
        let target = match collection {
            Collection::AccountDelegates => &mut self.delegates,
            Collection::AccountUnconfirmedDelegates => &mut self.u_delegates,
            Collection::AccountMultisignatures => &mut self.multisignatures,
            Collection::AccountUnconfirmedMultisignatures => &mut self.u_multisignatures,
            _ => return Ok(()),
        };
        for row in rows {
            let key = row
                .get("dependent_id")
                .and_then(Value::as_text)
                .and_then(|hex| shared_types::parse_public_key(hex).ok())
                .ok_or(InvariantError::MalformedColumn {
                    column: "dependent_id",
                })?;
            target.insert(key);
        }
        Ok(())
    }
}

/// Predicate selecting an account by address.
pub fn by_address(address: &Address) -> Predicate {
    Predicate::eq("address", *address)
}

/// Predicate selecting an account by public key.
pub fn by_public_key(public_key: &PublicKey) -> Predicate {
    Predicate::eq("public_key", *public_key)
}

/// Predicate on one username column (`username` or `u_username`).
pub fn by_username(column: &'static str, username: &str) -> Predicate {
    Predicate::eq(column, username)
}

/// Membership row linking `address` to `key`.
pub fn membership_row(address: &Address, key: &PublicKey) -> Row {
    dl_02_storage_intents::row([
        ("account_id", Value::from(*address)),
        ("dependent_id", Value::from(to_hex(key))),
    ])
}

// =============================================================================
// ROW DECODING
// =============================================================================

fn int(row: &Row, column: &'static str) -> Result<i64, InvariantError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Int(v)) => Ok(*v),
        Some(_) => Err(InvariantError::MalformedColumn { column }),
    }
}

fn amount(row: &Row, column: &'static str) -> Result<u64, InvariantError> {
    let value = int(row, column)?;
    u64::try_from(value).map_err(|_| InvariantError::ColumnOutOfRange { column, value })
}

fn small(row: &Row, column: &'static str) -> Result<u32, InvariantError> {
    let value = int(row, column)?;
    u32::try_from(value).map_err(|_| InvariantError::ColumnOutOfRange { column, value })
}

fn flag(row: &Row, column: &'static str) -> Result<bool, InvariantError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(false),
        Some(value) => value.as_bool().ok_or(InvariantError::MalformedColumn { column }),
    }
}

fn text(row: &Row, column: &'static str) -> Result<Option<String>, InvariantError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(v)) => Ok(Some(v.clone())),
        Some(_) => Err(InvariantError::MalformedColumn { column }),
    }
}

fn bytes<const N: usize>(
    row: &Row,
    column: &'static str,
) -> Result<Option<[u8; N]>, InvariantError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bytes(v)) => v
            .as_slice()
            .try_into()
            .map(Some)
            .map_err(|_| InvariantError::MalformedColumn { column }),
        Some(_) => Err(InvariantError::MalformedColumn { column }),
    }
}
