//! # Ledger Delta Builder
//!
//! Compiles a sparse `AccountDiff` into storage intents. Performs no I/O.
//!
//! - Numeric fields compile to `column = column + delta`, never overwrites,
//!   so the inverse change is the negated diff.
//! - Membership diffs compile to a bulk remove followed by a bulk create.
//! - A negative `u_balance` delta clears `virgin`.
//! - `AccountDiff` is a closed schema: fields outside it cannot be expressed,
//!   and unknown fields in serialized diffs are ignored.

use crate::domain::account::{by_address, membership_row, Account};
use crate::domain::errors::TransactionError;
use dl_02_storage_intents::{
    row, Assignment, Assignments, Collection, Predicate, Row, StorageIntent, Value,
};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use shared_types::{parse_public_key, to_hex, Address, Hash, InvariantError, PublicKey};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// MEMBERSHIP DIFFS
// =============================================================================

/// One `+key` / `-key` entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub enum MembershipChange {
    Add(PublicKey),
    Remove(PublicKey),
}

impl MembershipChange {
    pub fn key(&self) -> &PublicKey {
        match self {
            MembershipChange::Add(key) | MembershipChange::Remove(key) => key,
        }
    }

    pub fn inverted(&self) -> Self {
        match *self {
            MembershipChange::Add(key) => MembershipChange::Remove(key),
            MembershipChange::Remove(key) => MembershipChange::Add(key),
        }
    }
}

impl fmt::Display for MembershipChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipChange::Add(key) => write!(f, "+{}", to_hex(key)),
            MembershipChange::Remove(key) => write!(f, "-{}", to_hex(key)),
        }
    }
}

impl FromStr for MembershipChange {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex) = s.strip_prefix('+') {
            Ok(MembershipChange::Add(parse_public_key(hex)?))
        } else if let Some(hex) = s.strip_prefix('-') {
            Ok(MembershipChange::Remove(parse_public_key(hex)?))
        } else {
            Err(TransactionError::Malformed(format!(
                "membership entry must start with + or -: {s}"
            )))
        }
    }
}

/// Ordered list of membership changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipDiff(pub Vec<MembershipChange>);

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MembershipChange> {
        self.0.iter()
    }

    pub fn added(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.iter().filter_map(|c| match c {
            MembershipChange::Add(key) => Some(key),
            MembershipChange::Remove(_) => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.iter().filter_map(|c| match c {
            MembershipChange::Remove(key) => Some(key),
            MembershipChange::Add(_) => None,
        })
    }

    /// The diff that undoes this one.
    pub fn inverted(&self) -> Self {
        MembershipDiff(self.0.iter().map(MembershipChange::inverted).collect())
    }

    /// Removals first, then additions, matching the emitted intents.
    pub fn apply_to(&self, set: &mut BTreeSet<PublicKey>) {
        for key in self.removed() {
            set.remove(key);
        }
        for key in self.added() {
            set.insert(*key);
        }
    }

    /// Comma-joined text form used by asset rows.
    pub fn to_text(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        parts.join(",")
    }

    pub fn from_text(text: &str) -> Result<Self, TransactionError> {
        if text.is_empty() {
            return Ok(Self::default());
        }
        text.split(',')
            .map(MembershipChange::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(MembershipDiff)
    }
}

impl FromIterator<MembershipChange> for MembershipDiff {
    fn from_iter<I: IntoIterator<Item = MembershipChange>>(iter: I) -> Self {
        MembershipDiff(iter.into_iter().collect())
    }
}

// =============================================================================
// ACCOUNT DIFF
// =============================================================================

/// Round and block a confirmed change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTag {
    pub round: u64,
    pub block_id: Hash,
}

/// Sparse change to one account. Zero / `None` / empty means "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountDiff {
    pub balance: i64,
    pub u_balance: i64,
    pub vote: i64,
    pub produced_blocks: i64,
    pub missed_blocks: i64,
    pub fees: i64,
    pub rewards: i64,
    pub multimin: i64,
    pub u_multimin: i64,
    pub multilifetime: i64,
    pub u_multilifetime: i64,

    pub delegates: MembershipDiff,
    pub u_delegates: MembershipDiff,
    pub multisignatures: MembershipDiff,
    pub u_multisignatures: MembershipDiff,

    pub is_delegate: Option<bool>,
    pub u_is_delegate: Option<bool>,
    pub second_signature: Option<bool>,
    pub u_second_signature: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub username: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub u_username: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub second_public_key: Option<Option<PublicKey>>,

    /// Present on confirmed changes: sets `block_id` and, for balance or vote
    /// changes, feeds round scratch rows.
    pub round: Option<RoundTag>,
}

impl AccountDiff {
    pub fn with_round(mut self, tag: Option<RoundTag>) -> Self {
        self.round = tag;
        self
    }

    fn increments(&self) -> [(&'static str, i64); 11] {
        [
            ("balance", self.balance),
            ("u_balance", self.u_balance),
            ("vote", self.vote),
            ("produced_blocks", self.produced_blocks),
            ("missed_blocks", self.missed_blocks),
            ("fees", self.fees),
            ("rewards", self.rewards),
            ("multimin", self.multimin),
            ("u_multimin", self.u_multimin),
            ("multilifetime", self.multilifetime),
            ("u_multilifetime", self.u_multilifetime),
        ]
    }

    fn memberships(&self) -> [(Collection, &MembershipDiff); 4] {
        [
            (Collection::AccountDelegates, &self.delegates),
            (Collection::AccountUnconfirmedDelegates, &self.u_delegates),
            (Collection::AccountMultisignatures, &self.multisignatures),
            (
                Collection::AccountUnconfirmedMultisignatures,
                &self.u_multisignatures,
            ),
        ]
    }

    fn sets(&self) -> Vec<(&'static str, Value)> {
        let mut sets = Vec::new();
        let flags = [
            ("is_delegate", self.is_delegate),
            ("u_is_delegate", self.u_is_delegate),
            ("second_signature", self.second_signature),
            ("u_second_signature", self.u_second_signature),
        ];
        for (column, flag) in flags {
            if let Some(flag) = flag {
                sets.push((column, Value::Bool(flag)));
            }
        }
        if let Some(username) = &self.username {
            sets.push(("username", Value::from(username.clone())));
        }
        if let Some(username) = &self.u_username {
            sets.push(("u_username", Value::from(username.clone())));
        }
        if let Some(key) = self.second_public_key {
            sets.push(("second_public_key", Value::from(key)));
        }
        if self.u_balance < 0 {
            sets.push(("virgin", Value::Bool(false)));
        }
        if let Some(tag) = self.round {
            sets.push(("block_id", Value::from(tag.block_id)));
        }
        sets
    }

    /// Apply to an in-memory account, mirroring what the emitted intents do
    /// to the stored row.
    pub fn apply_to(&self, account: &mut Account) -> Result<(), InvariantError> {
        shift(&mut account.balance, self.balance, "balance")?;
        shift(&mut account.u_balance, self.u_balance, "u_balance")?;
        shift(&mut account.vote, self.vote, "vote")?;
        shift(&mut account.produced_blocks, self.produced_blocks, "produced_blocks")?;
        shift(&mut account.missed_blocks, self.missed_blocks, "missed_blocks")?;
        shift(&mut account.fees, self.fees, "fees")?;
        shift(&mut account.rewards, self.rewards, "rewards")?;
        shift(&mut account.multimin, self.multimin, "multimin")?;
        shift(&mut account.u_multimin, self.u_multimin, "u_multimin")?;
        shift(&mut account.multilifetime, self.multilifetime, "multilifetime")?;
        shift(&mut account.u_multilifetime, self.u_multilifetime, "u_multilifetime")?;

        self.delegates.apply_to(&mut account.delegates);
        self.u_delegates.apply_to(&mut account.u_delegates);
        self.multisignatures.apply_to(&mut account.multisignatures);
        self.u_multisignatures.apply_to(&mut account.u_multisignatures);

        if let Some(v) = self.is_delegate {
            account.is_delegate = v;
        }
        if let Some(v) = self.u_is_delegate {
            account.u_is_delegate = v;
        }
        if let Some(v) = self.second_signature {
            account.second_signature = v;
        }
        if let Some(v) = self.u_second_signature {
            account.u_second_signature = v;
        }
        if let Some(v) = &self.username {
            account.username = v.clone();
        }
        if let Some(v) = &self.u_username {
            account.u_username = v.clone();
        }
        if let Some(v) = self.second_public_key {
            account.second_public_key = v;
        }
        if self.u_balance < 0 {
            account.virgin = false;
        }
        if let Some(tag) = self.round {
            account.block_id = Some(tag.block_id);
        }
        Ok(())
    }
}

fn shift<T>(field: &mut T, delta: i64, column: &'static str) -> Result<(), InvariantError>
where
    T: Copy + TryFrom<i128> + Into<i128>,
{
    let next = (*field).into() + i128::from(delta);
    *field = T::try_from(next).map_err(|_| InvariantError::ColumnOutOfRange {
        column,
        value: i64::try_from(next).unwrap_or(if next < 0 { i64::MIN } else { i64::MAX }),
    })?;
    Ok(())
}

// =============================================================================
// ROUND SCRATCH ROWS
// =============================================================================

/// One `mem_round` row: `amount` of vote weight moving to or from `delegate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScratchEntry {
    pub round: u64,
    pub block_id: Hash,
    pub address: Address,
    pub delegate: PublicKey,
    pub amount: i64,
}

impl ScratchEntry {
    pub fn to_row(&self) -> Row {
        row([
            ("round", Value::Int(self.round as i64)),
            ("block_id", Value::from(self.block_id)),
            ("address", Value::from(self.address)),
            ("delegate", Value::from(to_hex(&self.delegate))),
            ("amount", Value::Int(self.amount)),
        ])
    }

    pub fn from_row(row: &Row) -> Result<Self, InvariantError> {
        let malformed = |column| InvariantError::MalformedColumn { column };
        let round = row
            .get("round")
            .and_then(Value::as_int)
            .and_then(|r| u64::try_from(r).ok())
            .ok_or(malformed("round"))?;
        let block_id = row
            .get("block_id")
            .and_then(Value::as_bytes)
            .and_then(|b| b.try_into().ok())
            .ok_or(malformed("block_id"))?;
        let address = row
            .get("address")
            .and_then(Value::as_bytes)
            .and_then(|b| b.try_into().ok())
            .ok_or(malformed("address"))?;
        let delegate = row
            .get("delegate")
            .and_then(Value::as_text)
            .and_then(|hex| parse_public_key(hex).ok())
            .ok_or(malformed("delegate"))?;
        let amount = row
            .get("amount")
            .and_then(Value::as_int)
            .ok_or(malformed("amount"))?;
        Ok(Self {
            round,
            block_id,
            address,
            delegate,
            amount,
        })
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Intents plus the scratch rows they persist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutput {
    pub intents: Vec<StorageIntent>,
    pub scratch: Vec<ScratchEntry>,
}

pub struct LedgerDeltaBuilder;

impl LedgerDeltaBuilder {
    /// Intents for `diff` on the account at `address`.
    ///
    /// Always yields the account update first (a no-op update for an empty
    /// diff), then one remove/create pair per non-empty membership diff.
    pub fn merge(address: &Address, diff: &AccountDiff) -> Vec<StorageIntent> {
        let mut assignments = Assignments::new();
        for (column, delta) in diff.increments() {
            if delta != 0 {
                assignments.insert(column.to_string(), Assignment::Increment(delta));
            }
        }
        for (column, value) in diff.sets() {
            assignments.insert(column.to_string(), Assignment::Set(value));
        }

        let mut intents = vec![StorageIntent::Update {
            collection: Collection::Accounts,
            predicate: by_address(address),
            assignments,
        }];

        for (collection, membership) in diff.memberships() {
            intents.extend(membership_intents(collection, address, membership));
        }
        intents
    }

    /// Like `merge`, for an account that may not exist yet: prefixed by an
    /// upsert of the account row, and followed by the round scratch rows the
    /// change produces.
    pub fn merge_account(
        account: &Account,
        diff: &AccountDiff,
    ) -> Result<MergeOutput, InvariantError> {
        let mut values = row([("address", Value::from(account.address))]);
        let mut on_conflict = Assignments::new();
        if let Some(key) = account.public_key {
            values.insert("public_key".into(), Value::from(key));
            on_conflict.insert("public_key".into(), Assignment::Set(Value::from(key)));
        }

        let mut intents = vec![StorageIntent::Upsert {
            collection: Collection::Accounts,
            values,
            on_conflict,
        }];
        intents.extend(Self::merge(&account.address, diff));

        let scratch = Self::scratch_entries(account, diff)?;
        if !scratch.is_empty() {
            intents.push(StorageIntent::BulkCreate {
                collection: Collection::RoundScratch,
                rows: scratch.iter().map(ScratchEntry::to_row).collect(),
            });
        }
        Ok(MergeOutput { intents, scratch })
    }

    /// Vote-weight movements caused by `diff` on `account`.
    ///
    /// A balance change moves weight on every delegate the account votes for
    /// before the change; an added (removed) vote moves the balance after the
    /// change onto (off) the delegate.
    pub fn scratch_entries(
        account: &Account,
        diff: &AccountDiff,
    ) -> Result<Vec<ScratchEntry>, InvariantError> {
        let Some(tag) = diff.round else {
            return Ok(Vec::new());
        };
        let entry = |delegate: &PublicKey, amount: i64| ScratchEntry {
            round: tag.round,
            block_id: tag.block_id,
            address: account.address,
            delegate: *delegate,
            amount,
        };

        let mut entries = Vec::new();
        if diff.balance != 0 {
            entries.extend(account.delegates.iter().map(|d| entry(d, diff.balance)));
        }
        if !diff.delegates.is_empty() {
            let after = i64::try_from(account.balance)
                .ok()
                .and_then(|b| b.checked_add(diff.balance))
                .ok_or(InvariantError::ArithmeticOverflow {
                    context: "scratch balance",
                })?;
            for change in diff.delegates.iter() {
                match change {
                    MembershipChange::Add(key) => entries.push(entry(key, after)),
                    MembershipChange::Remove(key) => entries.push(entry(key, -after)),
                }
            }
        }
        Ok(entries)
    }
}

fn membership_intents(
    collection: Collection,
    address: &Address,
    diff: &MembershipDiff,
) -> Vec<StorageIntent> {
    let mut intents = Vec::new();
    let removed: Vec<String> = diff.removed().map(|k| to_hex(k)).collect();
    if !removed.is_empty() {
        intents.push(StorageIntent::Remove {
            collection,
            predicate: Predicate::eq("account_id", *address)
                .and(Predicate::one_of("dependent_id", removed)),
        });
    }
    let rows: Vec<Row> = diff.added().map(|k| membership_row(address, k)).collect();
    if !rows.is_empty() {
        intents.push(StorageIntent::BulkCreate { collection, rows });
    }
    intents
}
