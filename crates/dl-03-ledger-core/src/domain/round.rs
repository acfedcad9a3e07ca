//! # Round Landing
//!
//! Settles a round when its last block is applied and reverses the
//! settlement when that block is rolled back.
//!
//! ## Landing order
//!
//! 1. Vote weight accumulated in the round's scratch rows moves onto delegates.
//! 2. Delegates that forged nothing get `missed_blocks + 1`.
//! 3. Scratch rows of the round are flushed.
//! 4. Every slot's generator is credited its fee share and block reward; the
//!    fee remainder goes to the generator of the last slot.
//! 5. The vote weight those credits move is applied directly and flushed.
//!
//! ## Rollback order
//!
//! Missed-block counters and credits are reversed, then the scratch rows and
//! delegate votes captured at landing (`RoundSnapshot`) are restored and the
//! rollback is recorded in `round_rollbacks`.

use crate::domain::account::{by_public_key, Account};
use crate::domain::delta::{AccountDiff, LedgerDeltaBuilder, RoundTag, ScratchEntry};
use crate::domain::lifecycle::AccountChange;
use dl_01_round_economics::{RoundChanges, RoundSchedule};
use dl_02_storage_intents::{row, Collection, Predicate, StorageIntent, Value};
use serde::{Deserialize, Serialize};
use shared_types::{to_hex, Amount, BlockSummary, Hash, InvariantError, PublicKey};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{info, trace, warn};

// =============================================================================
// TYPES
// =============================================================================

/// Everything landing (or un-landing) one round reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundScope {
    pub round: u64,
    /// Block that closes the round.
    pub block_id: Hash,
    /// Blocks of the round, in height order.
    pub blocks: Vec<BlockSummary>,
    /// Active delegate list of the round.
    pub delegates: Vec<PublicKey>,
    /// Scratch rows accumulated during the round, closing block included.
    pub scratch: Vec<ScratchEntry>,
    /// Current state of every generator of the round, by public key.
    pub generators: BTreeMap<PublicKey, Account>,
}

impl RoundScope {
    fn tag(&self) -> RoundTag {
        RoundTag {
            round: self.round,
            block_id: self.block_id,
        }
    }

    /// Round delegates with no block in the round, in list order.
    pub fn outsiders(&self) -> Vec<PublicKey> {
        let forged: BTreeSet<&PublicKey> =
            self.blocks.iter().map(|b| &b.generator_public_key).collect();
        self.delegates
            .iter()
            .filter(|key| !forged.contains(key))
            .copied()
            .collect()
    }

    /// Delegates whose `vote` landing can change: targets of scratch rows and
    /// everything a generator votes for.
    pub fn touched_delegates(&self) -> BTreeSet<PublicKey> {
        let mut touched: BTreeSet<PublicKey> = self.scratch.iter().map(|e| e.delegate).collect();
        for generator in self.generators.values() {
            touched.extend(generator.delegates.iter().copied());
        }
        touched
    }
}

/// State captured right before a round lands, needed to roll it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round: u64,
    pub block_id: Hash,
    pub scratch: Vec<ScratchEntry>,
    /// `vote` of every touched delegate before landing.
    pub votes: Vec<(PublicKey, Amount)>,
}

impl RoundSnapshot {
    /// Capture `scope` with the pre-landing votes of its touched delegates.
    pub fn capture(
        scope: &RoundScope,
        votes: impl IntoIterator<Item = (PublicKey, Amount)>,
    ) -> Self {
        let mut votes: Vec<_> = votes.into_iter().collect();
        votes.sort_unstable();
        votes.dedup_by_key(|(key, _)| *key);
        Self {
            round: scope.round,
            block_id: scope.block_id,
            scratch: scope.scratch.clone(),
            votes,
        }
    }
}

/// Why a round-closing block was rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackCause {
    ForkResolution,
    Resync,
    Operator,
}

impl RollbackCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackCause::ForkResolution => "fork_resolution",
            RollbackCause::Resync => "resync",
            RollbackCause::Operator => "operator",
        }
    }
}

impl fmt::Display for RollbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intents of a landing plus the generator credits, for callers that keep
/// an in-memory view of accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutput {
    pub intents: Vec<StorageIntent>,
    pub credits: Vec<AccountChange>,
}

// =============================================================================
// LEDGER
// =============================================================================

pub struct RoundLedger {
    rounds: RoundSchedule,
}

impl RoundLedger {
    pub fn new(rounds: RoundSchedule) -> Self {
        Self { rounds }
    }

    pub fn schedule(&self) -> &RoundSchedule {
        &self.rounds
    }

    /// Intent counting one forged block for the generator of `block`;
    /// `direction` is `1` on apply and `-1` on undo.
    pub fn merge_block_generator(block: &BlockSummary, direction: i64) -> StorageIntent {
        StorageIntent::increment(
            Collection::Accounts,
            by_public_key(&block.generator_public_key),
            [("produced_blocks", direction)],
        )
    }

    /// Intents that settle `scope.round`.
    pub fn land(&self, scope: &RoundScope) -> Result<RoundOutput, InvariantError> {
        let credits = self.credits(scope)?;
        let outsiders = scope.outsiders();
        info!(
            round = scope.round,
            blocks = scope.blocks.len(),
            outsiders = outsiders.len(),
            "Landing round"
        );

        let mut output = RoundOutput::default();
        output.intents.extend(update_votes(scope.scratch.iter())?);
        output.intents.extend(update_missed_blocks(&outsiders, 1));
        output.intents.push(flush_round(scope.round));

        let mut reward_scratch = Vec::new();
        for (generator, diff) in &credits {
            trace!(
                delegate = %to_hex(&generator.public_key.unwrap_or_default()),
                balance = diff.balance,
                fees = diff.fees,
                rewards = diff.rewards,
                "Round credit"
            );
            output.intents.extend(LedgerDeltaBuilder::merge(&generator.address, diff));
            reward_scratch.extend(LedgerDeltaBuilder::scratch_entries(generator, diff)?);
            output.credits.push(AccountChange::new(generator.address, diff.clone()));
        }
        output.intents.extend(update_votes(reward_scratch.iter())?);
        output.intents.push(flush_round(scope.round));
        Ok(output)
    }

    /// Intents that reverse the landing of `scope.round` and restore the
    /// state captured in `snapshot`.
    pub fn backward_land(
        &self,
        scope: &RoundScope,
        snapshot: &RoundSnapshot,
        cause: RollbackCause,
        height: u64,
    ) -> Result<RoundOutput, InvariantError> {
        if snapshot.round != scope.round {
            return Err(InvariantError::SnapshotRoundMismatch {
                expected: scope.round,
                actual: snapshot.round,
            });
        }
        let credits = self.credits(scope)?;
        warn!(round = scope.round, height, %cause, "Rolling back round");

        let mut output = RoundOutput::default();
        output.intents.extend(update_missed_blocks(&scope.outsiders(), -1));
        output.intents.push(flush_round(scope.round));

        for (generator, diff) in credits.iter().rev() {
            let reversed = negate(diff)?;
            output.intents.extend(LedgerDeltaBuilder::merge(&generator.address, &reversed));
            output.credits.push(AccountChange::new(generator.address, reversed));
        }
        output.intents.push(flush_round(scope.round));

        if !snapshot.scratch.is_empty() {
            output.intents.push(StorageIntent::BulkCreate {
                collection: Collection::RoundScratch,
                rows: snapshot.scratch.iter().map(ScratchEntry::to_row).collect(),
            });
        }
        for (delegate, vote) in &snapshot.votes {
            let vote = i64::try_from(*vote).map_err(|_| InvariantError::ArithmeticOverflow {
                context: "snapshot vote",
            })?;
            output.intents.push(StorageIntent::set(
                Collection::Accounts,
                by_public_key(delegate),
                [("vote", Value::Int(vote))],
            ));
        }

        output.intents.push(StorageIntent::Create {
            collection: Collection::RoundRollbacks,
            values: row([
                ("round", Value::Int(scope.round as i64)),
                ("block_id", Value::from(scope.block_id)),
                ("height", Value::Int(height as i64)),
                ("cause", Value::from(cause.as_str())),
            ]),
        });
        Ok(output)
    }

    /// Checks the scope against the schedule and splits fees and rewards
    /// across its slots. One entry per block, in height order.
    fn credits<'a>(
        &self,
        scope: &'a RoundScope,
    ) -> Result<Vec<(&'a Account, AccountDiff)>, InvariantError> {
        let (first, last) = self.rounds.bounds(scope.round)?;
        let expected = self.rounds.delegates_for_round(scope.round);
        if scope.delegates.len() as u64 != expected {
            return Err(InvariantError::SlotCountMismatch {
                round: scope.round,
                expected,
                actual: scope.delegates.len() as u64,
            });
        }
        if scope.blocks.iter().any(|b| b.height < first || b.height > last) {
            return Err(InvariantError::RoundBounds {
                round: scope.round,
                first,
                last,
            });
        }
        if let Some(outsider) = scope
            .blocks
            .iter()
            .find(|b| !scope.delegates.contains(&b.generator_public_key))
        {
            return Err(InvariantError::UnknownRoundDelegate {
                public_key: to_hex(&outsider.generator_public_key),
            });
        }

        let total_fees = scope
            .blocks
            .iter()
            .try_fold(0u64, |sum, b| sum.checked_add(b.total_fee))
            .ok_or(InvariantError::ArithmeticOverflow {
                context: "round fees",
            })?;
        let rewards = scope.blocks.iter().map(|b| b.reward).collect();
        let changes = RoundChanges::new(scope.round, total_fees, rewards, expected)?;

        let tag = scope.tag();
        let mut credits = Vec::with_capacity(scope.blocks.len());
        for (index, block) in scope.blocks.iter().enumerate() {
            let slot = changes.at(index)?;
            let (mut balance, mut fees) = (slot.balance, slot.fees);
            if index == changes.remainder_slot() {
                let overflow = InvariantError::ArithmeticOverflow {
                    context: "fee remainder",
                };
                balance = balance.checked_add(slot.fees_remaining).ok_or(overflow.clone())?;
                fees = fees.checked_add(slot.fees_remaining).ok_or(overflow)?;
            }
            let generator = scope.generators.get(&block.generator_public_key).ok_or_else(|| {
                InvariantError::UnknownRoundDelegate {
                    public_key: to_hex(&block.generator_public_key),
                }
            })?;
            let balance = signed(balance, "slot balance")?;
            let diff = AccountDiff {
                balance,
                u_balance: balance,
                fees: signed(fees, "slot fees")?,
                rewards: signed(slot.rewards, "slot rewards")?,
                round: Some(tag),
                ..Default::default()
            };
            credits.push((generator, diff));
        }
        Ok(credits)
    }
}

fn signed(amount: Amount, context: &'static str) -> Result<i64, InvariantError> {
    i64::try_from(amount).map_err(|_| InvariantError::ArithmeticOverflow { context })
}

fn negate(diff: &AccountDiff) -> Result<AccountDiff, InvariantError> {
    let neg = |v: i64| {
        v.checked_neg().ok_or(InvariantError::ArithmeticOverflow {
            context: "round credit",
        })
    };
    Ok(AccountDiff {
        balance: neg(diff.balance)?,
        u_balance: neg(diff.u_balance)?,
        fees: neg(diff.fees)?,
        rewards: neg(diff.rewards)?,
        ..diff.clone()
    })
}

/// Net scratch amount per delegate, applied to `vote`. Zero sums are skipped.
fn update_votes<'a>(
    entries: impl Iterator<Item = &'a ScratchEntry>,
) -> Result<Vec<StorageIntent>, InvariantError> {
    let mut sums: BTreeMap<PublicKey, i64> = BTreeMap::new();
    for entry in entries {
        let sum = sums.entry(entry.delegate).or_default();
        *sum = sum
            .checked_add(entry.amount)
            .ok_or(InvariantError::ArithmeticOverflow {
                context: "round votes",
            })?;
    }
    Ok(sums
        .into_iter()
        .filter(|(_, amount)| *amount != 0)
        .map(|(delegate, amount)| {
            StorageIntent::increment(
                Collection::Accounts,
                by_public_key(&delegate),
                [("vote", amount)],
            )
        })
        .collect())
}

fn update_missed_blocks(outsiders: &[PublicKey], direction: i64) -> Option<StorageIntent> {
    if outsiders.is_empty() {
        return None;
    }
    Some(StorageIntent::increment(
        Collection::Accounts,
        Predicate::one_of("public_key", outsiders.iter().copied()),
        [("missed_blocks", direction)],
    ))
}

fn flush_round(round: u64) -> StorageIntent {
    StorageIntent::Remove {
        collection: Collection::RoundScratch,
        predicate: Predicate::eq("round", Value::Int(round as i64)),
    }
}
