//! Votes for delegates.
//!
//! The asset is a membership diff over the sender's voted delegates. Vote
//! weight itself moves through round scratch rows, not here.

use super::{asset_membership, row_text, AccountChange, TransactionLogic, TxContext, TxState};
use crate::domain::account::Account;
use crate::domain::delta::{AccountDiff, MembershipChange, MembershipDiff};
use crate::domain::errors::TransactionError;
use crate::domain::fees::Fees;
use crate::domain::transaction::{Transaction, TransactionAsset, TransactionType};
use dl_02_storage_intents::{row, Collection, Row, StorageIntent, Value};
use shared_types::{to_hex, Amount, PublicKey};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteLogic;

fn votes(asset: &TransactionAsset) -> Result<&MembershipDiff, TransactionError> {
    match asset {
        TransactionAsset::Vote { votes } => Ok(votes),
        _ => Err(TransactionError::AssetMismatch {
            expected: TransactionType::Vote,
        }),
    }
}

/// Check `votes` against the currently voted set.
fn check_votes(
    current: &BTreeSet<PublicKey>,
    votes: &MembershipDiff,
    max: usize,
) -> Result<(), TransactionError> {
    for change in votes.iter() {
        match change {
            MembershipChange::Add(key) if current.contains(key) => {
                return Err(TransactionError::AlreadyVoted {
                    delegate: to_hex(key),
                })
            }
            MembershipChange::Remove(key) if !current.contains(key) => {
                return Err(TransactionError::NotVoted {
                    delegate: to_hex(key),
                })
            }
            _ => {}
        }
    }
    let count = (current.len() + votes.added().count()).saturating_sub(votes.removed().count());
    if count > max {
        return Err(TransactionError::TooManyVotes { count, max });
    }
    Ok(())
}

impl TransactionLogic for VoteLogic {
    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, fees: &Fees) -> Amount {
        fees.vote
    }

    fn verify(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<(), TransactionError> {
        let votes = votes(&tx.asset)?;
        if tx.header.recipient_id != Some(tx.header.sender_id) {
            return Err(TransactionError::VoteRecipientMismatch);
        }
        if tx.header.amount != 0 {
            return Err(TransactionError::InvalidAmount {
                amount: tx.header.amount,
            });
        }

        let max = ctx.config.votes.max_per_transaction;
        if votes.is_empty() || votes.len() > max {
            return Err(TransactionError::InvalidVoteCount {
                count: votes.len(),
                max,
            });
        }

        let mut seen = BTreeSet::new();
        for change in votes.iter() {
            if !seen.insert(*change.key()) {
                return Err(TransactionError::DuplicateVote {
                    delegate: to_hex(change.key()),
                });
            }
        }
        for key in &seen {
            if !state.vote_targets.get(key).is_some_and(|a| a.is_delegate) {
                return Err(TransactionError::NotADelegate {
                    delegate: to_hex(key),
                });
            }
        }
        Ok(())
    }

    fn asset_bytes(&self, asset: &TransactionAsset) -> Vec<u8> {
        votes(asset)
            .map(|votes| votes.to_text().into_bytes())
            .unwrap_or_default()
    }

    fn normalize_asset(
        &self,
        raw: &serde_json::Value,
    ) -> Result<TransactionAsset, TransactionError> {
        Ok(TransactionAsset::Vote {
            votes: asset_membership(raw, "votes")?,
        })
    }

    fn apply(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let votes = votes(&tx.asset)?;
        check_votes(&state.sender.delegates, votes, ctx.config.votes.max_per_account)?;
        let diff = AccountDiff {
            delegates: votes.clone(),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(state.sender.address, diff)])
    }

    fn undo(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let diff = AccountDiff {
            delegates: votes(&tx.asset)?.inverted(),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(state.sender.address, diff)])
    }

    fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let votes = votes(&tx.asset)?;
        check_votes(&state.sender.u_delegates, votes, ctx.config.votes.max_per_account)?;
        let diff = AccountDiff {
            u_delegates: votes.clone(),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(state.sender.address, diff)])
    }

    fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let diff = AccountDiff {
            u_delegates: votes(&tx.asset)?.inverted(),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(state.sender.address, diff)])
    }

    fn asset_collection(&self) -> Option<Collection> {
        Some(Collection::Votes)
    }

    fn db_save(&self, tx: &Transaction) -> Option<StorageIntent> {
        let votes = votes(&tx.asset).ok()?;
        Some(StorageIntent::Create {
            collection: Collection::Votes,
            values: row([
                ("transaction_id", Value::from(tx.header.id)),
                ("votes", Value::from(votes.to_text())),
            ]),
        })
    }

    fn db_read(&self, row: &Row) -> Result<TransactionAsset, TransactionError> {
        Ok(TransactionAsset::Vote {
            votes: MembershipDiff::from_text(row_text(row, "votes")?)?,
        })
    }
}
