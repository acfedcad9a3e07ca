//! Multisignature registration.
//!
//! Registers a keysgroup, the number of co-signatures later transactions
//! need (`min`) and how long they may wait for them (`lifetime`, hours).

use super::{
    asset_membership, asset_u32, row_text, row_u32, AccountChange, TransactionLogic, TxContext,
    TxState,
};
use crate::domain::account::Account;
use crate::domain::delta::{AccountDiff, MembershipDiff};
use crate::domain::errors::TransactionError;
use crate::domain::fees::Fees;
use crate::domain::transaction::{Transaction, TransactionAsset, TransactionType};
use dl_02_storage_intents::{row, Collection, Row, StorageIntent, Value};
use shared_types::Amount;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultisignatureLogic;

fn asset(asset: &TransactionAsset) -> Result<(u32, u32, &MembershipDiff), TransactionError> {
    match asset {
        TransactionAsset::Multisignature {
            min,
            lifetime,
            keysgroup,
        } => Ok((*min, *lifetime, keysgroup)),
        _ => Err(TransactionError::AssetMismatch {
            expected: TransactionType::Multisignature,
        }),
    }
}

fn diff(tx: &Transaction, sign: i64, confirmed: bool) -> Result<AccountDiff, TransactionError> {
    let (min, lifetime, keysgroup) = asset(&tx.asset)?;
    let keys = if sign > 0 {
        keysgroup.clone()
    } else {
        keysgroup.inverted()
    };
    let min = sign * i64::from(min);
    let lifetime = sign * i64::from(lifetime);
    Ok(if confirmed {
        AccountDiff {
            multisignatures: keys,
            multimin: min,
            multilifetime: lifetime,
            ..Default::default()
        }
    } else {
        AccountDiff {
            u_multisignatures: keys,
            u_multimin: min,
            u_multilifetime: lifetime,
            ..Default::default()
        }
    })
}

impl TransactionLogic for MultisignatureLogic {
    /// One base fee per keysgroup member plus one.
    fn calculate_fee(&self, tx: &Transaction, _sender: &Account, fees: &Fees) -> Amount {
        let members = asset(&tx.asset).map_or(0, |(_, _, keysgroup)| keysgroup.len() as u64);
        (members + 1).saturating_mul(fees.multisignature)
    }

    fn verify(
        &self,
        tx: &Transaction,
        _state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<(), TransactionError> {
        let (min, lifetime, keysgroup) = asset(&tx.asset)?;
        let limits = &ctx.config.multisig;
        if tx.header.recipient_id.is_some() {
            return Err(TransactionError::UnexpectedRecipient);
        }
        if tx.header.amount != 0 {
            return Err(TransactionError::InvalidAmount {
                amount: tx.header.amount,
            });
        }

        let members = keysgroup.len();
        if members < limits.min_keysgroup || members > limits.max_keysgroup {
            return Err(TransactionError::InvalidKeysgroup {
                reason: "size out of range",
            });
        }
        if keysgroup.removed().next().is_some() {
            return Err(TransactionError::InvalidKeysgroup {
                reason: "entries must add keys",
            });
        }
        let mut seen = BTreeSet::new();
        if !keysgroup.added().all(|key| seen.insert(*key)) {
            return Err(TransactionError::InvalidKeysgroup {
                reason: "duplicate key",
            });
        }
        if seen.contains(&tx.header.sender_public_key) {
            return Err(TransactionError::InvalidKeysgroup {
                reason: "contains the sender key",
            });
        }

        if min < limits.min_signatures || min > limits.max_signatures || min as usize > members {
            return Err(TransactionError::InvalidMin { min });
        }
        if lifetime < limits.min_lifetime || lifetime > limits.max_lifetime {
            return Err(TransactionError::InvalidLifetime { lifetime });
        }
        Ok(())
    }

    fn asset_bytes(&self, asset_value: &TransactionAsset) -> Vec<u8> {
        let Ok((min, lifetime, keysgroup)) = asset(asset_value) else {
            return Vec::new();
        };
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&min.to_le_bytes());
        bytes.extend_from_slice(&lifetime.to_le_bytes());
        bytes.extend_from_slice(keysgroup.to_text().as_bytes());
        bytes
    }

    fn normalize_asset(
        &self,
        raw: &serde_json::Value,
    ) -> Result<TransactionAsset, TransactionError> {
        Ok(TransactionAsset::Multisignature {
            min: asset_u32(raw, "min")?,
            lifetime: asset_u32(raw, "lifetime")?,
            keysgroup: asset_membership(raw, "keysgroup")?,
        })
    }

    fn apply(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        if state.sender.is_multisignature() {
            return Err(TransactionError::MultisignatureExists);
        }
        Ok(vec![AccountChange::new(state.sender.address, diff(tx, 1, true)?)])
    }

    fn undo(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        Ok(vec![AccountChange::new(state.sender.address, diff(tx, -1, true)?)])
    }

    fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        if state.sender.is_multisignature() || !state.sender.u_multisignatures.is_empty() {
            return Err(TransactionError::MultisignatureExists);
        }
        Ok(vec![AccountChange::new(state.sender.address, diff(tx, 1, false)?)])
    }

    fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        Ok(vec![AccountChange::new(state.sender.address, diff(tx, -1, false)?)])
    }

    fn asset_collection(&self) -> Option<Collection> {
        Some(Collection::Multisignatures)
    }

    fn db_save(&self, tx: &Transaction) -> Option<StorageIntent> {
        let (min, lifetime, keysgroup) = asset(&tx.asset).ok()?;
        Some(StorageIntent::Create {
            collection: Collection::Multisignatures,
            values: row([
                ("transaction_id", Value::from(tx.header.id)),
                ("min", Value::Int(i64::from(min))),
                ("lifetime", Value::Int(i64::from(lifetime))),
                ("keysgroup", Value::from(keysgroup.to_text())),
            ]),
        })
    }

    fn db_read(&self, row: &Row) -> Result<TransactionAsset, TransactionError> {
        Ok(TransactionAsset::Multisignature {
            min: row_u32(row, "min")?,
            lifetime: row_u32(row, "lifetime")?,
            keysgroup: MembershipDiff::from_text(row_text(row, "keysgroup")?)?,
        })
    }

    /// Every keysgroup member signs the registration.
    fn required_signatures(&self, tx: &Transaction, _sender: &Account) -> usize {
        asset(&tx.asset).map_or(0, |(_, _, keysgroup)| keysgroup.len())
    }
}
