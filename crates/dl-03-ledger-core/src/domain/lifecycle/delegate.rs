//! Delegate registration under a unique username.

use super::{asset_str, row_text, AccountChange, TransactionLogic, TxContext, TxState};
use crate::domain::account::Account;
use crate::domain::delta::AccountDiff;
use crate::domain::errors::TransactionError;
use crate::domain::fees::Fees;
use crate::domain::transaction::{Transaction, TransactionAsset, TransactionType};
use dl_02_storage_intents::{row, Collection, Row, StorageIntent, Value};
use shared_types::Amount;

const USERNAME_SYMBOLS: &str = "!@$&_.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelegateLogic;

fn username(asset: &TransactionAsset) -> Result<&str, TransactionError> {
    match asset {
        TransactionAsset::Delegate { username } => Ok(username),
        _ => Err(TransactionError::AssetMismatch {
            expected: TransactionType::Delegate,
        }),
    }
}

/// Lowercase letters, digits and `!@$&_.`, at most `max_length` characters,
/// and not purely numeric so it cannot pass for an account id.
pub fn validate_username(username: &str, max_length: usize) -> Result<(), TransactionError> {
    if username.is_empty() {
        return Err(TransactionError::InvalidUsername { reason: "empty" });
    }
    if username.chars().count() > max_length {
        return Err(TransactionError::InvalidUsername { reason: "too long" });
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || USERNAME_SYMBOLS.contains(c))
    {
        return Err(TransactionError::InvalidUsername {
            reason: "invalid character",
        });
    }
    if username.chars().all(|c| c.is_ascii_digit()) {
        return Err(TransactionError::InvalidUsername {
            reason: "looks like an account id",
        });
    }
    Ok(())
}

impl TransactionLogic for DelegateLogic {
    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, fees: &Fees) -> Amount {
        fees.delegate
    }

    fn verify(
        &self,
        tx: &Transaction,
        _state: &TxState,
        ctx: &TxContext<'_>,
    ) -> Result<(), TransactionError> {
        let name = username(&tx.asset)?;
        if tx.header.recipient_id.is_some() {
            return Err(TransactionError::UnexpectedRecipient);
        }
        if tx.header.amount != 0 {
            return Err(TransactionError::InvalidAmount {
                amount: tx.header.amount,
            });
        }
        validate_username(name, ctx.config.max_username_length)
    }

    fn asset_bytes(&self, asset: &TransactionAsset) -> Vec<u8> {
        username(asset)
            .map(|name| name.as_bytes().to_vec())
            .unwrap_or_default()
    }

    fn normalize_asset(
        &self,
        raw: &serde_json::Value,
    ) -> Result<TransactionAsset, TransactionError> {
        Ok(TransactionAsset::Delegate {
            username: asset_str(raw, "username")?.to_string(),
        })
    }

    fn apply(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let name = username(&tx.asset)?;
        let sender = &state.sender;
        if sender.is_delegate {
            return Err(TransactionError::AlreadyDelegate);
        }
        if let Some(owner) = &state.username_owner {
            if owner.address != sender.address && owner.username.as_deref() == Some(name) {
                return Err(TransactionError::UsernameTaken {
                    username: name.to_string(),
                });
            }
        }
        let diff = AccountDiff {
            is_delegate: Some(true),
            username: Some(Some(name.to_string())),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(sender.address, diff)])
    }

    fn undo(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        username(&tx.asset)?;
        let diff = AccountDiff {
            is_delegate: Some(false),
            username: Some(None),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(state.sender.address, diff)])
    }

    fn apply_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let name = username(&tx.asset)?;
        let sender = &state.sender;
        if sender.is_delegate || sender.u_is_delegate {
            return Err(TransactionError::AlreadyDelegate);
        }
        if let Some(owner) = &state.username_owner {
            let holds = owner.username.as_deref() == Some(name)
                || owner.u_username.as_deref() == Some(name);
            if owner.address != sender.address && holds {
                return Err(TransactionError::UsernameTaken {
                    username: name.to_string(),
                });
            }
        }
        let diff = AccountDiff {
            u_is_delegate: Some(true),
            u_username: Some(Some(name.to_string())),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(sender.address, diff)])
    }

    fn undo_unconfirmed(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        username(&tx.asset)?;
        let diff = AccountDiff {
            u_is_delegate: Some(false),
            u_username: Some(None),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(state.sender.address, diff)])
    }

    fn asset_collection(&self) -> Option<Collection> {
        Some(Collection::Delegates)
    }

    fn db_save(&self, tx: &Transaction) -> Option<StorageIntent> {
        let name = username(&tx.asset).ok()?;
        Some(StorageIntent::Create {
            collection: Collection::Delegates,
            values: row([
                ("transaction_id", Value::from(tx.header.id)),
                ("username", Value::from(name)),
            ]),
        })
    }

    fn db_read(&self, row: &Row) -> Result<TransactionAsset, TransactionError> {
        Ok(TransactionAsset::Delegate {
            username: row_text(row, "username")?.to_string(),
        })
    }
}
