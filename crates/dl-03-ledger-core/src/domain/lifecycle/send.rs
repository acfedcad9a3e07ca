//! Send: move `amount` from sender to recipient.

use super::{AccountChange, TransactionLogic, TxContext, TxState};
use crate::domain::account::Account;
use crate::domain::delta::AccountDiff;
use crate::domain::errors::TransactionError;
use crate::domain::fees::Fees;
use crate::domain::transaction::{Transaction, TransactionAsset};
use dl_02_storage_intents::{Collection, Row, StorageIntent};
use shared_types::{Address, Amount};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendLogic;

fn credit(tx: &Transaction) -> Result<(Address, i64), TransactionError> {
    let recipient = tx.header.recipient_id.ok_or(TransactionError::MissingRecipient)?;
    let amount = i64::try_from(tx.header.amount).map_err(|_| TransactionError::InvalidAmount {
        amount: tx.header.amount,
    })?;
    Ok((recipient, amount))
}

impl TransactionLogic for SendLogic {
    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, fees: &Fees) -> Amount {
        fees.send
    }

    fn verify(
        &self,
        tx: &Transaction,
        _state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<(), TransactionError> {
        if tx.header.recipient_id.is_none() {
            return Err(TransactionError::MissingRecipient);
        }
        if tx.header.amount == 0 {
            return Err(TransactionError::InvalidAmount { amount: 0 });
        }
        Ok(())
    }

    fn asset_bytes(&self, _asset: &TransactionAsset) -> Vec<u8> {
        Vec::new()
    }

    fn normalize_asset(
        &self,
        _raw: &serde_json::Value,
    ) -> Result<TransactionAsset, TransactionError> {
        Ok(TransactionAsset::Send)
    }

    fn apply(
        &self,
        tx: &Transaction,
        _state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let (recipient, amount) = credit(tx)?;
        let diff = AccountDiff {
            balance: amount,
            u_balance: amount,
            ..Default::default()
        };
        Ok(vec![AccountChange::new(recipient, diff)])
    }

    fn undo(
        &self,
        tx: &Transaction,
        _state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let (recipient, amount) = credit(tx)?;
        let diff = AccountDiff {
            balance: -amount,
            u_balance: -amount,
            ..Default::default()
        };
        Ok(vec![AccountChange::new(recipient, diff)])
    }

    fn apply_unconfirmed(
        &self,
        _tx: &Transaction,
        _state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        Ok(Vec::new())
    }

    fn undo_unconfirmed(
        &self,
        _tx: &Transaction,
        _state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        Ok(Vec::new())
    }

    fn asset_collection(&self) -> Option<Collection> {
        None
    }

    fn db_save(&self, _tx: &Transaction) -> Option<StorageIntent> {
        None
    }

    fn db_read(&self, _row: &Row) -> Result<TransactionAsset, TransactionError> {
        Ok(TransactionAsset::Send)
    }
}
