//! Second signature registration.

use super::{AccountChange, TransactionLogic, TxContext, TxState};
use crate::domain::account::Account;
use crate::domain::delta::AccountDiff;
use crate::domain::errors::TransactionError;
use crate::domain::fees::Fees;
use crate::domain::transaction::{Transaction, TransactionAsset, TransactionType};
use dl_02_storage_intents::{row, Collection, Row, StorageIntent, Value};
use shared_types::{parse_public_key, Amount, PublicKey};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondSignatureLogic;

fn public_key(asset: &TransactionAsset) -> Result<&PublicKey, TransactionError> {
    match asset {
        TransactionAsset::SecondSignature { public_key } => Ok(public_key),
        _ => Err(TransactionError::AssetMismatch {
            expected: TransactionType::SecondSignature,
        }),
    }
}

impl TransactionLogic for SecondSignatureLogic {
    fn calculate_fee(&self, _tx: &Transaction, _sender: &Account, fees: &Fees) -> Amount {
        fees.second_signature
    }

    fn verify(
        &self,
        tx: &Transaction,
        _state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<(), TransactionError> {
        public_key(&tx.asset)?;
        if tx.header.recipient_id.is_some() {
            return Err(TransactionError::UnexpectedRecipient);
        }
        if tx.header.amount != 0 {
            return Err(TransactionError::InvalidAmount {
                amount: tx.header.amount,
            });
        }
        Ok(())
    }

    fn asset_bytes(&self, asset: &TransactionAsset) -> Vec<u8> {
        public_key(asset).map(|key| key.to_vec()).unwrap_or_default()
    }

    fn normalize_asset(
        &self,
        raw: &serde_json::Value,
    ) -> Result<TransactionAsset, TransactionError> {
        let public_key = parse_public_key(super::asset_str(raw, "public_key")?)?;
        Ok(TransactionAsset::SecondSignature { public_key })
    }

    fn apply(
        &self,
        tx: &Transaction,
        state: &TxState,
        _ctx: &TxContext<'_>,
    ) -> Result<Vec<AccountChange>, TransactionError> {
        let key = public_key(&tx.asset)?;
        if state.sender.second_signature {
            return Err(TransactionError::SecondSignatureExists);
        }
        let diff = AccountDiff {
            second_signature: Some(true),
            second_public_key: Some(Some(*key)),
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
        public_key(&tx.asset)?;
        let diff = AccountDiff {
            second_signature: Some(false),
            second_public_key: Some(None),
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
        public_key(&tx.asset)?;
        if state.sender.second_signature || state.sender.u_second_signature {
            return Err(TransactionError::SecondSignatureExists);
        }
        let diff = AccountDiff {
            u_second_signature: Some(true),
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
        public_key(&tx.asset)?;
        let diff = AccountDiff {
            u_second_signature: Some(false),
            ..Default::default()
        };
        Ok(vec![AccountChange::new(state.sender.address, diff)])
    }

    fn asset_collection(&self) -> Option<Collection> {
        Some(Collection::Signatures)
    }

    fn db_save(&self, tx: &Transaction) -> Option<StorageIntent> {
        let key = public_key(&tx.asset).ok()?;
        Some(StorageIntent::Create {
            collection: Collection::Signatures,
            values: row([
                ("transaction_id", Value::from(tx.header.id)),
                ("public_key", Value::from(*key)),
            ]),
        })
    }

    fn db_read(&self, row: &Row) -> Result<TransactionAsset, TransactionError> {
        let public_key = row
            .get("public_key")
            .and_then(Value::as_bytes)
            .and_then(|b| PublicKey::try_from(b).ok())
            .ok_or_else(|| TransactionError::Malformed("asset row is missing public_key".into()))?;
        Ok(TransactionAsset::SecondSignature { public_key })
    }
}
