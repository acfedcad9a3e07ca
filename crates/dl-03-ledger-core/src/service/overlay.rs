//! Per-call account cache.
//!
//! Readers only see committed rows, so everything a block changes before its
//! intents are executed is tracked here. Accounts load lazily and are kept
//! current by applying every merged diff.

use crate::domain::{Account, AccountChange, AccountKey, LedgerResult};
use crate::ports::{AccountReader, CryptoService};
use shared_types::{Address, InvariantError, PublicKey};
use std::collections::BTreeMap;

pub(crate) struct AccountOverlay<'a, R: AccountReader> {
    reader: &'a R,
    crypto: &'a dyn CryptoService,
    accounts: BTreeMap<Address, Account>,
    by_key: BTreeMap<PublicKey, Address>,
}

impl<'a, R: AccountReader> AccountOverlay<'a, R> {
    pub(crate) fn new(reader: &'a R, crypto: &'a dyn CryptoService) -> Self {
        Self {
            reader,
            crypto,
            accounts: BTreeMap::new(),
            by_key: BTreeMap::new(),
        }
    }

    fn remember(&mut self, account: Account) -> Account {
        if let Some(key) = account.public_key {
            self.by_key.insert(key, account.address);
        }
        self.accounts.insert(account.address, account.clone());
        account
    }

    /// Account at `address`; a fresh one when nothing is stored.
    pub(crate) async fn by_address(&mut self, address: &Address) -> LedgerResult<Account> {
        if let Some(account) = self.accounts.get(address) {
            return Ok(account.clone());
        }
        let account = self
            .reader
            .get_account(AccountKey::Address(*address))
            .await?
            .unwrap_or_else(|| Account::new(*address));
        Ok(self.remember(account))
    }

    /// Stored account holding `public_key`, if any.
    pub(crate) async fn find_public_key(
        &mut self,
        public_key: &PublicKey,
    ) -> LedgerResult<Option<Account>> {
        if let Some(account) = self.by_key.get(public_key).and_then(|a| self.accounts.get(a)) {
            return Ok(Some(account.clone()));
        }
        match self.reader.get_account(AccountKey::PublicKey(*public_key)).await? {
            Some(account) => match self.accounts.get(&account.address) {
                Some(cached) => Ok(Some(cached.clone())),
                None => Ok(Some(self.remember(account))),
            },
            None => Ok(None),
        }
    }

    /// Sender account of `public_key`. An account first seen by address
    /// takes the key on its first outgoing transaction.
    pub(crate) async fn sender(&mut self, public_key: &PublicKey) -> LedgerResult<Account> {
        if let Some(account) = self.find_public_key(public_key).await? {
            return Ok(account);
        }
        let address = self.crypto.derive_address(public_key);
        let mut account = self.by_address(&address).await?;
        if account.public_key.is_none() {
            account.public_key = Some(*public_key);
            account = self.remember(account);
        }
        Ok(account)
    }

    /// Account other than `except` holding `username`, confirmed or pending.
    pub(crate) async fn username_owner(
        &mut self,
        username: &str,
        except: &Address,
    ) -> LedgerResult<Option<Account>> {
        let holds = |account: &Account| {
            account.username.as_deref() == Some(username)
                || account.u_username.as_deref() == Some(username)
        };
        if let Some(owner) = self
            .accounts
            .values()
            .find(|a| a.address != *except && holds(a))
        {
            return Ok(Some(owner.clone()));
        }
        let Some(stored) = self.reader.get_account_by_username(username).await? else {
            return Ok(None);
        };
        if stored.address == *except {
            return Ok(None);
        }
        // A cached copy is newer than the stored row.
        match self.accounts.get(&stored.address) {
            Some(cached) => Ok(holds(cached).then(|| cached.clone())),
            None => Ok(Some(self.remember(stored))),
        }
    }

    /// Merge `change` into the cached account. Load it first with
    /// `by_address` so the stored state is not shadowed.
    pub(crate) fn apply(&mut self, change: &AccountChange) -> Result<(), InvariantError> {
        let account = self
            .accounts
            .entry(change.address)
            .or_insert_with(|| Account::new(change.address));
        change.diff.apply_to(account)?;
        if let Some(key) = account.public_key {
            self.by_key.insert(key, account.address);
        }
        Ok(())
    }
}
