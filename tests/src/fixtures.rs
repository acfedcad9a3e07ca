//! # Test Fixtures
//!
//! A single-node chain over the in-memory store: genesis accounts, signed
//! transactions and blocks forged in slot order.

use dl_01_round_economics::{Milestone, RoundSegment};
use dl_02_storage_intents::{row, Collection, InMemoryStatementStore, Row, Value};
use dl_03_ledger_core::account::membership_row;
use dl_03_ledger_core::{
    Account, AccountKey, AccountReader, Block, CryptoService, Ed25519Crypto, LedgerApi,
    LedgerConfig, LedgerDependencies, LedgerResult, LedgerService, MembershipChange,
    MembershipDiff, RollbackCause, RoundSnapshot, StoreLedgerReader, Transaction,
    TransactionAsset, TransactionHeader, TransactionRegistry, TransactionType,
};
use ed25519_dalek::{Signer, SigningKey};
use shared_types::{Address, Amount, PublicKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub type Store = InMemoryStatementStore;
pub type Reader = StoreLedgerReader<Store>;
pub type Service = LedgerService<Store, Reader, Ed25519Crypto>;

/// Install a test subscriber once; filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn address(public_key: &PublicKey) -> Address {
    Ed25519Crypto.derive_address(public_key)
}

// =============================================================================
// WALLETS
// =============================================================================

pub struct Wallet {
    key: SigningKey,
}

impl Wallet {
    pub fn from_seed(seed: u8) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> Address {
        address(&self.public_key())
    }

    /// Sign `tx` and derive its id.
    pub fn sign(&self, registry: &TransactionRegistry, mut tx: Transaction) -> Transaction {
        tx.header.signature = self.key.sign(&registry.signing_hash(&tx)).to_bytes();
        tx.header.id = registry.transaction_id(&tx);
        tx
    }
}

/// Genesis account: a key holder with a balance and at most one vote.
pub struct Holder {
    pub public_key: PublicKey,
    pub balance: Amount,
    pub vote: Option<PublicKey>,
}

// =============================================================================
// CHAIN
// =============================================================================

pub struct Chain {
    pub store: Arc<Store>,
    pub reader: Arc<Reader>,
    pub service: Service,
    pub delegates: Vec<PublicKey>,
    pub reward: Amount,
}

impl Chain {
    /// Chain whose every round is forged by `delegates` in order, paying
    /// `reward` per block.
    pub fn genesis(
        delegates: Vec<PublicKey>,
        reward: Amount,
        holders: &[Holder],
    ) -> LedgerResult<Self> {
        init_tracing();
        let store = Arc::new(InMemoryStatementStore::new());

        let mut accounts: Vec<Row> = holders
            .iter()
            .map(|h| account_row(&h.public_key, h.balance, 0, false))
            .collect();
        for delegate in &delegates {
            let vote = holders
                .iter()
                .filter(|h| h.vote == Some(*delegate))
                .map(|h| h.balance)
                .sum();
            accounts.push(account_row(delegate, 0, vote, true));
        }
        store.seed(Collection::Accounts, accounts);
        let votes: Vec<Row> = holders
            .iter()
            .filter_map(|h| h.vote.map(|d| membership_row(&address(&h.public_key), &d)))
            .collect();
        store.seed(Collection::AccountDelegates, votes.clone());
        store.seed(Collection::AccountUnconfirmedDelegates, votes);

        let reader = Arc::new(StoreLedgerReader::new(store.clone()));
        let mut config = LedgerConfig::default();
        config.economics.round_segments = vec![RoundSegment {
            from_height: 1,
            delegates: delegates.len() as u64,
        }];
        config.economics.milestones = vec![Milestone {
            from_height: 1,
            reward,
        }];
        let deps = LedgerDependencies {
            store: store.clone(),
            reader: reader.clone(),
            crypto: Ed25519Crypto,
        };
        let service = LedgerService::new(deps, config)?;
        Ok(Self {
            store,
            reader,
            service,
            delegates,
            reward,
        })
    }

    /// Slot owner of `height`.
    pub fn generator(&self, height: u64) -> PublicKey {
        let slots = self.delegates.len() as u64;
        self.delegates[((height - 1) % slots) as usize]
    }

    fn unsigned(
        &self,
        from: &Wallet,
        tx_type: TransactionType,
        recipient: Option<Address>,
        amount: Amount,
        timestamp: u32,
    ) -> TransactionHeader {
        let fees = self.service.config().fees.fees_at(self.service.tip() + 1);
        let fee = match tx_type {
            TransactionType::Vote => fees.vote,
            TransactionType::SecondSignature => fees.second_signature,
            TransactionType::Delegate => fees.delegate,
            _ => fees.send,
        };
        TransactionHeader {
            id: [0u8; 32],
            tx_type,
            sender_public_key: from.public_key(),
            sender_id: from.address(),
            recipient_id: recipient,
            amount,
            fee,
            timestamp,
            signature: [0u8; 64],
            sign_signature: None,
            signatures: Vec::new(),
        }
    }

    pub fn transfer(
        &self,
        from: &Wallet,
        to: Address,
        amount: Amount,
        timestamp: u32,
    ) -> Transaction {
        let header = self.unsigned(from, TransactionType::Send, Some(to), amount, timestamp);
        let tx = Transaction {
            header,
            asset: TransactionAsset::Send,
        };
        from.sign(self.service.registry(), tx)
    }

    pub fn vote(
        &self,
        from: &Wallet,
        changes: Vec<MembershipChange>,
        timestamp: u32,
    ) -> Transaction {
        let header = self.unsigned(from, TransactionType::Vote, Some(from.address()), 0, timestamp);
        let tx = Transaction {
            header,
            asset: TransactionAsset::Vote {
                votes: MembershipDiff(changes),
            },
        };
        from.sign(self.service.registry(), tx)
    }

    pub fn block(&self, height: u64, transactions: Vec<Transaction>) -> Block {
        let mut id = [0xB0; 32];
        id[..8].copy_from_slice(&height.to_le_bytes());
        Block {
            id,
            height,
            generator_public_key: self.generator(height),
            previous_block: None,
            timestamp: height as u32 * 30,
            reward: self.reward,
            total_fee: transactions.iter().map(|tx| tx.header.fee).sum(),
            transactions,
        }
    }

    /// Register the forging list of the block's round, verify every
    /// transaction, apply the block and index it.
    pub async fn apply(&self, block: &Block) -> LedgerResult<Option<RoundSnapshot>> {
        let round = self.service.rounds().schedule().round(block.height);
        self.reader.set_round_delegates(round, self.delegates.clone());
        for tx in &block.transactions {
            self.service.verify(tx, block.height).await?;
        }
        let snapshot = self.service.apply_block(block).await?;
        self.reader.record_block(block.summary());
        Ok(snapshot)
    }

    pub async fn undo(
        &self,
        block: &Block,
        snapshot: Option<&RoundSnapshot>,
        cause: RollbackCause,
    ) -> LedgerResult<()> {
        self.service.undo_block(block, snapshot, cause).await?;
        self.reader.forget_block(block.height);
        Ok(())
    }

    pub async fn account(&self, public_key: &PublicKey) -> Account {
        self.reader
            .get_account(AccountKey::PublicKey(*public_key))
            .await
            .expect("account read")
            .expect("account exists")
    }

    pub async fn balance_of(&self, address: Address) -> Amount {
        self.reader
            .get_account(AccountKey::Address(address))
            .await
            .expect("account read")
            .map_or(0, |account| account.balance)
    }

    /// Ledger value of `keys`, without the one-way markers.
    pub async fn ledger_state(&self, keys: &[PublicKey]) -> BTreeMap<PublicKey, Account> {
        let mut state = BTreeMap::new();
        for key in keys {
            let mut account = self.account(key).await;
            account.virgin = true;
            account.block_id = None;
            state.insert(*key, account);
        }
        state
    }
}

fn account_row(public_key: &PublicKey, balance: Amount, vote: Amount, is_delegate: bool) -> Row {
    row([
        ("address", Value::from(address(public_key))),
        ("public_key", Value::from(*public_key)),
        ("balance", Value::Int(balance as i64)),
        ("u_balance", Value::Int(balance as i64)),
        ("vote", Value::Int(vote as i64)),
        ("is_delegate", Value::Bool(is_delegate)),
        ("u_is_delegate", Value::Bool(is_delegate)),
    ])
}
