//! # Ledger Service Tests

use super::*;
use crate::adapters::StoreLedgerReader;
use crate::domain::lifecycle::test_support::{address_of, transaction, AcceptAll};
use crate::domain::{Account, AccountKey};
use dl_01_round_economics::RoundSegment;
use dl_02_storage_intents::{row, Collection, InMemoryStatementStore};
use shared_types::{Address, Amount, PublicKey};

const SENDER: PublicKey = [0x11; 32];
const RECIPIENT: Address = [0x22; 20];
const GEN_A: PublicKey = [0xA1; 32];
const GEN_B: PublicKey = [0xB2; 32];
const SENDER_BALANCE: Amount = 5_000_000_000;
const SEND_FEE: Amount = 10_000_000;

type TestReader = StoreLedgerReader<InMemoryStatementStore>;

struct Harness {
    store: Arc<InMemoryStatementStore>,
    reader: Arc<TestReader>,
    service: LedgerService<InMemoryStatementStore, TestReader, AcceptAll>,
}

impl Harness {
    async fn account(&self, key: PublicKey) -> Account {
        self.reader
            .get_account(AccountKey::PublicKey(key))
            .await
            .unwrap()
            .unwrap()
    }

    async fn recipient(&self) -> Option<Account> {
        self.reader
            .get_account(AccountKey::Address(RECIPIENT))
            .await
            .unwrap()
    }
}

fn account_row(key: PublicKey, balance: Amount, vote: Amount, is_delegate: bool) -> Row {
    row([
        ("address", Value::from(address_of(&key))),
        ("public_key", Value::from(key)),
        ("balance", Value::Int(balance as i64)),
        ("u_balance", Value::Int(balance as i64)),
        ("vote", Value::Int(vote as i64)),
        ("is_delegate", Value::Bool(is_delegate)),
        ("u_is_delegate", Value::Bool(is_delegate)),
        ("virgin", Value::Bool(false)),
    ])
}

/// Two-slot rounds forged by GEN_A then GEN_B. The sender votes for GEN_A
/// with its whole balance.
fn harness() -> Harness {
    let store = Arc::new(InMemoryStatementStore::new());
    store.seed(
        Collection::Accounts,
        vec![
            account_row(SENDER, SENDER_BALANCE, 0, false),
            account_row(GEN_A, 0, SENDER_BALANCE, true),
            account_row(GEN_B, 0, 0, true),
        ],
    );
    store.seed(
        Collection::AccountDelegates,
        vec![crate::domain::account::membership_row(&address_of(&SENDER), &GEN_A)],
    );

    let reader = Arc::new(StoreLedgerReader::new(store.clone()));
    reader.set_round_delegates(1, vec![GEN_A, GEN_B]);

    let mut config = LedgerConfig::default();
    config.economics.round_segments = vec![RoundSegment {
        from_height: 1,
        delegates: 2,
    }];
    let deps = LedgerDependencies {
        store: store.clone(),
        reader: reader.clone(),
        crypto: AcceptAll,
    };
    let service = LedgerService::new(deps, config).unwrap();
    Harness {
        store,
        reader,
        service,
    }
}

fn send(amount: Amount) -> Transaction {
    let mut tx = transaction(SENDER, TransactionAsset::Send, amount, SEND_FEE);
    tx.header.recipient_id = Some(RECIPIENT);
    tx
}

fn block(height: u64, generator: PublicKey, transactions: Vec<Transaction>) -> Block {
    Block {
        id: [height as u8 + 100; 32],
        height,
        generator_public_key: generator,
        previous_block: None,
        timestamp: 0,
        reward: 0,
        total_fee: transactions.iter().map(|tx| tx.header.fee).sum(),
        transactions,
    }
}

#[tokio::test]
async fn test_apply_and_undo_block() {
    let h = harness();
    let block = block(1, GEN_A, vec![send(100_000_000)]);

    let snapshot = h.service.apply_block(&block).await.unwrap();
    assert!(snapshot.is_none());
    assert_eq!(h.service.tip(), 1);

    let sender = h.account(SENDER).await;
    assert_eq!(sender.balance, SENDER_BALANCE - 110_000_000);
    assert_eq!(sender.u_balance, SENDER_BALANCE - 110_000_000);
    assert_eq!(h.recipient().await.unwrap().balance, 100_000_000);
    assert_eq!(h.account(GEN_A).await.produced_blocks, 1);

    let scratch = h.reader.scratch_entries(1).await.unwrap();
    assert_eq!(scratch.len(), 1);
    assert_eq!((scratch[0].delegate, scratch[0].amount), (GEN_A, -110_000_000));

    h.service
        .undo_block(&block, None, RollbackCause::Resync)
        .await
        .unwrap();
    let sender = h.account(SENDER).await;
    assert_eq!((sender.balance, sender.u_balance), (SENDER_BALANCE, SENDER_BALANCE));
    assert_eq!(h.recipient().await.unwrap().balance, 0);
    assert_eq!(h.account(GEN_A).await.produced_blocks, 0);
    let net: i64 = h
        .reader
        .scratch_entries(1)
        .await
        .unwrap()
        .iter()
        .map(|e| e.amount)
        .sum();
    assert_eq!(net, 0);
    assert_eq!(h.service.tip(), 0);
}

#[tokio::test]
async fn test_round_lands_and_rolls_back() {
    let h = harness();
    let first = block(1, GEN_A, vec![send(100_000_000)]);
    h.service.apply_block(&first).await.unwrap();
    h.reader.record_block(first.summary());

    let closing = block(2, GEN_B, Vec::new());
    let snapshot = h.service.apply_block(&closing).await.unwrap().unwrap();
    assert_eq!(snapshot.round, 1);
    assert_eq!(snapshot.votes, vec![(GEN_A, SENDER_BALANCE)]);

    // 10_000_000 of fees split over two slots.
    let a = h.account(GEN_A).await;
    let b = h.account(GEN_B).await;
    assert_eq!((a.balance, a.fees), (5_000_000, 5_000_000));
    assert_eq!((b.balance, b.fees), (5_000_000, 5_000_000));
    assert_eq!(a.vote, SENDER_BALANCE - 110_000_000);
    assert_eq!((a.missed_blocks, b.missed_blocks), (0, 0));
    assert!(h.store.rows(Collection::RoundScratch).is_empty());

    let missing = h
        .service
        .undo_block(&closing, None, RollbackCause::ForkResolution)
        .await
        .unwrap_err();
    assert!(missing.requires_halt());
    assert_eq!(h.account(GEN_A).await.balance, 5_000_000);

    h.service
        .undo_block(&closing, Some(&snapshot), RollbackCause::ForkResolution)
        .await
        .unwrap();
    let a = h.account(GEN_A).await;
    assert_eq!((a.balance, a.fees, a.vote), (0, 0, SENDER_BALANCE));
    assert_eq!(h.account(GEN_B).await.produced_blocks, 0);
    assert_eq!(h.store.rows(Collection::RoundScratch).len(), 1);
    let audit = h.store.rows(Collection::RoundRollbacks);
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].get("height"), Some(&Value::Int(2)));

    h.service
        .undo_block(&first, None, RollbackCause::ForkResolution)
        .await
        .unwrap();
    let sender = h.account(SENDER).await;
    assert_eq!((sender.balance, sender.u_balance), (SENDER_BALANCE, SENDER_BALANCE));
}

#[tokio::test]
async fn test_rejected_transaction_writes_nothing() {
    let h = harness();
    let block = block(1, GEN_A, vec![send(SENDER_BALANCE)]);
    let error = h.service.apply_block(&block).await.unwrap_err();
    assert!(!error.is_recoverable());
    assert!(error.requires_halt());
    assert!(matches!(
        error,
        LedgerError::BlockApplication {
            height: 1,
            source: TransactionError::InsufficientBalance { .. }
        }
    ));
    assert_eq!(h.account(SENDER).await.balance, SENDER_BALANCE);
    assert_eq!(h.account(GEN_A).await.produced_blocks, 0);
    assert!(h.recipient().await.is_none());
    assert_eq!(h.service.tip(), 0);
}

#[tokio::test]
async fn test_same_overdraft_halts_in_block_but_not_in_pool() {
    let h = harness();
    let overdraft = send(SENDER_BALANCE);

    let pooled = h.service.apply_unconfirmed(&overdraft).await.unwrap_err();
    assert!(pooled.is_recoverable());
    assert!(!pooled.requires_halt());

    let accepted = block(1, GEN_A, vec![overdraft]);
    let error = h.service.apply_block(&accepted).await.unwrap_err();
    assert!(!error.is_recoverable());
    assert!(error.requires_halt());
    assert_eq!(h.account(SENDER).await.u_balance, SENDER_BALANCE);
}

#[tokio::test]
async fn test_later_transactions_see_earlier_ones() {
    let h = harness();
    // Each send alone fits the balance; together they do not.
    let mut second = send(SENDER_BALANCE / 2);
    second.header.id = [0xEE; 32];
    let block = block(1, GEN_A, vec![send(SENDER_BALANCE / 2), second]);
    let error = h.service.apply_block(&block).await.unwrap_err();
    assert!(matches!(
        error,
        LedgerError::BlockApplication {
            source: TransactionError::InsufficientBalance { .. },
            ..
        }
    ));
    assert_eq!(h.account(SENDER).await.balance, SENDER_BALANCE);
}

#[tokio::test]
async fn test_pool_transactions() {
    let h = harness();
    let tx = send(100_000_000);
    assert!(h.service.ready(&tx).await.unwrap());
    h.service.verify(&tx, 1).await.unwrap();

    h.service.apply_unconfirmed(&tx).await.unwrap();
    let sender = h.account(SENDER).await;
    assert_eq!(sender.u_balance, SENDER_BALANCE - 110_000_000);
    assert_eq!(sender.balance, SENDER_BALANCE);

    h.service.undo_unconfirmed(&tx).await.unwrap();
    assert_eq!(h.account(SENDER).await.u_balance, SENDER_BALANCE);

    let mut overpaid = send(100_000_000);
    overpaid.header.fee = SEND_FEE + 1;
    assert!(matches!(
        h.service.verify(&overpaid, 1).await,
        Err(LedgerError::Transaction(TransactionError::FeeMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_pending_second_signature_blocks_another() {
    let h = harness();
    let tx = transaction(
        SENDER,
        TransactionAsset::SecondSignature {
            public_key: [0x77; 32],
        },
        0,
        500_000_000,
    );
    h.service.apply_unconfirmed(&tx).await.unwrap();
    assert_eq!(
        h.service.apply_unconfirmed(&tx).await,
        Err(LedgerError::Transaction(TransactionError::SecondSignatureExists))
    );
}

#[tokio::test]
async fn test_first_outgoing_transaction_records_public_key() {
    let h = harness();
    let newcomer: PublicKey = [0x33; 32];
    h.store.seed(
        Collection::Accounts,
        vec![row([
            ("address", Value::from(address_of(&newcomer))),
            ("balance", Value::Int(1_000_000_000)),
            ("u_balance", Value::Int(1_000_000_000)),
        ])],
    );
    let mut tx = transaction(newcomer, TransactionAsset::Send, 1, SEND_FEE);
    tx.header.recipient_id = Some(RECIPIENT);
    h.service.apply_unconfirmed(&tx).await.unwrap();

    let account = h.account(newcomer).await;
    assert_eq!(account.public_key, Some(newcomer));
    assert_eq!(account.u_balance, 1_000_000_000 - SEND_FEE - 1);
}

#[tokio::test]
async fn test_attach_assets_after_delegate_registration() {
    let h = harness();
    let register = transaction(
        SENDER,
        TransactionAsset::Delegate {
            username: "carol".into(),
        },
        0,
        2_500_000_000,
    );
    let transfer = send(1);
    h.service
        .apply_block(&block(1, GEN_A, vec![register.clone(), transfer.clone()]))
        .await
        .unwrap();
    let sender = h.account(SENDER).await;
    assert!(sender.is_delegate);
    assert_eq!(sender.username.as_deref(), Some("carol"));

    let loaded = h
        .service
        .attach_assets(vec![register.header.clone(), transfer.header.clone()])
        .await
        .unwrap();
    assert_eq!(loaded, vec![register.clone(), transfer]);

    let mut unknown = register.header.clone();
    unknown.id = [0xFF; 32];
    assert!(matches!(
        h.service.attach_assets(vec![unknown]).await,
        Err(LedgerError::Transaction(TransactionError::Malformed(_)))
    ));
}

#[tokio::test]
async fn test_username_taken_across_accounts() {
    let h = harness();
    let mut row = account_row([0x44; 32], 0, 0, true);
    row.insert("username".into(), Value::from("carol"));
    row.insert("u_username".into(), Value::from("carol"));
    h.store.seed(Collection::Accounts, vec![row]);

    let register = transaction(
        SENDER,
        TransactionAsset::Delegate {
            username: "carol".into(),
        },
        0,
        2_500_000_000,
    );
    assert_eq!(
        h.service.apply_unconfirmed(&register).await,
        Err(LedgerError::Transaction(TransactionError::UsernameTaken {
            username: "carol".into()
        }))
    );
}

#[test]
fn test_normalize_derives_id_and_sender() {
    let h = harness();
    let raw = RawTransaction::from_json_str(&format!(
        r#"{{"type": 0, "sender_public_key": "{}", "recipient_id": "{}", "amount": 5, "fee": 10000000, "timestamp": 7, "signature": "{}"}}"#,
        to_hex(&SENDER),
        to_hex(&RECIPIENT),
        to_hex(&[0u8; 64]),
    ))
    .unwrap();
    let tx = h.service.normalize(&raw).unwrap();
    assert_eq!(tx.header.sender_id, address_of(&SENDER));
    assert_eq!(tx.header.id, h.service.registry().transaction_id(&tx));
    assert_eq!(tx.asset, TransactionAsset::Send);
}
