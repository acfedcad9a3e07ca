//! # Block Flows
//!
//! Signed transfers through `LedgerService::apply_block` / `undo_block`,
//! with every mutation going through the `IntentExecutor` into the
//! in-memory store.
//!
//! ## Flows Tested:
//!
//! 1. Two full rounds forward, then back to genesis
//! 2. A store failure mid-block leaves no trace
//! 3. Tampered transactions fail Ed25519 verification

#[cfg(test)]
mod tests {
    use crate::fixtures::{Chain, Holder, Wallet};
    use dl_02_storage_intents::{Collection, Value};
    use dl_03_ledger_core::{Account, LedgerApi, LedgerError, RollbackCause, TransactionError};
    use shared_types::{Address, Amount, PublicKey};
    use std::collections::BTreeMap;

    const D1: PublicKey = [0xD1; 32];
    const D2: PublicKey = [0xD2; 32];
    const D3: PublicKey = [0xD3; 32];
    const CAROL: Address = [0xCC; 20];
    const REWARD: Amount = 100_000_000;
    const SEND_FEE: Amount = 10_000_000;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn genesis(alice: &Wallet, bob: &Wallet) -> Chain {
        Chain::genesis(
            vec![D1, D2, D3],
            REWARD,
            &[
                Holder {
                    public_key: alice.public_key(),
                    balance: 1_000_000_000_000,
                    vote: Some(D1),
                },
                Holder {
                    public_key: bob.public_key(),
                    balance: 500_000_000_000,
                    vote: Some(D2),
                },
            ],
        )
        .unwrap()
    }

    fn total_balance(state: &BTreeMap<PublicKey, Account>) -> Amount {
        state.values().map(|account| account.balance).sum()
    }

    // =============================================================================
    // INTEGRATION TESTS: APPLY / UNDO
    // =============================================================================

    /// Six blocks over two rounds, D3 missing its slot in the second, then
    /// every block reverted.
    #[tokio::test]
    async fn test_two_rounds_forward_and_back() {
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let chain = genesis(&alice, &bob);
        let keys = [alice.public_key(), bob.public_key(), D1, D2, D3];
        let before = chain.ledger_state(&keys).await;

        let mut blocks = Vec::new();
        let mut snapshots = BTreeMap::new();
        for height in 1..=6u64 {
            let mut txs = vec![chain.transfer(&alice, CAROL, height * 100_000_000, height as u32)];
            if height % 2 == 0 {
                txs.push(chain.transfer(&bob, alice.address(), 100_000_000, height as u32));
            }
            let mut block = chain.block(height, txs);
            if height == 6 {
                block.generator_public_key = D1;
            }
            if let Some(snapshot) = chain.apply(&block).await.unwrap() {
                snapshots.insert(height, snapshot);
            }
            blocks.push(block);
        }

        assert_eq!(snapshots.keys().copied().collect::<Vec<_>>(), vec![3, 6]);
        assert_eq!(chain.service.tip(), 6);

        let after = chain.ledger_state(&keys).await;
        let (d1, d2, d3) = (&after[&D1], &after[&D2], &after[&D3]);
        assert_eq!(d1.fees + d2.fees + d3.fees, 9 * SEND_FEE);
        assert_eq!(
            (d1.rewards, d2.rewards, d3.rewards),
            (3 * REWARD, 2 * REWARD, REWARD)
        );
        assert_eq!(
            (d1.produced_blocks, d2.produced_blocks, d3.produced_blocks),
            (3, 2, 1)
        );
        assert_eq!((d1.missed_blocks, d2.missed_blocks, d3.missed_blocks), (0, 0, 1));
        assert_eq!(d1.vote, after[&alice.public_key()].balance);
        assert_eq!(d2.vote, after[&bob.public_key()].balance);

        let carol = chain.balance_of(CAROL).await;
        assert_eq!(carol, 21 * 100_000_000);
        assert_eq!(
            total_balance(&after) + carol,
            total_balance(&before) + 6 * REWARD
        );

        for block in blocks.iter().rev() {
            chain
                .undo(block, snapshots.get(&block.height), RollbackCause::ForkResolution)
                .await
                .unwrap();
        }
        assert_eq!(chain.ledger_state(&keys).await, before);
        assert_eq!(chain.balance_of(CAROL).await, 0);
        assert_eq!(chain.service.tip(), 0);

        let audit: Vec<_> = chain
            .store
            .rows(Collection::RoundRollbacks)
            .into_iter()
            .map(|row| (row["height"].clone(), row["cause"].clone()))
            .collect();
        assert_eq!(
            audit,
            vec![
                (Value::Int(6), Value::from("fork_resolution")),
                (Value::Int(3), Value::from("fork_resolution")),
            ]
        );
    }

    #[tokio::test]
    async fn test_store_failure_leaves_no_trace() {
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let chain = genesis(&alice, &bob);
        let keys = [alice.public_key(), D1];
        let before = chain.ledger_state(&keys).await;

        let block = chain.block(1, vec![chain.transfer(&alice, CAROL, 100_000_000, 1)]);
        chain.store.fail_on(Some(Collection::RoundScratch));
        let error = chain.apply(&block).await.unwrap_err();
        assert!(error.requires_halt());
        assert!(!error.is_recoverable());
        assert_eq!(chain.ledger_state(&keys).await, before);
        assert_eq!(chain.balance_of(CAROL).await, 0);
        assert_eq!(chain.service.tip(), 0);

        chain.store.fail_on(None);
        chain.apply(&block).await.unwrap();
        assert_eq!(chain.balance_of(CAROL).await, 100_000_000);
        assert_eq!(chain.account(&D1).await.produced_blocks, 1);
    }

    #[tokio::test]
    async fn test_tampered_transfer_fails_verification() {
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let chain = genesis(&alice, &bob);

        let tx = chain.transfer(&alice, CAROL, 100_000_000, 1);
        chain.service.verify(&tx, 1).await.unwrap();

        let mut inflated = tx.clone();
        inflated.header.amount += 1;
        assert_eq!(
            chain.service.verify(&inflated, 1).await,
            Err(LedgerError::Transaction(TransactionError::InvalidSignature))
        );

        // Signed by bob, claimed by alice.
        let mut forged = chain.transfer(&bob, CAROL, 100_000_000, 1);
        forged.header.sender_public_key = alice.public_key();
        assert_eq!(
            chain.service.verify(&forged, 1).await,
            Err(LedgerError::Transaction(TransactionError::SenderMismatch))
        );
    }
}
