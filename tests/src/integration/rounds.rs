//! # Round Landing Flows
//!
//! Vote weight queued in round scratch rows during a round becomes visible
//! on the delegates only when the round lands, and is restored exactly when
//! the round-closing block is reverted.

#[cfg(test)]
mod tests {
    use crate::fixtures::{address, Chain, Holder, Wallet};
    use dl_02_storage_intents::{Collection, Value};
    use dl_03_ledger_core::account::membership_row;
    use dl_03_ledger_core::{LedgerError, MembershipChange, RollbackCause, RoundReader};
    use shared_types::{Amount, InvariantError, PublicKey};
    use std::collections::BTreeSet;

    const D1: PublicKey = [0xD1; 32];
    const D2: PublicKey = [0xD2; 32];
    const D3: PublicKey = [0xD3; 32];
    const REWARD: Amount = 100_000_000;
    const VOTE_FEE: Amount = 100_000_000;
    const BALANCE: Amount = 1_000_000_000_000;

    fn genesis(alice: &Wallet) -> Chain {
        Chain::genesis(
            vec![D1, D2, D3],
            REWARD,
            &[Holder {
                public_key: alice.public_key(),
                balance: BALANCE,
                vote: Some(D1),
            }],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_vote_weight_lands_with_round() {
        let alice = Wallet::from_seed(1);
        let chain = genesis(&alice);

        let vote = chain.vote(&alice, vec![MembershipChange::Add(D3)], 1);
        let blocks = [
            chain.block(1, vec![vote]),
            chain.block(2, Vec::new()),
            chain.block(3, Vec::new()),
        ];

        chain.apply(&blocks[0]).await.unwrap();
        // Queued, not landed.
        assert_eq!(chain.account(&D3).await.vote, 0);
        assert_eq!(chain.account(&D1).await.vote, BALANCE);
        let queued: Vec<_> = chain
            .reader
            .scratch_entries(1)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| (entry.delegate, entry.amount))
            .collect();
        assert_eq!(
            queued,
            vec![(D1, -(VOTE_FEE as i64)), (D3, (BALANCE - VOTE_FEE) as i64)]
        );

        chain.apply(&blocks[1]).await.unwrap();
        let snapshot = chain.apply(&blocks[2]).await.unwrap().unwrap();
        assert_eq!(snapshot.votes, vec![(D1, BALANCE), (D3, 0)]);

        let alice_balance = chain.account(&alice.public_key()).await.balance;
        assert_eq!(alice_balance, BALANCE - VOTE_FEE);
        assert_eq!(chain.account(&D1).await.vote, alice_balance);
        assert_eq!(chain.account(&D3).await.vote, alice_balance);
        assert!(chain.store.rows(Collection::RoundScratch).is_empty());

        chain
            .undo(&blocks[2], Some(&snapshot), RollbackCause::Operator)
            .await
            .unwrap();
        assert_eq!(chain.account(&D1).await.vote, BALANCE);
        assert_eq!(chain.account(&D3).await.vote, 0);

        chain.undo(&blocks[1], None, RollbackCause::Operator).await.unwrap();
        chain.undo(&blocks[0], None, RollbackCause::Operator).await.unwrap();
        let alice_account = chain.account(&alice.public_key()).await;
        assert_eq!(alice_account.delegates, BTreeSet::from([D1]));
        assert_eq!(alice_account.u_delegates, BTreeSet::from([D1]));
        assert_eq!(alice_account.balance, BALANCE);

        let audit = chain.store.rows(Collection::RoundRollbacks);
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0]["cause"], Value::from("operator"));
        assert_eq!(audit[0]["round"], Value::Int(1));
    }

    /// A generator that itself votes passes its round credit on to the
    /// delegate it votes for, in the same landing.
    #[tokio::test]
    async fn test_round_credit_moves_generator_votes() {
        let alice = Wallet::from_seed(1);
        let chain = genesis(&alice);
        chain.store.seed(
            Collection::AccountDelegates,
            vec![membership_row(&address(&D2), &D1)],
        );

        let blocks: Vec<_> = (1..=3).map(|h| chain.block(h, Vec::new())).collect();
        let mut snapshot = None;
        for block in &blocks {
            snapshot = chain.apply(block).await.unwrap();
        }
        let snapshot = snapshot.unwrap();

        let d2 = chain.account(&D2).await;
        assert_eq!((d2.balance, d2.rewards), (REWARD, REWARD));
        assert_eq!(chain.account(&D1).await.vote, BALANCE + REWARD);

        chain
            .undo(&blocks[2], Some(&snapshot), RollbackCause::Resync)
            .await
            .unwrap();
        assert_eq!(chain.account(&D1).await.vote, BALANCE);
        assert_eq!(chain.account(&D2).await.balance, 0);
    }

    #[tokio::test]
    async fn test_closing_block_needs_its_snapshot() {
        let alice = Wallet::from_seed(1);
        let chain = genesis(&alice);
        let blocks: Vec<_> = (1..=3).map(|h| chain.block(h, Vec::new())).collect();
        let mut snapshots = Vec::new();
        for block in &blocks {
            snapshots.push(chain.apply(block).await.unwrap());
        }

        let error = chain
            .undo(&blocks[2], None, RollbackCause::Resync)
            .await
            .unwrap_err();
        assert_eq!(
            error,
            LedgerError::Invariant(InvariantError::MissingRoundSnapshot { round: 1 })
        );
        assert!(error.requires_halt());
        assert_eq!(chain.service.tip(), 3);
        assert_eq!(chain.account(&D3).await.balance, REWARD);

        let mut foreign = snapshots[2].clone().unwrap();
        foreign.round = 2;
        assert!(matches!(
            chain.undo(&blocks[2], Some(&foreign), RollbackCause::Resync).await,
            Err(LedgerError::Invariant(InvariantError::SnapshotRoundMismatch { .. }))
        ));
    }
}
