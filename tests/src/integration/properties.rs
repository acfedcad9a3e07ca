//! # Inversion Properties
//!
//! Any sequence of confirmed transfers spread over whole rounds, reverted
//! block by block, leaves the ledger value of every account as it was.

#[cfg(test)]
mod tests {
    use crate::fixtures::{Chain, Holder, Wallet};
    use dl_03_ledger_core::RollbackCause;
    use proptest::prelude::*;
    use shared_types::{Amount, PublicKey};
    use std::collections::BTreeMap;

    const D1: PublicKey = [0xD1; 32];
    const D2: PublicKey = [0xD2; 32];
    const BLOCKS: u64 = 4;

    fn transfers() -> impl Strategy<Value = Vec<(usize, usize, Amount)>> {
        prop::collection::vec((0usize..3, 0usize..3, 1u64..1_000_000_000), 1..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_rounds_revert_to_genesis(transfers in transfers()) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let wallets: Vec<_> = (1..=3u8).map(Wallet::from_seed).collect();
                let votes = [Some(D1), Some(D2), None];
                let holders: Vec<_> = wallets
                    .iter()
                    .zip(votes)
                    .map(|(wallet, vote)| Holder {
                        public_key: wallet.public_key(),
                        balance: 1_000_000_000_000,
                        vote,
                    })
                    .collect();
                let chain = Chain::genesis(vec![D1, D2], 50_000_000, &holders).unwrap();
                let mut keys: Vec<_> = wallets.iter().map(Wallet::public_key).collect();
                keys.extend([D1, D2]);
                let before = chain.ledger_state(&keys).await;

                let mut per_block: BTreeMap<u64, Vec<_>> = BTreeMap::new();
                for (i, (from, to, amount)) in transfers.iter().enumerate() {
                    let to = wallets[*to].address();
                    let tx = chain.transfer(&wallets[*from], to, *amount, i as u32);
                    per_block.entry(i as u64 % BLOCKS + 1).or_default().push(tx);
                }

                let mut applied = Vec::new();
                for height in 1..=BLOCKS {
                    let block = chain.block(height, per_block.remove(&height).unwrap_or_default());
                    let snapshot = chain.apply(&block).await.unwrap();
                    applied.push((block, snapshot));
                }

                let landed = chain.ledger_state(&keys).await;
                assert_eq!(landed[&D1].vote, landed[&wallets[0].public_key()].balance);
                assert_eq!(landed[&D2].vote, landed[&wallets[1].public_key()].balance);

                for (block, snapshot) in applied.iter().rev() {
                    chain
                        .undo(block, snapshot.as_ref(), RollbackCause::Resync)
                        .await
                        .unwrap();
                }
                assert_eq!(chain.ledger_state(&keys).await, before);
            });
        }
    }
}
