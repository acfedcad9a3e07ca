//! # DPoS Ledger Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | dl-01 Round Economics | Fee/reward split of a 101-slot round, common-height probe |
//! | dl-02 Storage Intents | Planning and batching a block's worth of intents |
//! | dl-03 Ledger Core | Delta compilation, block apply + undo through the in-memory store |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dl_01_round_economics::{common_block_heights, RoundChanges};
use dl_02_storage_intents::{batch_ranges, plan};
use dl_03_ledger_core::{
    Account, AccountDiff, LedgerDeltaBuilder, MembershipChange, MembershipDiff, RollbackCause,
    RoundTag,
};
use dl_tests::fixtures::{address, Chain, Holder, Wallet};
use std::time::Duration;

// ============================================================================
// DL-01: Round Economics
// ============================================================================

fn bench_round_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("dl-01-round-economics");

    group.bench_function("round_changes_101_slots", |b| {
        b.iter(|| {
            let rewards = vec![150_000_000; 101];
            let changes = RoundChanges::new(7, black_box(123_456_789_123), rewards, 101).unwrap();
            let credited: u64 = (0..101).map(|i| changes.at(i).unwrap().balance).sum();
            black_box(credited)
        })
    });

    group.bench_function("common_block_heights", |b| {
        b.iter(|| black_box(common_block_heights(black_box(5_000_000))))
    });

    group.finish();
}

// ============================================================================
// DL-02 / DL-03: Delta compilation and intent planning
// ============================================================================

fn voter(delegates: usize) -> Account {
    let mut account = Account::with_public_key([0x11; 20], [0x11; 32]);
    account.balance = 1_000_000_000_000;
    account.delegates = (0..delegates).map(|i| [i as u8; 32]).collect();
    account
}

fn bench_delta_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("dl-03-delta-builder");

    for delegates in [1usize, 33, 101] {
        let account = voter(delegates);
        let diff = AccountDiff {
            balance: -110_000_000,
            u_delegates: MembershipDiff(vec![MembershipChange::Add([0xEE; 32])]),
            round: Some(RoundTag {
                round: 1,
                block_id: [0xB0; 32],
            }),
            ..Default::default()
        };
        group.throughput(Throughput::Elements(delegates as u64));
        group.bench_with_input(BenchmarkId::new("merge_account", delegates), &diff, |b, diff| {
            b.iter(|| black_box(LedgerDeltaBuilder::merge_account(&account, diff).unwrap()))
        });
    }

    let account = voter(101);
    let diff = AccountDiff {
        balance: -1,
        ..Default::default()
    };
    let intents: Vec<_> = (0..500)
        .flat_map(|_| LedgerDeltaBuilder::merge_account(&account, &diff).unwrap().intents)
        .map(Some)
        .collect();
    group.bench_function("plan_and_batch_500_merges", |b| {
        b.iter(|| {
            let statements = plan(intents.clone()).unwrap();
            black_box(batch_ranges(&statements, 100))
        })
    });

    group.finish();
}

// ============================================================================
// DL-03: Block application
// ============================================================================

fn bench_block_apply_undo(c: &mut Criterion) {
    let mut group = c.benchmark_group("dl-03-block-application");
    group.measurement_time(Duration::from_secs(10));

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let senders: Vec<_> = (1..=10u8).map(Wallet::from_seed).collect();
    let holders: Vec<_> = senders
        .iter()
        .map(|wallet| Holder {
            public_key: wallet.public_key(),
            balance: 1_000_000_000_000_000,
            vote: Some([0xD1; 32]),
        })
        .collect();
    // Two delegates: height 1 never closes a round.
    let chain = Chain::genesis(vec![[0xD1; 32], [0xD2; 32]], 0, &holders).unwrap();

    for size in [1usize, 25, 100] {
        let transactions: Vec<_> = (0..size)
            .map(|i| {
                let sender = &senders[i % senders.len()];
                chain.transfer(sender, address(&[0xCC; 32]), 1 + i as u64, i as u32)
            })
            .collect();
        let block = chain.block(1, transactions);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("apply_undo", size), &block, |b, block| {
            b.iter(|| {
                runtime.block_on(async {
                    chain.apply(block).await.unwrap();
                    chain.undo(block, None, RollbackCause::Resync).await.unwrap();
                })
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_round_split,
    bench_delta_compilation,
    bench_block_apply_undo
);
criterion_main!(benches);
