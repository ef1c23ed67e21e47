//! Criterion benchmarks for lixi-engine hot paths.
//!
//! Covers: share allocation and draining a full session through the registry.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use lixi_core::error::SchedulerError;
use lixi_core::traits::{Scheduler, Task};
use lixi_core::types::{Account, AccountId, Amount, CurrencyKind};
use lixi_engine::allocator::ShareAllocator;
use lixi_engine::registry::SessionRegistry;

/// Drops every timer; sessions in the bench always collapse first.
struct NoTimers;

impl Scheduler for NoTimers {
    fn after(&self, _delay: Duration, _task: Task) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn on_actor(&self, _actor: &AccountId, task: Task) -> Result<(), SchedulerError> {
        task();
        Ok(())
    }
}

fn bench_allocate(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let pool = Amount::from_minor(100_000_000);

    c.bench_function("allocate_share", |b| {
        b.iter(|| ShareAllocator::allocate_with(&mut rng, black_box(pool), black_box(50)))
    });
}

fn bench_drain_session(c: &mut Criterion) {
    let registry = SessionRegistry::new(Arc::new(NoTimers), Duration::from_secs(60));
    let originator = Account::named("bench");
    let claimants: Vec<AccountId> = (0..50).map(|_| AccountId::new()).collect();

    c.bench_function("drain_50_slot_session", |b| {
        b.iter(|| {
            let id = registry
                .create(
                    originator.clone(),
                    Amount::from_minor(1_000_000),
                    50,
                    CurrencyKind::Primary,
                    |_| {},
                )
                .unwrap();
            for claimant in &claimants {
                black_box(registry.claim(&id, claimant).unwrap());
            }
        })
    });
}

criterion_group!(benches, bench_allocate, bench_drain_session);
criterion_main!(benches);
