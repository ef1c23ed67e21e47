//! End-to-end integration tests for Lixi.
//!
//! Each test wires a full engine (SQLite claim store in a temp directory,
//! in-memory ledgers for both currency kinds, recording collaborators) and
//! drives a complete distribution lifecycle through the public API.

use std::sync::Arc;
use std::time::Duration;

use lixi_core::carrier::TaggedCarrier;
use lixi_core::error::{DistributionError, FailureKind};
use lixi_core::notice::Notice;
use lixi_core::traits::Scheduler;
use lixi_core::types::{Account, Amount, CurrencyKind, TokenStatus};
use lixi_engine::{ManualScheduler, Redemption, TokioScheduler};
use lixi_tests::helpers::*;

const PRIMARY: CurrencyKind = CurrencyKind::Primary;
const POINTS: CurrencyKind = CurrencyKind::Points;

#[test]
fn five_slot_session_pays_out_whole_pool() {
    let (world, _scheduler) = World::manual();
    let alice = world.fund("alice", PRIMARY, major(10_000));
    let id = world.engine.start_broadcast(&alice, major(1_000), 5, PRIMARY).unwrap();
    assert_eq!(world.balance(&alice, PRIMARY), major(9_000));

    let claimants: Vec<Account> = (0..6).map(|i| Account::named(format!("claimant-{i}"))).collect();

    let mut paid = Amount::ZERO;
    for claimant in &claimants[..4] {
        let share = world.engine.claim_share(claimant, &id).unwrap();
        assert!(!share.is_zero());
        paid = paid.checked_add(share).unwrap();
    }

    let view = world.engine.session(&id).unwrap();
    assert_eq!(view.remaining_slots, 1);
    assert_eq!(view.claimants, 4);
    let leftover = view.remaining_pool;
    assert_eq!(paid.checked_add(leftover), Some(major(1_000)));

    let last = world.engine.claim_share(&claimants[4], &id).unwrap();
    assert_eq!(last, leftover);
    assert!(world.engine.session(&id).is_none());

    assert_eq!(
        world.engine.claim_share(&claimants[5], &id),
        Err(DistributionError::NotFound)
    );

    let received: u64 = claimants
        .iter()
        .map(|c| world.balance(c, PRIMARY).minor())
        .sum();
    assert_eq!(received, major(1_000).minor());
    assert_eq!(world.notifier.count("share_claimed"), 5);
    assert_eq!(world.notifier.effects_for(&claimants[0].id), 1);
}

#[test]
fn expiry_refunds_once_even_if_fired_twice() {
    let (world, scheduler) = World::manual();
    let alice = world.fund("alice", PRIMARY, major(10_000));
    let id = world.engine.start_broadcast(&alice, major(500), 3, PRIMARY).unwrap();
    assert_eq!(world.balance(&alice, PRIMARY), major(9_500));

    assert_eq!(scheduler.advance(Duration::from_secs(59)), 0);
    assert_eq!(world.balance(&alice, PRIMARY), major(9_500));

    assert_eq!(scheduler.advance(Duration::from_secs(1)), 1);
    assert_eq!(world.balance(&alice, PRIMARY), major(10_000));

    // A duplicate timer delivery finds nothing.
    assert_eq!(world.engine.expire_session(&id), None);
    assert_eq!(world.balance(&alice, PRIMARY), major(10_000));

    let refunds: Vec<_> = world
        .notifier
        .notices_for(&alice.id)
        .into_iter()
        .filter(|n| matches!(n, Notice::SessionRefunded { .. }))
        .collect();
    assert_eq!(refunds.len(), 1);

    let bob = Account::named("bob");
    assert_eq!(world.engine.claim_share(&bob, &id), Err(DistributionError::NotFound));
}

#[test]
fn partial_session_refunds_remainder() {
    let (world, scheduler) = World::manual();
    let alice = world.fund("alice", PRIMARY, major(5_000));
    let id = world.engine.start_broadcast(&alice, major(2_000), 4, PRIMARY).unwrap();

    let bob = Account::named("bob");
    let carol = Account::named("carol");
    let paid = world.engine.claim_share(&bob, &id).unwrap().minor()
        + world.engine.claim_share(&carol, &id).unwrap().minor();

    scheduler.advance(Duration::from_secs(60));
    assert_eq!(
        world.balance(&alice, PRIMARY).minor(),
        major(5_000).minor() - paid
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tokio_scheduler_expires_sessions() {
    let mut config = test_config();
    config.expiry_secs = 1;
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current().unwrap());
    let world = World::build(config, scheduler);

    let alice = world.fund("alice", PRIMARY, major(10_000));
    let bob = Account::named("bob");
    let id = world.engine.start_broadcast(&alice, major(500), 3, PRIMARY).unwrap();
    let share = world.engine.claim_share(&bob, &id).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while world.engine.session(&id).is_some() {
        assert!(tokio::time::Instant::now() < deadline, "session never expired");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    // The refund deposit lands right after removal.
    let expected = major(10_000).minor() - share.minor();
    while world.balance(&alice, PRIMARY).minor() != expected {
        assert!(tokio::time::Instant::now() < deadline, "refund never arrived");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[test]
fn token_survives_restart_but_sessions_do_not() {
    let (world, _scheduler) = World::manual();
    let alice = world.fund("alice", PRIMARY, major(10_000));
    let bob = Account::named("bob");

    let token = world
        .engine
        .mint_token(&alice, major(1_500), PRIMARY, Box::new(TaggedCarrier::money()))
        .unwrap();
    let session = world.engine.start_broadcast(&alice, major(1_000), 2, PRIMARY).unwrap();
    let mut carrier = world.items.take_last(&alice.id).unwrap();
    assert_eq!(carrier.read_identifier(), Some(token));

    let restarted = world.restart(Arc::new(ManualScheduler::new()));
    assert_eq!(restarted.claim_share(&bob, &session), Err(DistributionError::NotFound));

    assert_eq!(
        restarted.redeem(&bob, carrier.as_mut()),
        Ok(Redemption::Money(major(1_500)))
    );
    assert_eq!(world.balance(&bob, PRIMARY), major(1_500));

    // The original process sees the claim too.
    assert_eq!(
        world.engine.claim_token(&bob, &token),
        Err(DistributionError::AlreadyClaimedOrNotFound)
    );
    let record = world.engine.lookup_token(&token).unwrap().unwrap();
    assert_eq!(record.status, TokenStatus::Claimed);
    assert_eq!(record.originator, alice.id);
}

#[test]
fn token_and_session_ids_do_not_mix() {
    let (world, _scheduler) = World::manual();
    let alice = world.fund("alice", PRIMARY, major(10_000));
    let bob = Account::named("bob");
    let session = world.engine.start_broadcast(&alice, major(1_000), 2, PRIMARY).unwrap();

    // A session id reinterpreted as a token id is just an unknown token.
    let forged = session.to_string().parse().unwrap();
    assert_eq!(
        world.engine.claim_token(&bob, &forged),
        Err(DistributionError::AlreadyClaimedOrNotFound)
    );
    assert_eq!(world.engine.session(&session).unwrap().remaining_slots, 2);
}

#[test]
fn both_currencies_run_side_by_side() {
    let (world, scheduler) = World::manual();
    let alice = world.fund("alice", PRIMARY, major(10_000));
    world.points.set_balance(&alice.id, major(500));
    let bob = Account::named("bob");

    let points_session = world.engine.start_broadcast(&alice, major(100), 1, POINTS).unwrap();
    let primary_token = world
        .engine
        .mint_token(&alice, major(2_000), PRIMARY, Box::new(TaggedCarrier::money()))
        .unwrap();

    assert_eq!(world.engine.claim_share(&bob, &points_session), Ok(major(100)));
    assert_eq!(world.engine.claim_token(&bob, &primary_token), Ok(major(2_000)));

    assert_eq!(world.balance(&bob, POINTS), major(100));
    assert_eq!(world.balance(&bob, PRIMARY), major(2_000));
    assert_eq!(world.balance(&alice, POINTS), major(400));
    assert_eq!(world.balance(&alice, PRIMARY), major(8_000));
    assert_eq!(scheduler.advance(Duration::from_secs(60)), 1);
    assert_eq!(world.balance(&alice, POINTS), major(400));
}

#[test]
fn unregistered_currency_blocks_claims_until_restored() {
    let (world, _scheduler) = World::manual();
    let alice = world.fund("alice", POINTS, major(1_000));
    let bob = Account::named("bob");
    let id = world.engine.start_broadcast(&alice, major(300), 3, POINTS).unwrap();

    let provider = world.currencies.unregister(POINTS).unwrap();
    assert_eq!(
        world.engine.claim_share(&bob, &id),
        Err(DistributionError::CurrencyUnavailable(POINTS))
    );
    assert_eq!(world.engine.session(&id).unwrap().remaining_slots, 3);
    assert_eq!(world.notifier.rejections(&bob.id), vec![FailureKind::CurrencyUnavailable]);

    world.currencies.register(provider);
    assert!(world.engine.claim_share(&bob, &id).is_ok());
}

#[test]
fn granted_reward_packs_open_once_each() {
    let (world, _scheduler) = World::manual();
    let bob = Account::named("bob");

    assert_eq!(world.engine.grant_reward_pack(&bob, "default", 2), Ok(2));
    assert_eq!(world.items.len(), 2);
    let mut first = world.items.take_last(&bob.id).unwrap();
    let mut second = world.items.take_last(&bob.id).unwrap();

    assert_eq!(
        world.engine.redeem(&bob, first.as_mut()),
        Ok(Redemption::RewardPack {
            pack: "default".into(),
            commands: 2
        })
    );
    assert_eq!(
        world.engine.redeem(&bob, first.as_mut()),
        Err(DistributionError::AlreadyClaimedOrNotFound)
    );
    assert!(world.engine.redeem(&bob, second.as_mut()).is_ok());

    assert_eq!(
        world.rewards.commands(),
        vec![
            "give bob diamond 1".to_string(),
            "give bob emerald 2".to_string(),
            "give bob diamond 1".to_string(),
            "give bob emerald 2".to_string(),
        ]
    );
    assert_eq!(world.notifier.count("reward_pack_opened"), 2);
    assert_eq!(world.notifier.rejections(&bob.id), vec![FailureKind::AlreadyClaimedOrNotFound]);
    assert!(world.items.is_empty());
}

#[test]
fn unknown_reward_pack_is_never_granted() {
    let (world, _scheduler) = World::manual();
    let admin = Account::named("admin");
    assert_eq!(
        world.engine.grant_reward_pack(&admin, "lunar-new-year", 1),
        Err(DistributionError::NotFound)
    );
    assert!(world.items.is_empty());
}

#[test]
fn direct_transfer_round_trip() {
    let (world, _scheduler) = World::manual();
    let alice = world.fund("alice", PRIMARY, major(5_000));
    let bob = world.fund("bob", PRIMARY, major(0));

    world.engine.direct_transfer(&alice, &bob, major(1_200), PRIMARY).unwrap();
    world.engine.direct_transfer(&bob, &alice, major(200), PRIMARY).unwrap();

    assert_eq!(world.balance(&alice, PRIMARY), major(4_000));
    assert_eq!(world.balance(&bob, PRIMARY), major(1_000));

    assert_eq!(
        world.engine.direct_transfer(&bob, &alice, major(5_000), PRIMARY),
        Err(DistributionError::InsufficientFunds {
            have: major(1_000),
            need: major(5_000)
        })
    );
    assert_eq!(
        world.engine.direct_transfer(&bob, &bob, major(1), PRIMARY),
        Err(DistributionError::InvalidTarget)
    );
}

#[test]
fn shutdown_returns_all_reserved_funds() {
    let (world, scheduler) = World::manual();
    let alice = world.fund("alice", PRIMARY, major(10_000));
    for _ in 0..3 {
        world.engine.start_broadcast(&alice, major(1_000), 5, PRIMARY).unwrap();
    }
    assert_eq!(world.balance(&alice, PRIMARY), major(7_000));

    assert_eq!(world.engine.shutdown(), major(3_000));
    assert_eq!(world.balance(&alice, PRIMARY), major(10_000));

    assert_eq!(scheduler.advance(Duration::from_secs(60)), 3);
    assert_eq!(world.balance(&alice, PRIMARY), major(10_000));
}
