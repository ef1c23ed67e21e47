//! lixi-sim: runs every distribution mode against in-memory economies.
//!
//! Wires a SQLite claim store, two in-memory ledgers, the tokio scheduler,
//! and logging collaborators into a [`DistributionEngine`], then opens a
//! broadcast session, mints and redeems a claim token, opens a reward pack,
//! and makes a direct transfer. Every step is reported through `tracing`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

mod config;
mod host;

use config::Config;
use host::{ConsoleDispatcher, Holdings, LoggingNotifier};
use lixi_core::carrier::TaggedCarrier;
use lixi_core::constants::DEFAULT_REWARD_PACK;
use lixi_core::money::format_short;
use lixi_core::traits::CurrencyProvider;
use lixi_core::types::{Account, CurrencyKind};
use lixi_engine::{CurrencyRegistry, DistributionEngine, EngineParts, MemoryLedger, TokioScheduler};
use lixi_store::SqliteClaimStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load simulation configuration")?;

    info!(
        data_dir = %config.data_dir.display(),
        pool = %config.pool,
        slots = config.slots,
        claimants = config.claimants,
        expiry_secs = config.engine.expiry_secs,
        "Starting lixi-sim"
    );

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;
    let store = SqliteClaimStore::open(config.db_path())
        .with_context(|| format!("Failed to open claim store at {}", config.db_path().display()))?;

    let primary = Arc::new(MemoryLedger::new(CurrencyKind::Primary));
    let points = Arc::new(MemoryLedger::new(CurrencyKind::Points));
    let currencies = Arc::new(CurrencyRegistry::new());
    currencies.register(primary.clone());
    currencies.register(points.clone());

    let scheduler = Arc::new(TokioScheduler::current().context("Failed to bind scheduler")?);
    let holdings = Arc::new(Holdings::default());

    let engine = DistributionEngine::new(EngineParts {
        config: config.engine.clone(),
        currencies,
        store: Arc::new(store),
        scheduler: scheduler.clone(),
        notifier: Arc::new(LoggingNotifier),
        items: holdings.clone(),
        rewards: Arc::new(ConsoleDispatcher),
    })
    .context("Failed to build distribution engine")?;

    let originator = Account::named("originator");
    let claimants: Vec<Account> = (1..=config.claimants.max(2))
        .map(|i| Account::named(format!("claimant-{i}")))
        .collect();
    primary.set_balance(&originator.id, config.starting_balance);
    points.set_balance(&originator.id, config.starting_balance);

    // Broadcast session: a few claims, the rest expires and is refunded.
    let session = engine
        .start_broadcast(&originator, config.pool, config.slots, CurrencyKind::Primary)
        .context("Failed to open broadcast session")?;
    for claimant in claimants.iter().take(config.claimants) {
        match engine.claim_share(claimant, &session) {
            Ok(share) => info!(claimant = %claimant.name, share = %format_short(share), "claimed share"),
            Err(e) => warn!(claimant = %claimant.name, error = %e, "claim failed"),
        }
    }

    // Claim token: redeemed once, the second attempt is refused.
    let token = engine
        .mint_token(&originator, config.pool, CurrencyKind::Primary, Box::new(TaggedCarrier::money()))
        .context("Failed to mint claim token")?;
    let mut carrier = holdings
        .take(&originator.id)
        .context("Minted carrier was not handed out")?;
    for claimant in claimants.iter().take(2) {
        match engine.redeem(claimant, carrier.as_mut()) {
            Ok(redemption) => info!(claimant = %claimant.name, ?redemption, "token redeemed"),
            Err(e) => warn!(claimant = %claimant.name, error = %e, "token redemption refused"),
        }
    }
    if let Some(record) = engine.lookup_token(&token).context("Failed to look up token")? {
        info!(token = %record.id, status = %record.status, amount = %record.amount, "token record");
    }

    // Reward pack: granted to the first claimant, opened, then refused.
    engine
        .grant_reward_pack(&claimants[0], DEFAULT_REWARD_PACK, 1)
        .context("Failed to grant reward pack")?;
    let mut pack = holdings
        .take(&claimants[0].id)
        .context("Granted reward pack was not handed out")?;
    for _ in 0..2 {
        match engine.redeem(&claimants[0], pack.as_mut()) {
            Ok(redemption) => info!(claimant = %claimants[0].name, ?redemption, "reward pack opened"),
            Err(e) => warn!(claimant = %claimants[0].name, error = %e, "reward pack refused"),
        }
    }

    // Direct transfer in the points economy.
    if let Err(e) = engine.direct_transfer(&originator, &claimants[1], config.pool, CurrencyKind::Points) {
        warn!(error = %e, "transfer refused");
    }

    let wait = config.engine.expiry() + std::time::Duration::from_millis(500);
    info!(secs = wait.as_secs_f32(), "Waiting for session expiry (Ctrl-C to skip)");
    tokio::select! {
        _ = tokio::time::sleep(wait) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down early"),
    }

    let refunded = engine.shutdown();
    scheduler.shutdown();

    info!(
        refunded_at_shutdown = %refunded,
        originator_primary = %primary.format(primary.balance(&originator.id)?),
        originator_points = %points.format(points.balance(&originator.id)?),
        "Simulation complete"
    );
    for claimant in &claimants {
        info!(
            claimant = %claimant.name,
            primary = %primary.format(primary.balance(&claimant.id)?),
            points = %points.format(points.balance(&claimant.id)?),
            "final balance"
        );
    }

    Ok(())
}
