//! Shared test helpers for E2E and adversarial tests.

use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use lixi_core::config::EngineConfig;
use lixi_core::error::{DispatchError, FailureKind};
use lixi_core::notice::Notice;
use lixi_core::traits::{CurrencyProvider, ItemSink, Notifier, RewardDispatcher, Scheduler, TokenCarrier};
use lixi_core::types::{Account, AccountId, Amount, CurrencyKind};
use lixi_engine::{CurrencyRegistry, DistributionEngine, EngineParts, ManualScheduler, MemoryLedger};
use lixi_store::SqliteClaimStore;

/// Notifier that keeps every notice and effect for later inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(Option<AccountId>, Notice)>>,
    effects: Mutex<Vec<AccountId>>,
}

impl RecordingNotifier {
    /// Notices delivered to `account` directly.
    pub fn notices_for(&self, account: &AccountId) -> Vec<Notice> {
        self.notices
            .lock()
            .iter()
            .filter(|(to, _)| to.as_ref() == Some(account))
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Failure kinds reported to `account`, in order.
    pub fn rejections(&self, account: &AccountId) -> Vec<FailureKind> {
        self.notices_for(account)
            .into_iter()
            .filter_map(|n| match n {
                Notice::Rejected { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    /// Number of notices in `category`, direct or broadcast.
    pub fn count(&self, category: &str) -> usize {
        self.notices
            .lock()
            .iter()
            .filter(|(_, n)| n.category() == category)
            .count()
    }

    pub fn effects_for(&self, account: &AccountId) -> usize {
        self.effects.lock().iter().filter(|a| *a == account).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, recipient: &AccountId, notice: Notice) {
        self.notices.lock().push((Some(*recipient), notice));
    }

    fn broadcast(&self, notice: Notice) {
        self.notices.lock().push((None, notice));
    }

    fn play_effect(&self, actor: &AccountId) {
        self.effects.lock().push(*actor);
    }
}

/// Item sink holding carriers per holder.
#[derive(Default)]
pub struct Inventory {
    items: Mutex<Vec<(AccountId, Box<dyn TokenCarrier>)>>,
}

impl Inventory {
    /// Remove and return the most recent carrier given to `holder`.
    pub fn take_last(&self, holder: &AccountId) -> Option<Box<dyn TokenCarrier>> {
        let mut items = self.items.lock();
        let pos = items.iter().rposition(|(h, _)| h == holder)?;
        Some(items.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl ItemSink for Inventory {
    fn give(&self, actor: &AccountId, carrier: Box<dyn TokenCarrier>) {
        self.items.lock().push((*actor, carrier));
    }
}

/// Reward dispatcher that records resolved commands.
#[derive(Default)]
pub struct RecordingDispatcher {
    commands: Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

impl RewardDispatcher for RecordingDispatcher {
    fn dispatch(&self, command: &str) -> Result<(), DispatchError> {
        self.commands.lock().push(command.to_string());
        Ok(())
    }
}

/// Engine configuration for tests: primary minimum lowered to one unit.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.primary.min = Amount::from_minor(100);
    config
}

/// Whole units to an amount.
pub fn major(n: u64) -> Amount {
    Amount::from_major(n).unwrap()
}

/// A fully wired engine over a temporary SQLite file and in-memory ledgers.
pub struct World {
    pub engine: DistributionEngine,
    pub currencies: Arc<CurrencyRegistry>,
    pub primary: Arc<MemoryLedger>,
    pub points: Arc<MemoryLedger>,
    pub store: Arc<SqliteClaimStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub items: Arc<Inventory>,
    pub rewards: Arc<RecordingDispatcher>,
    config: EngineConfig,
    dir: TempDir,
}

impl World {
    pub fn build(config: EngineConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteClaimStore::open(dir.path().join("lixi.db")).unwrap());

        let primary = Arc::new(MemoryLedger::new(CurrencyKind::Primary));
        let points = Arc::new(MemoryLedger::new(CurrencyKind::Points));
        let currencies = Arc::new(CurrencyRegistry::new());
        currencies.register(primary.clone());
        currencies.register(points.clone());

        let notifier = Arc::new(RecordingNotifier::default());
        let items = Arc::new(Inventory::default());
        let rewards = Arc::new(RecordingDispatcher::default());

        let engine = DistributionEngine::new(EngineParts {
            config: config.clone(),
            currencies: currencies.clone(),
            store: store.clone(),
            scheduler,
            notifier: notifier.clone(),
            items: items.clone(),
            rewards: rewards.clone(),
        })
        .unwrap();

        Self {
            engine,
            currencies,
            primary,
            points,
            store,
            notifier,
            items,
            rewards,
            config,
            dir,
        }
    }

    /// World on [`test_config`] driven by a manual scheduler.
    pub fn manual() -> (Self, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::new());
        (Self::build(test_config(), scheduler.clone()), scheduler)
    }

    /// A fresh engine over the same database file and ledgers, as after a
    /// process restart. In-memory sessions do not carry over.
    pub fn restart(&self, scheduler: Arc<dyn Scheduler>) -> DistributionEngine {
        let store = SqliteClaimStore::open(self.dir.path().join("lixi.db")).unwrap();
        DistributionEngine::new(EngineParts {
            config: self.config.clone(),
            currencies: self.currencies.clone(),
            store: Arc::new(store),
            scheduler,
            notifier: self.notifier.clone(),
            items: self.items.clone(),
            rewards: self.rewards.clone(),
        })
        .unwrap()
    }

    pub fn ledger(&self, kind: CurrencyKind) -> &Arc<MemoryLedger> {
        match kind {
            CurrencyKind::Primary => &self.primary,
            CurrencyKind::Points => &self.points,
        }
    }

    /// New account holding `amount` in `kind`.
    pub fn fund(&self, name: &str, kind: CurrencyKind, amount: Amount) -> Account {
        let account = Account::named(name);
        self.ledger(kind).set_balance(&account.id, amount);
        account
    }

    pub fn balance(&self, account: &Account, kind: CurrencyKind) -> Amount {
        self.ledger(kind).balance(&account.id).unwrap()
    }
}
