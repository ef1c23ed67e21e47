//! Trait interfaces for the collaborators the engine consumes.
//!
//! - [`CurrencyProvider`]: one backing economy per [`CurrencyKind`]
//! - [`ClaimStore`]: durable single-claim token table (lixi-store implements)
//! - [`Scheduler`]: deferred and actor-affine task execution (lixi-engine implements)
//! - [`Notifier`]: presentation layer for user-visible events
//! - [`TokenCarrier`] / [`ItemSink`]: physical token representation
//! - [`RewardDispatcher`]: executes reward-pack commands

use std::fmt;
use std::time::Duration;

use crate::carrier::CarrierKind;
use crate::error::{CurrencyError, DispatchError, SchedulerError, StoreError};
use crate::notice::Notice;
use crate::types::{AccountId, Amount, ClaimedToken, CurrencyKind, TokenId, TokenRecord};

/// A backing economy.
///
/// Calls may block on network or database I/O; the engine never holds an
/// in-memory lock while calling into a provider.
pub trait CurrencyProvider: Send + Sync {
    /// Which currency this provider backs.
    fn kind(&self) -> CurrencyKind;

    /// Whether the backend is currently usable. When `false`, the engine
    /// reports the currency as unavailable without calling anything else.
    fn is_available(&self) -> bool {
        true
    }

    /// Current balance of `account`.
    fn balance(&self, account: &AccountId) -> Result<Amount, CurrencyError>;

    /// Atomically remove `amount` from `account`.
    fn withdraw(&self, account: &AccountId, amount: Amount) -> Result<(), CurrencyError>;

    /// Atomically add `amount` to `account`.
    fn deposit(&self, account: &AccountId, amount: Amount) -> Result<(), CurrencyError>;

    /// Human-readable rendering of `amount` in this currency.
    fn format(&self, amount: Amount) -> String {
        amount.to_string()
    }
}

/// Durable table of issued single-claim tokens.
///
/// The claim transition must be a single conditional update enforced by the
/// storage engine, so it stays correct across processes sharing the store.
pub trait ClaimStore: Send + Sync {
    /// Insert a new `unclaimed` token row.
    fn issue(
        &self,
        id: &TokenId,
        amount: Amount,
        originator: &AccountId,
        currency: CurrencyKind,
    ) -> Result<(), StoreError>;

    /// Flip `unclaimed → claimed` and return the fixed amount.
    ///
    /// Fails with [`StoreError::AlreadyClaimedOrNotFound`] when no row changed.
    fn claim(&self, id: &TokenId) -> Result<ClaimedToken, StoreError>;

    /// Read-only diagnostic lookup; never used on the claim path.
    fn lookup(&self, id: &TokenId) -> Result<Option<TokenRecord>, StoreError>;
}

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Deferred-task execution.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay` has elapsed. Never runs it twice.
    fn after(&self, delay: Duration, task: Task) -> Result<(), SchedulerError>;

    /// Run `task` on the execution context owned by `actor`. Tasks for the
    /// same actor run one at a time, in submission order.
    fn on_actor(&self, actor: &AccountId, task: Task) -> Result<(), SchedulerError>;
}

/// Presentation layer: turns engine events into user-visible output.
pub trait Notifier: Send + Sync {
    /// Deliver `notice` to a single account.
    fn notify(&self, recipient: &AccountId, notice: Notice);

    /// Deliver `notice` to everyone.
    fn broadcast(&self, notice: Notice);

    /// Play the cosmetic "received lixi" effect for `actor`.
    fn play_effect(&self, _actor: &AccountId) {}
}

/// An opaque item carrying an embedded token identifier.
pub trait TokenCarrier: Send + fmt::Debug {
    fn kind(&self) -> CarrierKind;

    fn embed_identifier(&mut self, id: TokenId);

    fn read_identifier(&self) -> Option<TokenId>;

    /// Whether a redemption already used this carrier up.
    fn is_spent(&self) -> bool;

    /// Use the carrier up. Later redemptions of it are refused.
    fn spend(&mut self);
}

/// Hands items to actors.
pub trait ItemSink: Send + Sync {
    fn give(&self, actor: &AccountId, carrier: Box<dyn TokenCarrier>);
}

/// Executes a fully resolved reward command.
pub trait RewardDispatcher: Send + Sync {
    fn dispatch(&self, command: &str) -> Result<(), DispatchError>;
}
