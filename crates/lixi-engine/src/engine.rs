//! The distribution engine: the single entry point for every operation.
//!
//! Every operation that moves money follows the same shape: validate with no
//! side effects, reserve funds from the originator, then perform the
//! downstream step. When the downstream step fails after the reservation the
//! originator is compensated with a deposit. A failed compensation is a
//! reconciliation gap and is logged at `error!` with `reconciliation_gap`.
//!
//! Failed public operations also notify the acting account with
//! [`Notice::Rejected`].

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, error, info, warn};

use lixi_core::carrier::{CarrierKind, TaggedCarrier};
use lixi_core::config::EngineConfig;
use lixi_core::constants::{MAX_PACK_GRANT, PLAYER_PLACEHOLDER};
use lixi_core::error::{ConfigError, CurrencyError, DistributionError};
use lixi_core::notice::Notice;
use lixi_core::traits::{
    ClaimStore, CurrencyProvider, ItemSink, Notifier, RewardDispatcher, Scheduler, TokenCarrier,
};
use lixi_core::types::{Account, AccountId, Amount, CurrencyKind, SessionId, TokenId, TokenRecord};

use crate::currency::CurrencyRegistry;
use crate::registry::{ExpiredSession, SessionRegistry, SessionView};

/// Collaborators the engine is assembled from.
pub struct EngineParts {
    pub config: EngineConfig,
    pub currencies: Arc<CurrencyRegistry>,
    pub store: Arc<dyn ClaimStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub notifier: Arc<dyn Notifier>,
    pub items: Arc<dyn ItemSink>,
    pub rewards: Arc<dyn RewardDispatcher>,
}

/// What redeeming a carrier produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    /// A money token paid out its fixed amount.
    Money(Amount),
    /// A reward pack dispatched this many commands.
    RewardPack { pack: String, commands: usize },
}

/// Shared, cloneable handle to the engine.
#[derive(Clone)]
pub struct DistributionEngine {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    currencies: Arc<CurrencyRegistry>,
    sessions: SessionRegistry,
    store: Arc<dyn ClaimStore>,
    scheduler: Arc<dyn Scheduler>,
    notifier: Arc<dyn Notifier>,
    items: Arc<dyn ItemSink>,
    rewards: Arc<dyn RewardDispatcher>,
}

impl fmt::Debug for DistributionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionEngine")
            .field("sessions", &self.inner.sessions)
            .field("currencies", &self.inner.currencies)
            .finish_non_exhaustive()
    }
}

fn currency_failure(kind: CurrencyKind, e: CurrencyError) -> DistributionError {
    match e {
        CurrencyError::Unavailable => DistributionError::CurrencyUnavailable(kind),
        other => DistributionError::ProviderFailure(other.to_string()),
    }
}

impl DistributionEngine {
    /// Assemble an engine. Fails if the configuration is unusable.
    pub fn new(parts: EngineParts) -> Result<Self, ConfigError> {
        parts.config.validate()?;
        let sessions = SessionRegistry::new(Arc::clone(&parts.scheduler), parts.config.expiry());
        Ok(Self {
            inner: Arc::new(Inner {
                config: parts.config,
                currencies: parts.currencies,
                sessions,
                store: parts.store,
                scheduler: parts.scheduler,
                notifier: parts.notifier,
                items: parts.items,
                rewards: parts.rewards,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn currencies(&self) -> &Arc<CurrencyRegistry> {
        &self.inner.currencies
    }

    /// Snapshot of a live session.
    pub fn session(&self, id: &SessionId) -> Option<SessionView> {
        self.inner.sessions.peek(id)
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    // ------------------------------------------------------------------
    // Broadcast sessions
    // ------------------------------------------------------------------

    /// Reserve `pool` from `originator` and open a session with `slots` shares.
    pub fn start_broadcast(
        &self,
        originator: &Account,
        pool: Amount,
        slots: u32,
        kind: CurrencyKind,
    ) -> Result<SessionId, DistributionError> {
        let result = self.open_session(originator, pool, slots, kind);
        self.inner.report(&originator.id, result)
    }

    fn open_session(
        &self,
        originator: &Account,
        pool: Amount,
        slots: u32,
        kind: CurrencyKind,
    ) -> Result<SessionId, DistributionError> {
        let config = &self.inner.config;
        config.limits(kind).check(pool)?;
        config.check_slots(slots)?;
        // Every slot must be able to receive at least one minor unit.
        if pool.minor() < u64::from(slots) {
            return Err(DistributionError::AmountTooLow {
                min: Amount::from_minor(u64::from(slots)),
                got: pool,
            });
        }

        let provider = self.inner.currencies.available(kind)?;
        self.inner.reserve(&provider, &originator.id, pool)?;

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let created = self.inner.sessions.create(originator.clone(), pool, slots, kind, move |id| {
            if let Some(inner) = weak.upgrade() {
                inner.expire(id);
            }
        });
        let id = match created {
            Ok(id) => id,
            Err(e) => {
                self.inner.compensate(&provider, &originator.id, pool, "expiry scheduling failed");
                return Err(DistributionError::ProviderFailure(format!("scheduler: {e}")));
            }
        };

        info!(
            session = %id,
            originator = %originator.name,
            %pool,
            slots,
            currency = %kind,
            "broadcast session opened"
        );
        self.inner.notifier.broadcast(Notice::SessionOpened {
            session: id,
            originator: originator.name.clone(),
            amount: pool,
            display: provider.format(pool),
            slots,
        });
        Ok(id)
    }

    /// Take one share of a live session for `claimant`.
    pub fn claim_share(&self, claimant: &Account, session: &SessionId) -> Result<Amount, DistributionError> {
        let result = self.take_share(claimant, session);
        self.inner.report(&claimant.id, result)
    }

    fn take_share(&self, claimant: &Account, session: &SessionId) -> Result<Amount, DistributionError> {
        let view = self.inner.sessions.peek(session).ok_or(DistributionError::NotFound)?;
        // Check the provider before consuming a slot.
        let provider = self.inner.currencies.available(view.currency)?;
        let claimed = self.inner.sessions.claim(session, &claimant.id)?;

        if let Err(e) = provider.deposit(&claimant.id, claimed.share) {
            warn!(
                session = %session,
                claimant = %claimant.id,
                share = %claimed.share,
                error = %e,
                "share deposit failed"
            );
            self.inner.compensate(&provider, &claimed.originator.id, claimed.share, "share deposit failed");
            return Err(currency_failure(claimed.currency, e));
        }

        debug!(
            session = %session,
            claimant = %claimant.name,
            share = %claimed.share,
            collapsed = claimed.collapsed,
            "share claimed"
        );
        self.inner.notifier.notify(
            &claimant.id,
            Notice::ShareClaimed {
                session: *session,
                amount: claimed.share,
                display: provider.format(claimed.share),
            },
        );
        self.inner.play_effect(&claimant.id);
        Ok(claimed.share)
    }

    /// Timer entry point: refund what is left of a session, at most once.
    pub fn expire_session(&self, id: &SessionId) -> Option<Amount> {
        self.inner.expire(*id)
    }

    // ------------------------------------------------------------------
    // Claim tokens
    // ------------------------------------------------------------------

    /// Reserve `amount`, persist a token for it, embed the token id into
    /// `carrier`, and hand the carrier to the originator.
    pub fn mint_token(
        &self,
        originator: &Account,
        amount: Amount,
        kind: CurrencyKind,
        carrier: Box<dyn TokenCarrier>,
    ) -> Result<TokenId, DistributionError> {
        let result = self.issue_token(originator, amount, kind, carrier);
        self.inner.report(&originator.id, result)
    }

    fn issue_token(
        &self,
        originator: &Account,
        amount: Amount,
        kind: CurrencyKind,
        mut carrier: Box<dyn TokenCarrier>,
    ) -> Result<TokenId, DistributionError> {
        self.inner.config.limits(kind).check(amount)?;
        let provider = self.inner.currencies.available(kind)?;
        self.inner.reserve(&provider, &originator.id, amount)?;

        let id = TokenId::new();
        if let Err(e) = self.inner.store.issue(&id, amount, &originator.id, kind) {
            self.inner.compensate(&provider, &originator.id, amount, "token issue failed");
            return Err(e.into());
        }

        carrier.embed_identifier(id);
        self.inner.items.give(&originator.id, carrier);

        info!(token = %id, originator = %originator.name, %amount, currency = %kind, "token minted");
        self.inner.notifier.notify(
            &originator.id,
            Notice::TokenMinted {
                token: id,
                amount,
                display: provider.format(amount),
            },
        );
        Ok(id)
    }

    /// Redeem whatever `carrier` represents, then mark it spent.
    ///
    /// A spent carrier is refused with `AlreadyClaimedOrNotFound`. Only a
    /// successful redemption spends the carrier.
    pub fn redeem(&self, claimant: &Account, carrier: &mut dyn TokenCarrier) -> Result<Redemption, DistributionError> {
        let result = self.redeem_carrier(claimant, carrier);
        self.inner.report(&claimant.id, result)
    }

    fn redeem_carrier(&self, claimant: &Account, carrier: &mut dyn TokenCarrier) -> Result<Redemption, DistributionError> {
        if carrier.is_spent() {
            return Err(DistributionError::AlreadyClaimedOrNotFound);
        }
        let redemption = match carrier.kind() {
            CarrierKind::Money => {
                let id = carrier
                    .read_identifier()
                    .ok_or(DistributionError::AlreadyClaimedOrNotFound)?;
                Redemption::Money(self.redeem_token(claimant, &id)?)
            }
            CarrierKind::RewardPack(pack) => {
                let commands = self.dispatch_pack(claimant, &pack)?;
                Redemption::RewardPack { pack, commands }
            }
        };
        carrier.spend();
        Ok(redemption)
    }

    /// Claim a persisted token and pay its amount to `claimant`.
    pub fn claim_token(&self, claimant: &Account, id: &TokenId) -> Result<Amount, DistributionError> {
        let result = self.redeem_token(claimant, id);
        self.inner.report(&claimant.id, result)
    }

    fn redeem_token(&self, claimant: &Account, id: &TokenId) -> Result<Amount, DistributionError> {
        let claimed = self.inner.store.claim(id)?;

        // The token is spent from here on; it cannot be reverted.
        let provider = match self.inner.currencies.available(claimed.currency) {
            Ok(provider) => provider,
            Err(e) => {
                error!(
                    reconciliation_gap = true,
                    token = %id,
                    claimant = %claimant.id,
                    amount = %claimed.amount,
                    currency = %claimed.currency,
                    "token claimed but its currency is unavailable"
                );
                return Err(e);
            }
        };
        if let Err(e) = provider.deposit(&claimant.id, claimed.amount) {
            error!(
                reconciliation_gap = true,
                token = %id,
                claimant = %claimant.id,
                amount = %claimed.amount,
                currency = %claimed.currency,
                error = %e,
                "token claimed but payout failed"
            );
            return Err(currency_failure(claimed.currency, e));
        }

        info!(token = %id, claimant = %claimant.name, amount = %claimed.amount, "token redeemed");
        self.inner.notifier.notify(
            &claimant.id,
            Notice::TokenRedeemed {
                token: *id,
                amount: claimed.amount,
                display: provider.format(claimed.amount),
            },
        );
        self.inner.play_effect(&claimant.id);
        Ok(claimed.amount)
    }

    /// Dispatch every command of reward pack `pack` for `claimant`.
    ///
    /// Returns how many commands dispatched successfully. Individual command
    /// failures are logged and do not stop the rest.
    pub fn open_reward_pack(&self, claimant: &Account, pack: &str) -> Result<usize, DistributionError> {
        let result = self.dispatch_pack(claimant, pack);
        self.inner.report(&claimant.id, result)
    }

    fn dispatch_pack(&self, claimant: &Account, pack: &str) -> Result<usize, DistributionError> {
        let commands = self
            .inner
            .config
            .reward_pack(pack)
            .filter(|commands| !commands.is_empty())
            .ok_or(DistributionError::NotFound)?;

        let mut dispatched = 0;
        for command in commands {
            let resolved = command.replace(PLAYER_PLACEHOLDER, &claimant.name);
            match self.inner.rewards.dispatch(&resolved) {
                Ok(()) => dispatched += 1,
                Err(e) => warn!(pack, command = %resolved, error = %e, "reward command failed"),
            }
        }

        info!(pack, claimant = %claimant.name, dispatched, "reward pack opened");
        self.inner.notifier.notify(
            &claimant.id,
            Notice::RewardPackOpened {
                pack: pack.to_string(),
            },
        );
        self.inner.play_effect(&claimant.id);
        Ok(dispatched)
    }

    /// Hand `count` carriers of reward pack `pack` to `recipient`.
    ///
    /// The pack must exist in the configuration; `count` must be between 1
    /// and [`MAX_PACK_GRANT`].
    pub fn grant_reward_pack(&self, recipient: &Account, pack: &str, count: u32) -> Result<u32, DistributionError> {
        let result = self.grant_packs(recipient, pack, count);
        self.inner.report(&recipient.id, result)
    }

    fn grant_packs(&self, recipient: &Account, pack: &str, count: u32) -> Result<u32, DistributionError> {
        if !(1..=MAX_PACK_GRANT).contains(&count) {
            return Err(DistributionError::PackCountOutOfRange {
                max: MAX_PACK_GRANT,
                got: count,
            });
        }
        self.inner
            .config
            .reward_pack(pack)
            .filter(|commands| !commands.is_empty())
            .ok_or(DistributionError::NotFound)?;

        for _ in 0..count {
            self.inner
                .items
                .give(&recipient.id, Box::new(TaggedCarrier::reward_pack(pack)));
        }

        info!(pack, recipient = %recipient.name, count, "reward packs granted");
        self.inner.notifier.notify(
            &recipient.id,
            Notice::RewardPackGranted {
                pack: pack.to_string(),
                count,
            },
        );
        Ok(count)
    }

    /// Diagnostic lookup of a persisted token. Not part of any claim path.
    pub fn lookup_token(&self, id: &TokenId) -> Result<Option<TokenRecord>, DistributionError> {
        Ok(self.inner.store.lookup(id)?)
    }

    // ------------------------------------------------------------------
    // Direct transfer
    // ------------------------------------------------------------------

    /// Move `amount` from `sender` to `recipient`.
    pub fn direct_transfer(
        &self,
        sender: &Account,
        recipient: &Account,
        amount: Amount,
        kind: CurrencyKind,
    ) -> Result<(), DistributionError> {
        let result = self.transfer(sender, recipient, amount, kind);
        self.inner.report(&sender.id, result)
    }

    fn transfer(
        &self,
        sender: &Account,
        recipient: &Account,
        amount: Amount,
        kind: CurrencyKind,
    ) -> Result<(), DistributionError> {
        if sender.id == recipient.id {
            return Err(DistributionError::InvalidTarget);
        }
        self.inner.config.limits(kind).check(amount)?;
        let provider = self.inner.currencies.available(kind)?;
        self.inner.reserve(&provider, &sender.id, amount)?;

        if let Err(e) = provider.deposit(&recipient.id, amount) {
            self.inner.compensate(&provider, &sender.id, amount, "transfer deposit failed");
            return Err(currency_failure(kind, e));
        }

        info!(sender = %sender.name, recipient = %recipient.name, %amount, currency = %kind, "transfer complete");
        let display = provider.format(amount);
        self.inner.notifier.notify(
            &sender.id,
            Notice::TransferSent {
                recipient: recipient.name.clone(),
                amount,
                display: display.clone(),
            },
        );
        self.inner.notifier.notify(
            &recipient.id,
            Notice::TransferReceived {
                sender: sender.name.clone(),
                amount,
                display,
            },
        );
        self.inner.play_effect(&recipient.id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Remove every live session and refund its remainder.
    ///
    /// Returns the total refunded. Expiry timers that fire afterwards find
    /// nothing to do.
    pub fn shutdown(&self) -> Amount {
        let drained = self.inner.sessions.drain();
        let count = drained.len();
        let refunded = drained
            .into_iter()
            .filter_map(|(id, expired)| self.inner.refund(id, expired))
            .fold(Amount::ZERO, |acc, amount| acc.checked_add(amount).unwrap_or(acc));
        info!(sessions = count, %refunded, "engine shut down");
        refunded
    }
}

impl Inner {
    /// Notify `actor` of a failure and pass the result through.
    fn report<T>(&self, actor: &AccountId, result: Result<T, DistributionError>) -> Result<T, DistributionError> {
        if let Err(e) = &result {
            debug!(account = %actor, kind = e.kind().as_str(), error = %e, "operation rejected");
            self.notifier.notify(
                actor,
                Notice::Rejected {
                    kind: e.kind(),
                    reason: e.to_string(),
                },
            );
        }
        result
    }

    /// Check the balance and withdraw `amount` from `account`.
    fn reserve(
        &self,
        provider: &Arc<dyn CurrencyProvider>,
        account: &AccountId,
        amount: Amount,
    ) -> Result<(), DistributionError> {
        let kind = provider.kind();
        let have = provider.balance(account).map_err(|e| currency_failure(kind, e))?;
        if have < amount {
            return Err(DistributionError::InsufficientFunds { have, need: amount });
        }
        provider.withdraw(account, amount).map_err(|e| currency_failure(kind, e))
    }

    /// Return reserved funds after a failed downstream step.
    fn compensate(&self, provider: &Arc<dyn CurrencyProvider>, account: &AccountId, amount: Amount, reason: &str) {
        match provider.deposit(account, amount) {
            Ok(()) => warn!(%account, %amount, reason, "reservation returned"),
            Err(e) => error!(
                reconciliation_gap = true,
                %account,
                %amount,
                currency = %provider.kind(),
                reason,
                error = %e,
                "compensating deposit failed"
            ),
        }
    }

    fn expire(&self, id: SessionId) -> Option<Amount> {
        let Some(expired) = self.sessions.expire(&id) else {
            debug!(session = %id, "expiry found nothing to refund");
            return None;
        };
        self.refund(id, expired)
    }

    fn refund(&self, id: SessionId, expired: ExpiredSession) -> Option<Amount> {
        let ExpiredSession {
            originator,
            remaining,
            currency,
        } = expired;

        let deposited = self
            .currencies
            .available(currency)
            .and_then(|provider| {
                provider
                    .deposit(&originator.id, remaining)
                    .map(|()| provider)
                    .map_err(|e| currency_failure(currency, e))
            });
        let provider = match deposited {
            Ok(provider) => provider,
            Err(e) => {
                error!(
                    reconciliation_gap = true,
                    session = %id,
                    originator = %originator.id,
                    amount = %remaining,
                    %currency,
                    error = %e,
                    "session refund failed"
                );
                return None;
            }
        };

        info!(session = %id, originator = %originator.name, amount = %remaining, "session refunded");
        self.notifier.notify(
            &originator.id,
            Notice::SessionRefunded {
                session: id,
                amount: remaining,
                display: provider.format(remaining),
            },
        );
        Some(remaining)
    }

    /// Queue the cosmetic effect on the actor's own context.
    fn play_effect(&self, actor: &AccountId) {
        let notifier = Arc::clone(&self.notifier);
        let target = *actor;
        if let Err(e) = self
            .scheduler
            .on_actor(actor, Box::new(move || notifier.play_effect(&target)))
        {
            warn!(%actor, error = %e, "could not schedule effect");
        }
    }
}
