//! In-memory table of live broadcast sessions.
//!
//! Sessions live in a [`DashMap`]; each claim is a short CPU-only critical
//! section under the shard lock of that session's entry. Collapse (last slot
//! claimed) and expiry both remove through the map, so whichever runs second
//! observes absence and does nothing.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use lixi_core::error::{ClaimError, SchedulerError};
use lixi_core::traits::Scheduler;
use lixi_core::types::{Account, AccountId, Amount, CurrencyKind, SessionId};

use crate::allocator::ShareAllocator;

/// A broadcast distribution in progress. Owned by the registry.
#[derive(Debug)]
struct Session {
    originator: Account,
    currency: CurrencyKind,
    total_pool: Amount,
    total_slots: u32,
    remaining_pool: Amount,
    remaining_slots: u32,
    claimed: HashSet<AccountId>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn view(&self, id: SessionId) -> SessionView {
        SessionView {
            id,
            originator: self.originator.clone(),
            currency: self.currency,
            total_pool: self.total_pool,
            total_slots: self.total_slots,
            remaining_pool: self.remaining_pool,
            remaining_slots: self.remaining_slots,
            claimants: self.claimed.len(),
            created_at: self.created_at,
        }
    }
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub id: SessionId,
    pub originator: Account,
    pub currency: CurrencyKind,
    pub total_pool: Amount,
    pub total_slots: u32,
    pub remaining_pool: Amount,
    pub remaining_slots: u32,
    pub claimants: usize,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful session claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedShare {
    pub share: Amount,
    pub currency: CurrencyKind,
    pub originator: Account,
    /// Whether this claim took the last slot and removed the session.
    pub collapsed: bool,
}

/// Funds left in a session at the moment it was removed unfinished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredSession {
    pub originator: Account,
    pub remaining: Amount,
    pub currency: CurrencyKind,
}

/// Table of live sessions with their expiry timers.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
    scheduler: Arc<dyn Scheduler>,
    expiry: Duration,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("live", &self.sessions.len())
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn new(scheduler: Arc<dyn Scheduler>, expiry: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            scheduler,
            expiry,
        }
    }

    /// Register a new session and schedule `on_expiry` for it.
    ///
    /// Does not touch currency. If the scheduler refuses the timer the
    /// session is removed again and the scheduler error returned.
    pub fn create<F>(
        &self,
        originator: Account,
        pool: Amount,
        slots: u32,
        currency: CurrencyKind,
        on_expiry: F,
    ) -> Result<SessionId, SchedulerError>
    where
        F: FnOnce(SessionId) + Send + 'static,
    {
        let id = SessionId::new();
        self.sessions.insert(
            id,
            Session {
                originator,
                currency,
                total_pool: pool,
                total_slots: slots,
                remaining_pool: pool,
                remaining_slots: slots,
                claimed: HashSet::new(),
                created_at: Utc::now(),
            },
        );

        if let Err(e) = self
            .scheduler
            .after(self.expiry, Box::new(move || on_expiry(id)))
        {
            self.sessions.remove(&id);
            return Err(e);
        }

        debug!(session = %id, %pool, slots, "session registered");
        Ok(id)
    }

    /// Take one share of `id` for `claimant`.
    ///
    /// Removes the session in the same step when the last slot goes.
    pub fn claim(&self, id: &SessionId, claimant: &AccountId) -> Result<ClaimedShare, ClaimError> {
        let Entry::Occupied(mut entry) = self.sessions.entry(*id) else {
            return Err(ClaimError::NotFound);
        };

        let session = entry.get_mut();
        if session.claimed.contains(claimant) {
            return Err(ClaimError::AlreadyClaimed);
        }
        if session.remaining_slots == 0 {
            return Err(ClaimError::NoSlots);
        }

        let share = ShareAllocator::allocate(session.remaining_pool, session.remaining_slots);
        session.remaining_pool = session.remaining_pool.saturating_sub(share);
        session.remaining_slots -= 1;
        session.claimed.insert(*claimant);

        let claimed = ClaimedShare {
            share,
            currency: session.currency,
            originator: session.originator.clone(),
            collapsed: session.remaining_slots == 0,
        };
        if claimed.collapsed {
            entry.remove();
            debug!(session = %id, "session collapsed");
        }
        Ok(claimed)
    }

    /// Remove `id` if it is still live.
    ///
    /// Returns the leftover funds, or `None` when the session is already gone
    /// or held nothing.
    pub fn expire(&self, id: &SessionId) -> Option<ExpiredSession> {
        let (_, session) = self.sessions.remove(id)?;
        if session.remaining_pool.is_zero() {
            return None;
        }
        Some(ExpiredSession {
            originator: session.originator,
            remaining: session.remaining_pool,
            currency: session.currency,
        })
    }

    pub fn peek(&self, id: &SessionId) -> Option<SessionView> {
        self.sessions.get(id).map(|s| s.view(*id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }

    /// Remove every live session, returning those that still held funds.
    pub fn drain(&self) -> Vec<(SessionId, ExpiredSession)> {
        self.active_ids()
            .into_iter()
            .filter_map(|id| self.expire(&id).map(|expired| (id, expired)))
            .collect()
    }
}
