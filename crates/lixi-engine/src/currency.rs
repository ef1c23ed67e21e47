//! Runtime table of currency providers, one per [`CurrencyKind`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use lixi_core::error::DistributionError;
use lixi_core::traits::CurrencyProvider;
use lixi_core::types::CurrencyKind;

/// Maps each currency kind to its provider.
///
/// Providers may be registered, replaced, or removed while the engine runs.
/// Lookups clone the `Arc` out of the lock, so no lock is held while a
/// provider is being called.
#[derive(Default)]
pub struct CurrencyRegistry {
    providers: RwLock<HashMap<CurrencyKind, Arc<dyn CurrencyProvider>>>,
}

impl fmt::Debug for CurrencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrencyRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl CurrencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own kind, returning the one it replaced.
    pub fn register(&self, provider: Arc<dyn CurrencyProvider>) -> Option<Arc<dyn CurrencyProvider>> {
        let kind = provider.kind();
        let previous = self.providers.write().insert(kind, provider);
        info!(currency = %kind, replaced = previous.is_some(), "currency provider registered");
        previous
    }

    pub fn unregister(&self, kind: CurrencyKind) -> Option<Arc<dyn CurrencyProvider>> {
        let removed = self.providers.write().remove(&kind);
        if removed.is_some() {
            info!(currency = %kind, "currency provider unregistered");
        }
        removed
    }

    pub fn get(&self, kind: CurrencyKind) -> Option<Arc<dyn CurrencyProvider>> {
        self.providers.read().get(&kind).cloned()
    }

    /// The provider for `kind`, if registered and currently usable.
    pub fn available(&self, kind: CurrencyKind) -> Result<Arc<dyn CurrencyProvider>, DistributionError> {
        self.get(kind)
            .filter(|p| p.is_available())
            .ok_or(DistributionError::CurrencyUnavailable(kind))
    }

    /// Registered kinds, in a stable order.
    pub fn kinds(&self) -> Vec<CurrencyKind> {
        let mut kinds: Vec<_> = self.providers.read().keys().copied().collect();
        kinds.sort();
        kinds
    }
}
