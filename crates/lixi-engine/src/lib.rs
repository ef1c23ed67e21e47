//! # lixi-engine
//! Share allocation, the in-memory session registry, currency dispatch, and
//! the [`DistributionEngine`] that ties them to storage and scheduling.

pub mod allocator;
pub mod currency;
pub mod engine;
pub mod ledger;
pub mod registry;
pub mod scheduler;

pub use allocator::ShareAllocator;
pub use currency::CurrencyRegistry;
pub use engine::{DistributionEngine, EngineParts, Redemption};
pub use ledger::MemoryLedger;
pub use registry::{ClaimedShare, ExpiredSession, SessionRegistry, SessionView};
#[cfg(any(test, feature = "testing"))]
pub use scheduler::ManualScheduler;
pub use scheduler::TokioScheduler;
