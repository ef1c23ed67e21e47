//! Double-average share allocation.
//!
//! Each non-final claim draws uniformly from `[1, max(2, 2 * avg))` minor
//! units, where `avg` is the live average of the remaining pool over the
//! remaining slots. The last slot takes everything left.
//!
//! The draw is clamped to `remaining_pool - (remaining_slots - 1)` so every
//! later slot keeps at least one minor unit. That keeps `Σ shares == pool`
//! exact by construction, with no post-hoc correction.

use rand::Rng;

use lixi_core::constants::{MIN_DRAW_CEILING, MIN_SHARE};
use lixi_core::types::Amount;

/// Stateless share calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareAllocator;

impl ShareAllocator {
    /// Compute the next share using the thread-local RNG.
    pub fn allocate(remaining_pool: Amount, remaining_slots: u32) -> Amount {
        Self::allocate_with(&mut rand::thread_rng(), remaining_pool, remaining_slots)
    }

    /// Compute the next share with a caller-supplied RNG.
    ///
    /// Returns [`Amount::ZERO`] for an empty pool or zero slots; the registry
    /// never calls it in that state.
    pub fn allocate_with<R: Rng + ?Sized>(
        rng: &mut R,
        remaining_pool: Amount,
        remaining_slots: u32,
    ) -> Amount {
        let pool = remaining_pool.minor();
        if pool == 0 || remaining_slots == 0 {
            return Amount::ZERO;
        }
        if remaining_slots == 1 {
            return remaining_pool;
        }

        let slots = u64::from(remaining_slots);
        // 2 * (pool / slots), divided last so no remainder is lost.
        let ceiling = (pool.saturating_mul(2) / slots).max(MIN_DRAW_CEILING);
        let draw = rng.gen_range(MIN_SHARE..ceiling);

        // Reserve one minor unit for each slot after this one.
        let cap = pool.saturating_sub(slots - 1).clamp(MIN_SHARE, pool);
        Amount::from_minor(draw.min(cap))
    }
}
