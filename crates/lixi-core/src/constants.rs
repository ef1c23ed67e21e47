//! Engine constants. All monetary values in minor units (1 major unit = 100 minor units).

/// Minor units per major currency unit. The minimal granularity is 0.01.
pub const MINOR_PER_MAJOR: u64 = 100;

/// Smallest share a claimant can receive from a session, in minor units (0.01).
pub const MIN_SHARE: u64 = 1;

/// Floor of the share draw range in minor units (0.02). Keeps the double-average
/// range non-degenerate when the live average drops below the minimum share.
pub const MIN_DRAW_CEILING: u64 = 2;

pub const DEFAULT_EXPIRY_SECS: u64 = 60;
pub const DEFAULT_MIN_SLOTS: u32 = 1;
pub const DEFAULT_MAX_SLOTS: u32 = 50;

pub const DEFAULT_MIN_AMOUNT: u64 = 1_000 * MINOR_PER_MAJOR;
pub const DEFAULT_MAX_AMOUNT: u64 = 1_000_000 * MINOR_PER_MAJOR;
pub const DEFAULT_MIN_POINTS: u64 = 10 * MINOR_PER_MAJOR;
pub const DEFAULT_MAX_POINTS: u64 = 100_000 * MINOR_PER_MAJOR;

/// Placeholder replaced with the claimant's display name in reward commands.
pub const PLAYER_PLACEHOLDER: &str = "%player%";

/// Name of the reward pack shipped in the default configuration.
pub const DEFAULT_REWARD_PACK: &str = "default";

/// Most reward-pack carriers a single grant may hand out.
pub const MAX_PACK_GRANT: u32 = 64;

/// How long a store connection waits on a locked database before failing.
pub const STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
