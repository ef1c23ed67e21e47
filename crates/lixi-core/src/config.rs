//! Engine configuration.
//!
//! Provides [`EngineConfig`] with defaults for per-currency amount limits,
//! session slot limits, session expiry, and the reward-pack catalog. The
//! configuration is built programmatically or deserialized by the host; this
//! crate does not read files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_EXPIRY_SECS, DEFAULT_MAX_AMOUNT, DEFAULT_MAX_POINTS, DEFAULT_MAX_SLOTS,
    DEFAULT_MIN_AMOUNT, DEFAULT_MIN_POINTS, DEFAULT_MIN_SLOTS, DEFAULT_REWARD_PACK,
};
use crate::error::{ConfigError, DistributionError};
use crate::types::{Amount, CurrencyKind};

/// Inclusive bounds on a single distribution amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountLimits {
    pub min: Amount,
    pub max: Amount,
}

impl AmountLimits {
    pub const fn new(min: Amount, max: Amount) -> Self {
        Self { min, max }
    }

    /// Check `amount` against the bounds.
    pub fn check(&self, amount: Amount) -> Result<(), DistributionError> {
        if amount < self.min {
            return Err(DistributionError::AmountTooLow {
                min: self.min,
                got: amount,
            });
        }
        if amount > self.max {
            return Err(DistributionError::AmountTooHigh {
                max: self.max,
                got: amount,
            });
        }
        Ok(())
    }
}

/// Configuration for a distribution engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Amount limits for the primary economy.
    pub primary: AmountLimits,
    /// Amount limits for the points economy.
    pub points: AmountLimits,
    /// Fewest claim slots a broadcast session may have.
    pub min_slots: u32,
    /// Most claim slots a broadcast session may have.
    pub max_slots: u32,
    /// Seconds before an unfinished session expires and refunds.
    pub expiry_secs: u64,
    /// Reward packs by name. Each command may use the `%player%` placeholder.
    pub reward_packs: BTreeMap<String, Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut reward_packs = BTreeMap::new();
        reward_packs.insert(
            DEFAULT_REWARD_PACK.to_string(),
            vec![
                "give %player% diamond 1".to_string(),
                "give %player% emerald 2".to_string(),
            ],
        );

        Self {
            primary: AmountLimits::new(
                Amount::from_minor(DEFAULT_MIN_AMOUNT),
                Amount::from_minor(DEFAULT_MAX_AMOUNT),
            ),
            points: AmountLimits::new(
                Amount::from_minor(DEFAULT_MIN_POINTS),
                Amount::from_minor(DEFAULT_MAX_POINTS),
            ),
            min_slots: DEFAULT_MIN_SLOTS,
            max_slots: DEFAULT_MAX_SLOTS,
            expiry_secs: DEFAULT_EXPIRY_SECS,
            reward_packs,
        }
    }
}

impl EngineConfig {
    /// Amount limits for a currency kind.
    pub fn limits(&self, kind: CurrencyKind) -> &AmountLimits {
        match kind {
            CurrencyKind::Primary => &self.primary,
            CurrencyKind::Points => &self.points,
        }
    }

    /// Session expiry as a [`Duration`].
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    /// Commands of a reward pack, if configured.
    pub fn reward_pack(&self, name: &str) -> Option<&[String]> {
        self.reward_packs.get(name).map(Vec::as_slice)
    }

    /// Check slot count against the configured bounds.
    pub fn check_slots(&self, slots: u32) -> Result<(), DistributionError> {
        if slots < self.min_slots {
            return Err(DistributionError::SlotsTooLow {
                min: self.min_slots,
                got: slots,
            });
        }
        if slots > self.max_slots {
            return Err(DistributionError::SlotsTooHigh {
                max: self.max_slots,
                got: slots,
            });
        }
        Ok(())
    }

    /// Reject configurations the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, limits) in [("primary", &self.primary), ("points", &self.points)] {
            if limits.min > limits.max {
                return Err(ConfigError::InvertedRange {
                    field,
                    min: limits.min.to_string(),
                    max: limits.max.to_string(),
                });
            }
        }
        if self.min_slots == 0 {
            return Err(ConfigError::Zero("min_slots"));
        }
        if self.min_slots > self.max_slots {
            return Err(ConfigError::InvertedRange {
                field: "slots",
                min: self.min_slots.to_string(),
                max: self.max_slots.to_string(),
            });
        }
        if self.expiry_secs == 0 {
            return Err(ConfigError::Zero("expiry_secs"));
        }
        if let Some((name, _)) = self.reward_packs.iter().find(|(_, cmds)| cmds.is_empty()) {
            return Err(ConfigError::EmptyRewardPack(name.clone()));
        }
        Ok(())
    }
}
