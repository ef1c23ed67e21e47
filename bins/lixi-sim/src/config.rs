//! Simulation configuration loaded from environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use lixi_core::config::EngineConfig;
use lixi_core::money::parse_money;
use lixi_core::types::Amount;

/// Session expiry used when neither `LIXI_ENGINE_CONFIG` nor
/// `LIXI_EXPIRY_SECS` sets one, so a run finishes quickly.
const SIM_EXPIRY_SECS: u64 = 5;

#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the claim-token database.
    pub data_dir: PathBuf,
    /// Engine limits, expiry, and reward packs.
    pub engine: EngineConfig,
    /// Balance every simulated account starts with.
    pub starting_balance: Amount,
    /// Pool of the broadcast session and amount of the minted token.
    pub pool: Amount,
    /// Slots in the broadcast session.
    pub slots: u32,
    /// How many accounts claim from the session before it expires.
    pub claimants: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `LIXI_ENGINE_CONFIG` may hold a JSON [`EngineConfig`]; unspecified
    /// fields keep their defaults. `LIXI_EXPIRY_SECS`, when set, overrides
    /// its expiry.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());
        let env_money = |name: &str, default: &str| {
            parse_money(&env_or(name, default))
                .with_context(|| format!("{name} must be a money value like 1.5k"))
        };

        let data_dir = var("LIXI_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lixi")
        });

        let mut engine: EngineConfig = match var("LIXI_ENGINE_CONFIG") {
            Some(json) => serde_json::from_str(&json).context("LIXI_ENGINE_CONFIG must be a JSON engine config")?,
            None => EngineConfig {
                expiry_secs: SIM_EXPIRY_SECS,
                ..EngineConfig::default()
            },
        };
        if let Some(raw) = var("LIXI_EXPIRY_SECS") {
            engine.expiry_secs = raw
                .parse()
                .context("LIXI_EXPIRY_SECS must be a positive integer")?;
        }
        engine.validate().context("invalid engine configuration")?;

        let starting_balance = env_money("LIXI_BALANCE", "100k")?;
        let pool = env_money("LIXI_POOL", "5k")?;

        let slots: u32 = env_or("LIXI_SLOTS", "5")
            .parse()
            .context("LIXI_SLOTS must be a positive integer")?;

        let claimants: usize = env_or("LIXI_CLAIMANTS", "3")
            .parse()
            .context("LIXI_CLAIMANTS must be a non-negative integer")?;

        Ok(Config {
            data_dir,
            engine,
            starting_balance,
            pool,
            slots,
            claimants,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("claim_tokens.db")
    }
}
