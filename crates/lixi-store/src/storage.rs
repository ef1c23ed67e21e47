//! SQLite-backed persistent claim-token storage.
//!
//! Implements [`ClaimStore`] over a single `claim_tokens` table. The claim
//! transition is one conditional `UPDATE ... WHERE status = 'unclaimed'`
//! issued inside an immediate transaction, so exactly one caller wins even
//! when several processes share the database file.
//!
//! Every operation opens its own connection; SQLite's file locking (with a
//! busy timeout) is the only synchronization.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use lixi_core::constants::STORE_BUSY_TIMEOUT_MS;
use lixi_core::error::StoreError;
use lixi_core::traits::ClaimStore;
use lixi_core::types::{
    AccountId, Amount, ClaimedToken, CurrencyKind, TokenId, TokenRecord, TokenStatus,
};

use crate::schema;

fn storage_err(e: rusqlite::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// SQLite-backed claim-token store.
///
/// Holds only the database path, so it is freely shareable between threads.
#[derive(Debug, Clone)]
pub struct SqliteClaimStore {
    path: PathBuf,
}

impl SqliteClaimStore {
    /// Open or create the database at `path` and apply pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let mut conn = store.connect()?;
        schema::run_migrations(&mut conn).map_err(storage_err)?;
        info!(path = %store.path.display(), "claim store opened");
        Ok(store)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of tokens currently in `status`.
    pub fn count(&self, status: TokenStatus) -> Result<u64, StoreError> {
        let conn = self.connect()?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM claim_tokens WHERE status = ?1",
                params![status.as_str()],
                |r| r.get(0),
            )
            .map_err(storage_err)?;
        u64::try_from(n).map_err(|_| StoreError::Corrupt(format!("negative count {n}")))
    }

    // --- Internal helpers ---

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path).map_err(storage_err)?;
        conn.busy_timeout(Duration::from_millis(STORE_BUSY_TIMEOUT_MS))
            .map_err(storage_err)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(storage_err)?;
        Ok(conn)
    }
}

fn amount_to_sql(amount: Amount) -> Result<i64, StoreError> {
    i64::try_from(amount.minor())
        .map_err(|_| StoreError::Storage(format!("amount {amount} exceeds storage range")))
}

fn amount_from_sql(raw: i64) -> Result<Amount, StoreError> {
    u64::try_from(raw)
        .map(Amount::from_minor)
        .map_err(|_| StoreError::Corrupt(format!("negative amount {raw}")))
}

fn parse_column<T: FromStr>(raw: &str, column: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("{column}: {raw}")))
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt(format!("{column}: {raw}")))
}

impl ClaimStore for SqliteClaimStore {
    fn issue(
        &self,
        id: &TokenId,
        amount: Amount,
        originator: &AccountId,
        currency: CurrencyKind,
    ) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO claim_tokens (id, amount, originator, status, currency_kind, created_at)
             VALUES (?1, ?2, ?3, 'unclaimed', ?4, ?5)",
            params![
                id.to_string(),
                amount_to_sql(amount)?,
                originator.to_string(),
                currency.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(storage_err)?;
        debug!(token = %id, %amount, %currency, "token issued");
        Ok(())
    }

    fn claim(&self, id: &TokenId) -> Result<ClaimedToken, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage_err)?;

        let changed = tx
            .execute(
                "UPDATE claim_tokens SET status = 'claimed', claimed_at = ?1
                 WHERE id = ?2 AND status = 'unclaimed'",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
            .map_err(storage_err)?;
        if changed == 0 {
            // Dropping the transaction rolls back; nothing was written anyway.
            return Err(StoreError::AlreadyClaimedOrNotFound);
        }

        let (raw_amount, raw_currency): (i64, String) = tx
            .query_row(
                "SELECT amount, currency_kind FROM claim_tokens WHERE id = ?1",
                params![id.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .map_err(storage_err)?;
        let claimed = ClaimedToken {
            amount: amount_from_sql(raw_amount)?,
            currency: parse_column(&raw_currency, "currency_kind")?,
        };

        tx.commit().map_err(storage_err)?;
        debug!(token = %id, amount = %claimed.amount, "token claimed");
        Ok(claimed)
    }

    fn lookup(&self, id: &TokenId) -> Result<Option<TokenRecord>, StoreError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT amount, originator, status, currency_kind, created_at, claimed_at
                 FROM claim_tokens WHERE id = ?1",
                params![id.to_string()],
                |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(storage_err)?;

        let Some((amount, originator, status, currency, created_at, claimed_at)) = row else {
            return Ok(None);
        };

        Ok(Some(TokenRecord {
            id: *id,
            amount: amount_from_sql(amount)?,
            originator: parse_column(&originator, "originator")?,
            status: parse_column(&status, "status")?,
            currency: parse_column(&currency, "currency_kind")?,
            created_at: parse_timestamp(&created_at, "created_at")?,
            claimed_at: claimed_at
                .as_deref()
                .map(|raw| parse_timestamp(raw, "claimed_at"))
                .transpose()?,
        }))
    }
}
