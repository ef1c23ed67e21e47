//! Schema + migrations for the claim-token table.
//!
//! Migrations are additive and applied in order. The version check and every
//! pending migration run inside one immediate transaction, so concurrent
//! openers of a fresh file serialize and later ones find nothing to do. The
//! applied version is tracked in `_migrations`.

use rusqlite::{params, Connection, TransactionBehavior};
use tracing::info;

/// A schema migration with version, name, and SQL.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "claim_tokens",
        up: "CREATE TABLE IF NOT EXISTS claim_tokens (
                id TEXT PRIMARY KEY,
                amount INTEGER NOT NULL CHECK (amount > 0),
                originator TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'unclaimed'
                    CHECK (status IN ('unclaimed', 'claimed'))
            );",
    },
    Migration {
        version: 2,
        name: "currency_kind",
        up: "ALTER TABLE claim_tokens ADD COLUMN currency_kind TEXT NOT NULL DEFAULT 'PRIMARY';",
    },
    Migration {
        version: 3,
        name: "audit_timestamps",
        up: "ALTER TABLE claim_tokens ADD COLUMN created_at TEXT NOT NULL
                DEFAULT '1970-01-01T00:00:00+00:00';
             ALTER TABLE claim_tokens ADD COLUMN claimed_at TEXT;",
    },
];

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0)
}

/// Currently applied schema version (0 for a fresh database).
pub fn current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )
}

/// Apply every migration newer than the recorded version.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = current_version(&tx)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            name = migration.name,
            "applying claim store migration"
        );
        tx.execute_batch(migration.up)?;
        tx.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
    }

    tx.commit()
}
