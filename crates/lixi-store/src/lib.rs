//! # lixi-store: durable single-claim tokens.
//!
//! - [`storage::SqliteClaimStore`]: [`ClaimStore`](lixi_core::traits::ClaimStore)
//!   over a SQLite file, safe to share between processes
//! - [`schema`]: versioned, additive schema migrations

pub mod schema;
pub mod storage;

pub use storage::SqliteClaimStore;
