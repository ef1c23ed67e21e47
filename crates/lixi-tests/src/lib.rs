//! Cross-crate test suite for Lixi.
//!
//! Integration tests under `tests/` drive a fully wired engine (SQLite claim
//! store, in-memory ledgers, recording collaborators) through the complete
//! session and token lifecycles, and try to break the money invariants under
//! concurrency and randomized inputs.

pub mod helpers;
