//! # lixi-core
//! Foundation types and traits for the Lixi distribution engine.

pub mod carrier;
pub mod config;
pub mod constants;
pub mod error;
pub mod money;
pub mod notice;
pub mod traits;
pub mod types;
