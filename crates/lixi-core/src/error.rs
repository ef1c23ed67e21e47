//! Error types for the Lixi engine.
use thiserror::Error;

use crate::types::{Amount, CurrencyKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    #[error("money value cannot be empty")] Empty,
    #[error("money value cannot be negative: {0}")] Negative(String),
    #[error("invalid money format: {0}")] InvalidFormat(String),
    #[error("money value finer than 0.01: {0}")] TooPrecise(String),
    #[error("money value too large: {0}")] Overflow(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown currency kind: {0}")] UnknownCurrencyKind(String),
    #[error("unknown token status: {0}")] UnknownTokenStatus(String),
    #[error("invalid identifier: {0}")] InvalidId(String),
}

/// Failure reported by a currency provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("currency backend unavailable")] Unavailable,
    #[error("rejected by currency backend: {0}")] Rejected(String),
    #[error("currency backend error: {0}")] Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is shut down")] Shutdown,
    #[error("scheduler rejected task: {0}")] Rejected(String),
}

/// Outcome of a failed claim against the in-memory session registry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    #[error("session not found")] NotFound,
    #[error("already claimed from this session")] AlreadyClaimed,
    #[error("session has no slots left")] NoSlots,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("token already claimed or not found")] AlreadyClaimedOrNotFound,
    #[error("storage: {0}")] Storage(String),
    #[error("corrupt row: {0}")] Corrupt(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("reward command failed: {0}")] Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field}: minimum {min} exceeds maximum {max}")] InvertedRange { field: &'static str, min: String, max: String },
    #[error("{0} must be greater than zero")] Zero(&'static str),
    #[error("reward pack {0} has no commands")] EmptyRewardPack(String),
}

/// One notification category per failure, as shown to the acting account.
///
/// Token not-found and already-claimed are deliberately a single category;
/// for sessions they stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    AmountOutOfRange,
    SlotsOutOfRange,
    CountOutOfRange,
    InsufficientFunds,
    InvalidTarget,
    CurrencyUnavailable,
    ProviderFailure,
    NotFound,
    AlreadyClaimed,
    NoSlots,
    AlreadyClaimedOrNotFound,
    StorageError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmountOutOfRange => "amount_out_of_range",
            Self::SlotsOutOfRange => "slots_out_of_range",
            Self::CountOutOfRange => "count_out_of_range",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InvalidTarget => "invalid_target",
            Self::CurrencyUnavailable => "currency_unavailable",
            Self::ProviderFailure => "provider_failure",
            Self::NotFound => "not_found",
            Self::AlreadyClaimed => "already_claimed",
            Self::NoSlots => "no_slots",
            Self::AlreadyClaimedOrNotFound => "already_claimed_or_not_found",
            Self::StorageError => "storage_error",
        }
    }
}

/// Errors surfaced by the distribution engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("amount {got} is below the minimum of {min}")] AmountTooLow { min: Amount, got: Amount },
    #[error("amount {got} exceeds the maximum of {max}")] AmountTooHigh { max: Amount, got: Amount },
    #[error("{got} slots is below the minimum of {min}")] SlotsTooLow { min: u32, got: u32 },
    #[error("{got} slots exceeds the maximum of {max}")] SlotsTooHigh { max: u32, got: u32 },
    #[error("cannot grant {got} packs, allowed 1 to {max}")] PackCountOutOfRange { max: u32, got: u32 },
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: Amount, need: Amount },
    #[error("cannot send to yourself")] InvalidTarget,
    #[error("currency {0} is not available")] CurrencyUnavailable(CurrencyKind),
    #[error("currency provider failure: {0}")] ProviderFailure(String),
    #[error("not found")] NotFound,
    #[error("already claimed")] AlreadyClaimed,
    #[error("no slots left")] NoSlots,
    #[error("token already claimed or not found")] AlreadyClaimedOrNotFound,
    #[error("storage: {0}")] Storage(String),
}

impl DistributionError {
    /// The notification category for this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AmountTooLow { .. } | Self::AmountTooHigh { .. } => FailureKind::AmountOutOfRange,
            Self::SlotsTooLow { .. } | Self::SlotsTooHigh { .. } => FailureKind::SlotsOutOfRange,
            Self::PackCountOutOfRange { .. } => FailureKind::CountOutOfRange,
            Self::InsufficientFunds { .. } => FailureKind::InsufficientFunds,
            Self::InvalidTarget => FailureKind::InvalidTarget,
            Self::CurrencyUnavailable(_) => FailureKind::CurrencyUnavailable,
            Self::ProviderFailure(_) => FailureKind::ProviderFailure,
            Self::NotFound => FailureKind::NotFound,
            Self::AlreadyClaimed => FailureKind::AlreadyClaimed,
            Self::NoSlots => FailureKind::NoSlots,
            Self::AlreadyClaimedOrNotFound => FailureKind::AlreadyClaimedOrNotFound,
            Self::Storage(_) => FailureKind::StorageError,
        }
    }
}

impl From<ClaimError> for DistributionError {
    fn from(e: ClaimError) -> Self {
        match e {
            ClaimError::NotFound => Self::NotFound,
            ClaimError::AlreadyClaimed => Self::AlreadyClaimed,
            ClaimError::NoSlots => Self::NoSlots,
        }
    }
}

impl From<StoreError> for DistributionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyClaimedOrNotFound => Self::AlreadyClaimedOrNotFound,
            StoreError::Storage(msg) => Self::Storage(msg),
            corrupt @ StoreError::Corrupt(_) => Self::Storage(corrupt.to_string()),
        }
    }
}
