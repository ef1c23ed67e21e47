//! Core value types: amounts, accounts, identifiers, currency kinds, token records.
//!
//! All monetary values are fixed-point counts of minor units
//! (1 major unit = [`MINOR_PER_MAJOR`] minor units).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::MINOR_PER_MAJOR;
use crate::error::{MoneyParseError, ParseError};
use crate::money;

/// A non-negative amount of currency in minor units.
///
/// Arithmetic is checked; an `Amount` can never go negative.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    /// Create an amount from a count of minor units.
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Create an amount from whole major units. Returns `None` on overflow.
    pub fn from_major(major: u64) -> Option<Self> {
        major.checked_mul(MINOR_PER_MAJOR).map(Self)
    }

    /// The amount in minor units.
    pub const fn minor(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_PER_MAJOR,
            self.0 % MINOR_PER_MAJOR
        )
    }
}

impl FromStr for Amount {
    type Err = MoneyParseError;

    /// Parses the short money format (`"1.5k"`, `"2M"`, `"5.5T"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        money::parse_money(s)
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| ParseError::InvalidId(s.to_string()))
            }
        }
    };
}

uuid_id!(
    /// Opaque reference to an account in the backing economies.
    AccountId
);

uuid_id!(
    /// Identifier of an in-memory broadcast session.
    ///
    /// Deliberately a different type from [`TokenId`]: a token id can never be
    /// presented to the session claim path.
    SessionId
);

uuid_id!(
    /// Identifier of a persisted single-claim token.
    TokenId
);

/// An actor taking part in a distribution: an account plus its display name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// An account with a freshly generated id.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(AccountId::new(), name)
    }
}

/// Which economy backs an amount.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurrencyKind {
    /// The server's primary economy.
    #[default]
    Primary,
    /// A points-based secondary economy.
    Points,
}

impl CurrencyKind {
    pub const ALL: [CurrencyKind; 2] = [CurrencyKind::Primary, CurrencyKind::Points];

    /// Stable tag used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::Points => "POINTS",
        }
    }
}

impl fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRIMARY" => Ok(Self::Primary),
            "POINTS" => Ok(Self::Points),
            _ => Err(ParseError::UnknownCurrencyKind(s.to_string())),
        }
    }
}

/// Claim status of a persisted token.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Unclaimed,
    Claimed,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclaimed => "unclaimed",
            Self::Claimed => "claimed",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unclaimed" => Ok(Self::Unclaimed),
            "claimed" => Ok(Self::Claimed),
            other => Err(ParseError::UnknownTokenStatus(other.to_string())),
        }
    }
}

/// Full row of a persisted token, as returned by diagnostic lookups.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: TokenId,
    pub amount: Amount,
    pub originator: AccountId,
    pub status: TokenStatus,
    pub currency: CurrencyKind,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

/// What a successful token claim yields: the fixed amount and its currency.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimedToken {
    pub amount: Amount,
    pub currency: CurrencyKind,
}
