//! User-visible events handed to the presentation layer.

use serde::Serialize;

use crate::error::FailureKind;
use crate::types::{Amount, SessionId, TokenId};

/// An event the presentation layer turns into a notification.
///
/// `display` fields carry the amount already formatted by the currency
/// provider that backs it.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
    SessionOpened {
        session: SessionId,
        originator: String,
        amount: Amount,
        display: String,
        slots: u32,
    },
    ShareClaimed {
        session: SessionId,
        amount: Amount,
        display: String,
    },
    SessionRefunded {
        session: SessionId,
        amount: Amount,
        display: String,
    },
    TokenMinted {
        token: TokenId,
        amount: Amount,
        display: String,
    },
    TokenRedeemed {
        token: TokenId,
        amount: Amount,
        display: String,
    },
    RewardPackOpened {
        pack: String,
    },
    RewardPackGranted {
        pack: String,
        count: u32,
    },
    TransferSent {
        recipient: String,
        amount: Amount,
        display: String,
    },
    TransferReceived {
        sender: String,
        amount: Amount,
        display: String,
    },
    Rejected {
        #[serde(serialize_with = "serialize_kind")]
        kind: FailureKind,
        reason: String,
    },
}

fn serialize_kind<S: serde::Serializer>(kind: &FailureKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.as_str())
}

impl Notice {
    /// Stable category tag; failures use their [`FailureKind`] tag.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SessionOpened { .. } => "session_opened",
            Self::ShareClaimed { .. } => "share_claimed",
            Self::SessionRefunded { .. } => "session_refunded",
            Self::TokenMinted { .. } => "token_minted",
            Self::TokenRedeemed { .. } => "token_redeemed",
            Self::RewardPackOpened { .. } => "reward_pack_opened",
            Self::RewardPackGranted { .. } => "reward_pack_granted",
            Self::TransferSent { .. } => "transfer_sent",
            Self::TransferReceived { .. } => "transfer_received",
            Self::Rejected { kind, .. } => kind.as_str(),
        }
    }
}
