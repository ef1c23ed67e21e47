//! Token carriers: opaque items that embed a token identifier.
//!
//! Rendering a carrier as an in-game item is the job of an external item
//! system. The engine only embeds and reads identifiers, inspects the tag
//! to pick the redemption path, and marks the carrier spent once redeemed.

use serde::{Deserialize, Serialize};

use crate::traits::TokenCarrier;
use crate::types::TokenId;

/// What kind of redemption a carrier leads to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CarrierKind {
    /// Redeems a persisted money token for its fixed amount.
    Money,
    /// Redeems the named reward pack from the configured catalog.
    RewardPack(String),
}

/// A plain in-memory carrier: a tag, an optional embedded identifier, and
/// whether it has been used up.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TaggedCarrier {
    kind: CarrierKind,
    token: Option<TokenId>,
    #[serde(default)]
    spent: bool,
}

impl TaggedCarrier {
    /// An empty money-token carrier awaiting an identifier.
    pub fn money() -> Self {
        Self {
            kind: CarrierKind::Money,
            token: None,
            spent: false,
        }
    }

    pub fn reward_pack(name: impl Into<String>) -> Self {
        Self {
            kind: CarrierKind::RewardPack(name.into()),
            token: None,
            spent: false,
        }
    }
}

impl TokenCarrier for TaggedCarrier {
    fn kind(&self) -> CarrierKind {
        self.kind.clone()
    }

    fn embed_identifier(&mut self, id: TokenId) {
        self.token = Some(id);
    }

    fn read_identifier(&self) -> Option<TokenId> {
        self.token
    }

    fn is_spent(&self) -> bool {
        self.spent
    }

    fn spend(&mut self) {
        self.spent = true;
    }
}
