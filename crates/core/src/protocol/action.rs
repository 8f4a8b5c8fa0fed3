use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ActionError;

/// The closed set of protocol operations an agent may invoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolAction {
    Search,
    Select,
    Init,
    Confirm,
    Status,
    Track,
    Cancel,
    Support,
}

impl ProtocolAction {
    pub const ALL: [Self; 8] = [
        Self::Search,
        Self::Select,
        Self::Init,
        Self::Confirm,
        Self::Status,
        Self::Track,
        Self::Cancel,
        Self::Support,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Select => "select",
            Self::Init => "init",
            Self::Confirm => "confirm",
            Self::Status => "status",
            Self::Track => "track",
            Self::Cancel => "cancel",
            Self::Support => "support",
        }
    }

    /// Path segment appended to the gateway base URL.
    pub fn endpoint(&self) -> &'static str {
        self.as_str()
    }

    /// Every action past `search` talks to a counterparty chosen from a search result.
    pub fn requires_counterparty(&self) -> bool {
        !matches!(self, Self::Search)
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Search => &["item", "delivery_location"],
            Self::Select => &["bpp_id", "bpp_uri", "provider_id", "item_id"],
            Self::Init => {
                &["bpp_id", "bpp_uri", "provider_id", "item_id", "billing_info", "delivery_info"]
            }
            Self::Confirm => &[
                "bpp_id",
                "bpp_uri",
                "provider_id",
                "item_id",
                "billing_info",
                "delivery_info",
                "payment_info",
            ],
            Self::Status | Self::Track | Self::Cancel | Self::Support => {
                &["bpp_id", "bpp_uri", "order_id"]
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Search => {
                "Search for items. Input is the item name and the delivery location as GPS coordinates (\"lat,lng\")."
            }
            Self::Select => {
                "Select an item from a search result. Input is bpp_id, bpp_uri, provider_id and item_id."
            }
            Self::Init => {
                "Initialize an order. Input is bpp_id, bpp_uri, provider_id, item_id, billing info and delivery info (location, address, phone)."
            }
            Self::Confirm => {
                "Confirm an order. Input is bpp_id, bpp_uri, provider_id, item_id, billing, delivery and payment info."
            }
            Self::Status => "Check the status of an order. Input is bpp_id, bpp_uri and order_id.",
            Self::Track => "Track an order. Input is bpp_id, bpp_uri and order_id.",
            Self::Cancel => "Cancel an order. Input is bpp_id, bpp_uri and order_id.",
            Self::Support => {
                "Request support for an order. Input is bpp_id, bpp_uri and order_id."
            }
        }
    }
}

impl fmt::Display for ProtocolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolAction {
    type Err = ActionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| ActionError::UnknownAction { name: value.to_string() })
    }
}
