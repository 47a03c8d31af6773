//! Order lifecycle.
//!
//! ```text
//! new -> confirmed -> assembled -> dispatched -> delivered
//!   \________\___________\____________\-------> canceled
//! ```
//!
//! Status changes after `new` are driven by vendors and fulfillment, never by
//! the ordering customer. The customer may only delete an order while it is
//! still being prepared.

use serde::{Deserialize, Serialize};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    New,
    Confirmed,
    Assembled,
    Dispatched,
    Delivered,
    Canceled,
}

impl OrderStatus {
    /// Statuses in which the owning customer may delete the order.
    pub const CUSTOMER_DELETABLE: [Self; 3] = [Self::New, Self::Confirmed, Self::Assembled];

    /// Whether the owning customer may still delete an order in this status.
    #[must_use]
    pub const fn is_customer_deletable(self) -> bool {
        matches!(self, Self::New | Self::Confirmed | Self::Assembled)
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled)
    }

    /// The next status on the fulfillment path, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Assembled),
            Self::Assembled => Some(Self::Dispatched),
            Self::Dispatched => Some(Self::Delivered),
            Self::Delivered | Self::Canceled => None,
        }
    }

    /// Whether `self -> to` is a legal transition.
    ///
    /// Only single forward steps are allowed, plus cancellation from any
    /// non-terminal status.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Canceled || self.next() == Some(to)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Assembled => "assembled",
            Self::Dispatched => "dispatched",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "confirmed" => Ok(Self::Confirmed),
            "assembled" => Ok(Self::Assembled),
            "dispatched" => Ok(Self::Dispatched),
            "delivered" => Ok(Self::Delivered),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            other => Err(format!("invalid order status: {other}")),
        }
    }
}
