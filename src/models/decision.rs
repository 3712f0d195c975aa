//! Decision produced for a single trade signal.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Why a signal was turned into a zero-quantity decision.
///
/// None of these are fatal: the engine always hands back a well-formed
/// [`Decision`] and reports the reason through the status sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("level {level:?} does not map to a configured tier")]
    UnknownTier { level: String },

    #[error("tier {tier} is not enabled")]
    TierDisabled { tier: u32 },

    #[error("ticker {ticker} is not in the trading list")]
    TickerNotTradable { ticker: String },

    #[error("level {level:?} is not in the trading levels")]
    LevelNotRecognized { level: String },

    #[error("{ticker} {action} is not enabled")]
    DirectionDisabled { ticker: String, action: String },

    #[error("neither fund mode nor quantity mode is enabled")]
    InvalidSizingMode,

    #[error("price {price} cannot be used for sizing")]
    InvalidPrice { price: Decimal },

    #[error("computed quantity does not fit in an order")]
    QuantityOverflow,
}

/// Order quantity and the position percentage that produced it.
///
/// `quantity` is authoritative for trading. `position_pct` is telemetry and
/// can be non-zero even when the quantity is 0 because a gate fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub quantity: i64,
    pub position_pct: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl Decision {
    /// A quantity produced by one of the sizing modes (may legitimately be 0).
    pub fn sized(quantity: i64, position_pct: Decimal) -> Self {
        Self {
            quantity,
            position_pct,
            rejection: None,
        }
    }

    /// A zero-quantity decision caused by a gate.
    pub fn rejected(position_pct: Decimal, rejection: Rejection) -> Self {
        Self {
            quantity: 0,
            position_pct,
            rejection: Some(rejection),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }

    /// True when there is something to send to a broker.
    pub fn is_actionable(&self) -> bool {
        self.quantity != 0
    }
}
