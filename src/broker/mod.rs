//! Broker collaborators: position lookups and order routing.
//!
//! The decision engine never talks to a broker. These traits are the seams
//! the signal processor uses around it:
//! - [`PositionSource`] answers "how many shares do we hold"
//! - [`OrderRouter`] accepts a sized order

mod paper;
mod schwab;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use paper::PaperBroker;
pub use schwab::SchwabClient;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    /// Good-til-cancelled limit at the signal price
    Limit,
}

/// A sized order ready for a router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub ticker: String,
    pub quantity: u64,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Set for limit orders only
    pub limit_price: Option<Decimal>,
    /// Signal price the order was sized against
    pub reference_price: Decimal,
    /// Allow fills outside regular market hours
    pub extended_hours: bool,
}

/// Acknowledgement returned by a router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAck {
    pub order_id: String,
    pub status: String,
}

/// Source of current holdings.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Long quantity currently held for `ticker` (0 when flat).
    async fn position_quantity(&self, ticker: &str) -> Result<Decimal>;
}

/// Destination for sized orders.
#[async_trait]
pub trait OrderRouter: Send + Sync {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck>;
}
