//! In-memory paper broker used for dry replays of signal files.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{OrderAck, OrderRequest, OrderRouter, OrderSide, PositionSource};

/// A simulated fill.
#[derive(Debug, Clone)]
pub struct PaperFill {
    pub order_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: Decimal,
    pub filled_at: DateTime<Utc>,
}

impl PaperFill {
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Paper broker: fills every order immediately at its limit price, or at the
/// reference price for market orders.
pub struct PaperBroker {
    cash: Arc<RwLock<Decimal>>,
    positions: Arc<RwLock<HashMap<String, Decimal>>>,
    fills: Arc<RwLock<Vec<PaperFill>>>,
}

impl PaperBroker {
    /// Create a paper account holding only cash.
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            cash: Arc::new(RwLock::new(starting_cash)),
            positions: Arc::new(RwLock::new(HashMap::new())),
            fills: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed an existing holding (e.g. to replay sells).
    pub async fn seed_position(&self, ticker: &str, quantity: Decimal) {
        self.positions
            .write()
            .await
            .insert(ticker.to_string(), quantity);
    }

    pub async fn cash(&self) -> Decimal {
        *self.cash.read().await
    }

    pub async fn positions(&self) -> HashMap<String, Decimal> {
        self.positions.read().await.clone()
    }

    pub async fn fills(&self) -> Vec<PaperFill> {
        self.fills.read().await.clone()
    }
}

#[async_trait]
impl PositionSource for PaperBroker {
    async fn position_quantity(&self, ticker: &str) -> Result<Decimal> {
        Ok(self
            .positions
            .read()
            .await
            .get(ticker)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

#[async_trait]
impl OrderRouter for PaperBroker {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        if order.quantity == 0 {
            bail!("Order quantity must be positive");
        }

        let price = order.limit_price.unwrap_or(order.reference_price);
        let quantity = Decimal::from(order.quantity);
        let notional = price * quantity;

        let mut cash = self.cash.write().await;
        let mut positions = self.positions.write().await;
        let held = positions.get(&order.ticker).copied().unwrap_or(Decimal::ZERO);

        match order.side {
            OrderSide::Buy => {
                if notional > *cash {
                    bail!(
                        "Insufficient paper cash for {} {}: need {}, have {}",
                        order.quantity,
                        order.ticker,
                        notional,
                        *cash
                    );
                }
                *cash -= notional;
                positions.insert(order.ticker.clone(), held + quantity);
            }
            OrderSide::Sell => {
                if quantity > held {
                    bail!(
                        "Cannot sell {} {}: only {} held",
                        order.quantity,
                        order.ticker,
                        held
                    );
                }
                *cash += notional;
                let remaining = held - quantity;
                if remaining.is_zero() {
                    positions.remove(&order.ticker);
                } else {
                    positions.insert(order.ticker.clone(), remaining);
                }
            }
        }

        let fill = PaperFill {
            order_id: uuid::Uuid::new_v4().to_string(),
            ticker: order.ticker.clone(),
            side: order.side,
            quantity: order.quantity,
            price,
            filled_at: Utc::now(),
        };

        debug!(cash = %*cash, "Paper cash updated");
        info!(
            order_id = %fill.order_id,
            ticker = %fill.ticker,
            side = fill.side.as_str(),
            quantity = fill.quantity,
            price = %fill.price,
            "[PAPER] Order filled"
        );

        let ack = OrderAck {
            order_id: fill.order_id.clone(),
            status: "FILLED".to_string(),
        };
        self.fills.write().await.push(fill);

        Ok(ack)
    }
}
