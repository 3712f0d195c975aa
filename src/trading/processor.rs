//! Signal processor: runs the decision engine and routes the resulting order.

use std::fmt;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::broker::{OrderAck, OrderRequest, OrderRouter, OrderSide, OrderType, PositionSource};
use crate::models::{Decision, Direction, TradeSignal};

use super::{DecisionEngine, Severity, StatusSink};

const SOURCE: &str = "Signal Processor";

/// What happened to a signal after sizing.
#[derive(Debug, Clone)]
pub enum Action {
    Submitted { order: OrderRequest, ack: OrderAck },
    DryRun { order: OrderRequest },
    Skipped { reason: String },
    Failed { order: Option<OrderRequest>, error: String },
}

/// A processed signal: the engine's decision plus the routing result.
#[derive(Debug, Clone)]
pub struct ProcessedSignal {
    pub decision: Decision,
    pub action: Action,
}

impl fmt::Display for ProcessedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "qty {} pct {}",
            self.decision.quantity,
            (self.decision.position_pct * Decimal::ONE_HUNDRED).normalize()
        )?;
        if let Some(rejection) = &self.decision.rejection {
            write!(f, "% rejected ({})", rejection)?;
        } else {
            write!(f, "%")?;
        }

        match &self.action {
            Action::Submitted { order, ack } => write!(
                f,
                " -> {} {}, order id {}",
                describe_order(order),
                ack.status.to_lowercase(),
                ack.order_id
            ),
            Action::DryRun { order } => write!(f, " -> dry run {}", describe_order(order)),
            // The rejection text is already on the line
            Action::Skipped { .. } if self.decision.is_rejected() => write!(f, " -> skipped"),
            Action::Skipped { reason } => write!(f, " -> skipped: {}", reason),
            Action::Failed { order: Some(order), error } => {
                write!(f, " -> failed {}: {}", describe_order(order), error)
            }
            Action::Failed { order: None, error } => write!(f, " -> failed: {}", error),
        }
    }
}

fn describe_order(order: &OrderRequest) -> String {
    match order.limit_price {
        Some(price) => format!(
            "{} {} {} limit @ {}",
            order.side.as_str(),
            order.quantity,
            order.ticker,
            price
        ),
        None => format!(
            "{} {} {} market",
            order.side.as_str(),
            order.quantity,
            order.ticker
        ),
    }
}

/// Drives one signal at a time from decision to order.
pub struct SignalProcessor {
    engine: DecisionEngine,
    sink: Arc<dyn StatusSink>,
    positions: Arc<dyn PositionSource>,
    router: Arc<dyn OrderRouter>,
    dry_run: bool,
}

impl SignalProcessor {
    pub fn new(
        engine: DecisionEngine,
        sink: Arc<dyn StatusSink>,
        positions: Arc<dyn PositionSource>,
        router: Arc<dyn OrderRouter>,
        dry_run: bool,
    ) -> Self {
        Self {
            engine,
            sink,
            positions,
            router,
            dry_run,
        }
    }

    /// Size `signal` and hand the order to the router.
    ///
    /// Never fails: broker errors are reported on the sink and returned as
    /// [`Action::Failed`] so the caller can keep consuming signals.
    pub async fn process(&self, signal: &TradeSignal) -> ProcessedSignal {
        let decision = self.engine.decide(signal);
        let action = self.route(signal, &decision).await;
        ProcessedSignal { decision, action }
    }

    async fn route(&self, signal: &TradeSignal, decision: &Decision) -> Action {
        if !decision.is_actionable() {
            let reason = match &decision.rejection {
                Some(rejection) => rejection.to_string(),
                None => "computed quantity is 0".to_string(),
            };
            debug!(ticker = %signal.ticker, reason = %reason, "No order for signal");
            return Action::Skipped { reason };
        }

        let requested = decision.quantity.unsigned_abs();
        let (side, quantity) = match &signal.direction {
            Direction::Bull => (OrderSide::Buy, requested),
            Direction::Bear => {
                let held = match self.positions.position_quantity(&signal.ticker).await {
                    Ok(held) => held,
                    Err(e) => return self.fail(None, format!("position lookup failed: {:#}", e)),
                };
                // Fractional shares cannot be sold through an equity order
                let held = held.trunc().to_u64().unwrap_or(0);
                if held == 0 {
                    return self.skip(format!("no {} position to sell", signal.ticker));
                }
                (OrderSide::Sell, requested.min(held))
            }
            Direction::Other(raw) => {
                return self.skip(format!("direction {:?} has no order side", raw));
            }
        };

        let config = self.engine.config();
        let order = OrderRequest {
            ticker: signal.ticker.clone(),
            quantity,
            side,
            order_type: config.order_type,
            limit_price: match config.order_type {
                OrderType::Limit => Some(signal.price),
                OrderType::Market => None,
            },
            reference_price: signal.price,
            extended_hours: config.extended_hours,
        };

        if self.dry_run {
            info!(
                ticker = %order.ticker,
                side = order.side.as_str(),
                quantity = order.quantity,
                price = %signal.price,
                "[DRY RUN] Would submit order"
            );
            return Action::DryRun { order };
        }

        let result = self.router.submit_order(&order).await;
        match result {
            Ok(ack) => {
                self.sink.notify(
                    SOURCE,
                    &format!(
                        "{} {} {} {}, order id {}",
                        order.side.as_str(),
                        order.quantity,
                        order.ticker,
                        ack.status.to_lowercase(),
                        ack.order_id
                    ),
                    Severity::Info,
                );
                Action::Submitted { order, ack }
            }
            Err(e) => self.fail(Some(order), format!("order rejected: {:#}", e)),
        }
    }

    fn skip(&self, reason: String) -> Action {
        self.sink.notify(SOURCE, &reason, Severity::Warning);
        Action::Skipped { reason }
    }

    fn fail(&self, order: Option<OrderRequest>, error: String) -> Action {
        self.sink.notify(SOURCE, &error, Severity::Error);
        Action::Failed { order, error }
    }
}
