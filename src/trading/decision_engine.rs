//! Decision engine: turns a trade signal into an order quantity.
//!
//! The signal walks a fixed sequence of gates:
//! 1. tier lookup from the level string
//! 2. depth + code percentage accumulation
//! 3. tier enable switch
//! 4. trading list and trading levels
//! 5. per-ticker direction switch
//! 6. fund or quantity sizing
//!
//! A gate that fires yields a zero-quantity [`Decision`] and a warning on the
//! status sink. The engine never returns an error.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::models::{parse_tier_level, Decision, Direction, Rejection, TradeSignal};

use super::{Severity, SizingMode, StatusSink, TradingConfig};

const SOURCE: &str = "Decision QTY Handler";
const FUND_MODE_SOURCE: &str = "Decision QTY Handler - FUND MODE";
const QTY_MODE_SOURCE: &str = "Decision QTY Handler - QTY MODE";

/// Stateless signal-to-quantity engine over a shared configuration snapshot.
#[derive(Clone)]
pub struct DecisionEngine {
    config: Arc<TradingConfig>,
    sink: Arc<dyn StatusSink>,
}

impl DecisionEngine {
    pub fn new(config: Arc<TradingConfig>, sink: Arc<dyn StatusSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Compute the quantity and position percentage for `signal`.
    pub fn decide(&self, signal: &TradeSignal) -> Decision {
        let config = &*self.config;

        let tier = match parse_tier_level(&signal.level) {
            Ok(tier) => Some(tier),
            Err(e) => {
                debug!(level = %signal.level, error = %e, "Level does not parse to a tier");
                None
            }
        };
        let Some((tier, tier_config)) = tier.and_then(|t| config.tier(t).map(|c| (t, c))) else {
            return self.reject(
                Decimal::ZERO,
                Rejection::UnknownTier {
                    level: signal.level.clone(),
                },
            );
        };

        let position_pct = tier_config.position_pct(signal.depth, signal.code);

        if !tier_config.enabled {
            return self.reject(position_pct, Rejection::TierDisabled { tier });
        }

        if !config.is_tradable(&signal.ticker) {
            return self.reject(
                position_pct,
                Rejection::TickerNotTradable {
                    ticker: signal.ticker.clone(),
                },
            );
        }
        if !config.is_valid_level(&signal.level) {
            return self.reject(
                position_pct,
                Rejection::LevelNotRecognized {
                    level: signal.level.clone(),
                },
            );
        }

        if !config.direction_enabled(&signal.ticker, &signal.direction) {
            let action = match signal.direction {
                Direction::Bull => "buy",
                Direction::Bear => "sell",
                Direction::Other(_) => "trade",
            };
            return self.reject(
                position_pct,
                Rejection::DirectionDisabled {
                    ticker: signal.ticker.clone(),
                    action: action.to_string(),
                },
            );
        }

        let Some(mode) = config.sizing.mode() else {
            return self.reject(position_pct, Rejection::InvalidSizingMode);
        };

        let (quantity, source) = match mode {
            SizingMode::Fund => {
                if signal.price <= Decimal::ZERO {
                    return self.reject(
                        position_pct,
                        Rejection::InvalidPrice {
                            price: signal.price,
                        },
                    );
                }
                let fund = config.sizing.initial_fund(&signal.ticker);
                (fund_quantity(position_pct, fund, signal.price), FUND_MODE_SOURCE)
            }
            SizingMode::Quantity => {
                let per_percent = config.sizing.one_percent_qty(&signal.ticker);
                (percent_quantity(position_pct, per_percent), QTY_MODE_SOURCE)
            }
        };

        let Some(quantity) = quantity else {
            return self.reject(position_pct, Rejection::QuantityOverflow);
        };

        self.sink.notify(
            source,
            &format!(
                "Decision, {} {} qty is {}, position pct is {}",
                signal.direction, signal.ticker, quantity, position_pct
            ),
            Severity::Info,
        );

        Decision::sized(quantity, position_pct)
    }

    fn reject(&self, position_pct: Decimal, rejection: Rejection) -> Decision {
        self.sink.notify(
            SOURCE,
            &format!("Warning, {}, qty is 0, please check the trading settings", rejection),
            Severity::Warning,
        );
        Decision::rejected(position_pct, rejection)
    }
}

/// `trunc(pct * fund / price)`, truncating toward zero.
fn fund_quantity(position_pct: Decimal, fund: Decimal, price: Decimal) -> Option<i64> {
    position_pct
        .checked_mul(fund)?
        .checked_div(price)?
        .trunc()
        .to_i64()
}

/// `trunc(pct * 100) * per_percent`: whole percentage points only.
fn percent_quantity(position_pct: Decimal, per_percent: i64) -> Option<i64> {
    let points = position_pct.checked_mul(dec!(100))?.trunc().to_i64()?;
    points.checked_mul(per_percent)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::trading::notifier::RecordingSink;
    use crate::trading::config::{DirectionFlags, TierConfig};

    /// Tier 3 with depth{2: 1%} and code{5: 2%}, TQQQ tradable, fund mode at 10k.
    fn scenario_config() -> TradingConfig {
        let mut config = TradingConfig::default();
        config.tiers.insert(
            3,
            TierConfig {
                enabled: true,
                depth: BTreeMap::from([(2, dec!(0.01))]),
                code: BTreeMap::from([(5, dec!(0.02))]),
            },
        );
        config.sizing.fund_mode = true;
        config.sizing.qty_mode = false;
        config
            .sizing
            .initial_funds
            .insert("TQQQ".to_string(), dec!(10000));
        config
    }

    fn signal(level: &str, depth: i64, code: i64, price: Decimal, ticker: &str) -> TradeSignal {
        TradeSignal {
            level: level.to_string(),
            depth,
            code,
            price,
            ticker: ticker.to_string(),
            direction: Direction::Bull,
        }
    }

    fn engine(config: TradingConfig) -> (DecisionEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = DecisionEngine::new(Arc::new(config), sink.clone());
        (engine, sink)
    }

    #[test]
    fn test_fund_mode_sizing() {
        let (engine, sink) = engine(scenario_config());

        let decision = engine.decide(&signal("L3", 2, 5, dec!(50), "TQQQ"));

        assert_eq!(decision, Decision::sized(6, dec!(0.03)));
        let (source, message, severity) = sink.last().unwrap();
        assert_eq!(source, FUND_MODE_SOURCE);
        assert_eq!(severity, Severity::Info);
        assert!(message.contains("qty is 6"));
    }

    #[test]
    fn test_disabled_tier_reports_percentage() {
        let mut config = scenario_config();
        config.tiers.get_mut(&3).unwrap().enabled = false;
        let (engine, sink) = engine(config);

        let decision = engine.decide(&signal("L3", 2, 5, dec!(50), "TQQQ"));

        assert_eq!(decision.quantity, 0);
        assert_eq!(decision.position_pct, dec!(0.03));
        assert_eq!(decision.rejection, Some(Rejection::TierDisabled { tier: 3 }));
        assert_eq!(sink.last().unwrap().2, Severity::Warning);
    }

    #[test]
    fn test_untradable_ticker_keeps_percentage() {
        let (engine, _) = engine(scenario_config());

        let decision = engine.decide(&signal("L3", 2, 5, dec!(0.1), "DOGE"));

        assert_eq!(decision.quantity, 0);
        assert_eq!(decision.position_pct, dec!(0.03));
        assert_eq!(
            decision.rejection,
            Some(Rejection::TickerNotTradable {
                ticker: "DOGE".to_string()
            })
        );
    }

    #[test]
    fn test_quantity_mode_truncates_points() {
        let mut config = scenario_config();
        config.sizing.fund_mode = false;
        config.sizing.qty_mode = true;
        config
            .sizing
            .one_percent_qty
            .insert("TQQQ".to_string(), 10);
        config.tiers.insert(
            3,
            TierConfig {
                enabled: true,
                depth: BTreeMap::from([(1, dec!(0.015)), (2, dec!(0.02))]),
                code: BTreeMap::from([(5, dec!(0.007))]),
            },
        );
        let (engine, sink) = engine(config);

        // 1.5 points -> 1 point -> 10 shares
        let coarse = engine.decide(&signal("L3", 1, 0, dec!(50), "TQQQ"));
        assert_eq!(coarse, Decision::sized(10, dec!(0.015)));

        // 2.7 points -> 2 points -> 20 shares
        let summed = engine.decide(&signal("L3", 2, 5, dec!(50), "TQQQ"));
        assert_eq!(summed, Decision::sized(20, dec!(0.027)));
        assert_eq!(sink.last().unwrap().0, QTY_MODE_SOURCE);
    }

    #[test]
    fn test_unknown_tier_zeroes_percentage() {
        let (engine, _) = engine(scenario_config());

        for level in ["L9", "L", "3", "Lx", ""] {
            let decision = engine.decide(&signal(level, 2, 5, dec!(50), "TQQQ"));
            assert_eq!(decision.quantity, 0);
            assert_eq!(decision.position_pct, Decimal::ZERO);
            assert_eq!(
                decision.rejection,
                Some(Rejection::UnknownTier {
                    level: level.to_string()
                })
            );
        }
    }

    #[test]
    fn test_additivity() {
        let (engine, _) = engine(scenario_config());

        let depth_only = engine.decide(&signal("L3", 2, 99, dec!(50), "TQQQ"));
        assert_eq!(depth_only.position_pct, dec!(0.01));
        assert_eq!(depth_only.quantity, 2);

        let code_only = engine.decide(&signal("L3", 99, 5, dec!(50), "TQQQ"));
        assert_eq!(code_only.position_pct, dec!(0.02));
        assert_eq!(code_only.quantity, 4);

        let neither = engine.decide(&signal("L3", 99, 99, dec!(50), "TQQQ"));
        assert_eq!(neither, Decision::sized(0, Decimal::ZERO));
    }

    #[test]
    fn test_level_must_be_in_trading_levels() {
        let (engine, _) = engine(scenario_config());

        // Parses to tier 3 but is not one of the accepted spellings
        let decision = engine.decide(&signal("T3", 2, 5, dec!(50), "TQQQ"));

        assert_eq!(decision.quantity, 0);
        assert_eq!(decision.position_pct, dec!(0.03));
        assert_eq!(
            decision.rejection,
            Some(Rejection::LevelNotRecognized {
                level: "T3".to_string()
            })
        );
    }

    #[test]
    fn test_direction_gates() {
        let mut config = scenario_config();
        config.direction_flags.insert(
            "TQQQ".to_string(),
            DirectionFlags {
                buy: false,
                sell: true,
            },
        );
        let (engine, _) = engine(config);

        let mut bull = signal("L3", 2, 5, dec!(50), "TQQQ");
        let blocked = engine.decide(&bull);
        assert_eq!(blocked.quantity, 0);
        assert_eq!(blocked.position_pct, dec!(0.03));
        assert_eq!(
            blocked.rejection,
            Some(Rejection::DirectionDisabled {
                ticker: "TQQQ".to_string(),
                action: "buy".to_string()
            })
        );

        bull.direction = Direction::Bear;
        assert_eq!(engine.decide(&bull).quantity, 6);

        bull.direction = Direction::Other("Neutral".to_string());
        assert_eq!(engine.decide(&bull).quantity, 6);
    }

    #[test]
    fn test_sell_gate_blocks_bear_signal() {
        let mut config = scenario_config();
        config.direction_flags.insert(
            "TQQQ".to_string(),
            DirectionFlags {
                buy: true,
                sell: false,
            },
        );
        let (engine, sink) = engine(config);

        let mut bear = signal("L3", 2, 5, dec!(50), "TQQQ");
        bear.direction = Direction::Bear;
        let blocked = engine.decide(&bear);
        assert_eq!(blocked.quantity, 0);
        assert_eq!(blocked.position_pct, dec!(0.03));
        assert_eq!(
            blocked.rejection,
            Some(Rejection::DirectionDisabled {
                ticker: "TQQQ".to_string(),
                action: "sell".to_string()
            })
        );
        let (source, message, severity) = sink.last().unwrap();
        assert_eq!(source, SOURCE);
        assert_eq!(
            message,
            "Warning, TQQQ sell is not enabled, qty is 0, please check the trading settings"
        );
        assert_eq!(severity, Severity::Warning);

        bear.direction = Direction::Bull;
        assert_eq!(engine.decide(&bear).quantity, 6);
    }

    #[test]
    fn test_invalid_sizing_mode() {
        let mut config = scenario_config();
        config.sizing.fund_mode = false;
        config.sizing.qty_mode = false;
        let (engine, _) = engine(config);

        let decision = engine.decide(&signal("L3", 2, 5, dec!(50), "TQQQ"));

        assert_eq!(
            decision,
            Decision::rejected(dec!(0.03), Rejection::InvalidSizingMode)
        );
    }

    #[test]
    fn test_fund_mode_allows_zero_quantity() {
        let (engine, _) = engine(scenario_config());

        // 0.03 * 10000 / 400 = 0.75
        let decision = engine.decide(&signal("L3", 2, 5, dec!(400), "TQQQ"));

        assert_eq!(decision, Decision::sized(0, dec!(0.03)));
        assert!(!decision.is_rejected());
    }

    #[test]
    fn test_fund_mode_is_exact_and_monotonic() {
        let fund = dec!(10000);
        let price = dec!(37.5);
        let mut previous = 0;

        for step in 0..=100 {
            let pct = Decimal::from(step) * dec!(0.001);
            let quantity = fund_quantity(pct, fund, price).unwrap();
            assert_eq!(quantity, (pct * fund / price).trunc().to_i64().unwrap());
            assert!(quantity >= previous);
            previous = quantity;
        }
    }

    #[test]
    fn test_negative_percentage_truncates_toward_zero() {
        let mut config = scenario_config();
        config.tiers.insert(
            3,
            TierConfig {
                enabled: true,
                depth: BTreeMap::from([(2, dec!(-0.0125))]),
                code: BTreeMap::new(),
            },
        );
        let (fund_engine, _) = engine(config.clone());

        // -0.0125 * 10000 / 50 = -2.5 -> -2
        let decision = fund_engine.decide(&signal("L3", 2, 0, dec!(50), "TQQQ"));
        assert_eq!(decision, Decision::sized(-2, dec!(-0.0125)));

        config.sizing.fund_mode = false;
        config.sizing.qty_mode = true;
        let (qty_engine, _) = engine(config);

        // -1.25 points -> -1 point -> -10 shares
        let decision = qty_engine.decide(&signal("L3", 2, 0, dec!(50), "TQQQ"));
        assert_eq!(decision.quantity, -10);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let mut config = scenario_config();
        config
            .sizing
            .initial_funds
            .insert("TQQQ".to_string(), Decimal::MAX);
        let (engine, _) = engine(config);

        let decision = engine.decide(&signal("L3", 2, 5, dec!(0.0001), "TQQQ"));

        assert_eq!(decision.quantity, 0);
        assert_eq!(decision.rejection, Some(Rejection::QuantityOverflow));
    }

    #[test]
    fn test_zero_price_is_rejected() {
        let (engine, _) = engine(scenario_config());

        let decision = engine.decide(&signal("L3", 2, 5, Decimal::ZERO, "TQQQ"));

        assert_eq!(
            decision.rejection,
            Some(Rejection::InvalidPrice {
                price: Decimal::ZERO
            })
        );
    }

    #[test]
    fn test_decisions_are_idempotent() {
        let (engine, sink) = engine(scenario_config());
        let input = signal("L3", 2, 5, dec!(50), "TQQQ");

        let first = engine.decide(&input);
        let second = engine.decide(&input);

        assert_eq!(first, second);
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn test_shared_across_threads() {
        let (engine, sink) = engine(scenario_config());
        let input = signal("L3", 2, 5, dec!(50), "TQQQ");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let input = input.clone();
                std::thread::spawn(move || engine.decide(&input))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Decision::sized(6, dec!(0.03)));
        }
        assert_eq!(sink.events().len(), 4);
    }
}
