//! Trading configuration: tier table, universe, direction flags and sizing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::broker::OrderType;
use crate::models::{parse_tier_level, Direction};

/// One tier of the table: an enable switch plus two additive bucket maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub enabled: bool,

    /// Depth bucket -> position percentage (0.01 = 1%)
    #[serde(default)]
    pub depth: BTreeMap<i64, Decimal>,

    /// Code bucket -> position percentage
    #[serde(default)]
    pub code: BTreeMap<i64, Decimal>,
}

impl TierConfig {
    /// Sum of the depth and code contributions; either may be absent.
    pub fn position_pct(&self, depth: i64, code: i64) -> Decimal {
        let mut pct = Decimal::ZERO;
        if let Some(depth_pct) = self.depth.get(&depth) {
            pct += *depth_pct;
        }
        if let Some(code_pct) = self.code.get(&code) {
            pct += *code_pct;
        }
        pct
    }
}

/// Per-ticker buy/sell switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionFlags {
    pub buy: bool,
    pub sell: bool,
}

/// Active quantity derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    /// Quantity from a fixed fund per ticker
    Fund,
    /// Quantity from a fixed share count per whole percentage point
    Quantity,
}

/// Sizing switches and per-ticker parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingConfig {
    pub fund_mode: bool,

    pub qty_mode: bool,

    /// Ticker -> initial fund in dollars (fund mode)
    #[serde(default)]
    pub initial_funds: HashMap<String, Decimal>,

    /// Ticker -> shares per one percentage point (quantity mode)
    #[serde(default)]
    pub one_percent_qty: HashMap<String, i64>,
}

impl SizingConfig {
    /// Fund mode wins when both switches are on.
    pub fn mode(&self) -> Option<SizingMode> {
        if self.fund_mode {
            Some(SizingMode::Fund)
        } else if self.qty_mode {
            Some(SizingMode::Quantity)
        } else {
            None
        }
    }

    /// Zero when the ticker has no fund configured.
    pub fn initial_fund(&self, ticker: &str) -> Decimal {
        self.initial_funds
            .get(ticker)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// One share per point when the ticker has no entry.
    pub fn one_percent_qty(&self, ticker: &str) -> i64 {
        self.one_percent_qty.get(ticker).copied().unwrap_or(1)
    }
}

/// Process-wide trading configuration, loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Tier number -> tier settings
    pub tiers: BTreeMap<u32, TierConfig>,

    /// Tickers eligible for trading
    pub trading_list: BTreeSet<String>,

    /// Raw level strings accepted for trading
    pub trading_levels: BTreeSet<String>,

    /// Ticker -> buy/sell switches; tickers without an entry are not gated
    #[serde(default)]
    pub direction_flags: HashMap<String, DirectionFlags>,

    pub sizing: SizingConfig,

    /// How sized orders are sent
    #[serde(default = "default_order_type")]
    pub order_type: OrderType,

    /// Let limit orders fill outside regular market hours
    #[serde(default)]
    pub extended_hours: bool,
}

fn default_order_type() -> OrderType {
    OrderType::Limit
}

impl TradingConfig {
    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse trading config")
    }

    pub fn tier(&self, tier: u32) -> Option<&TierConfig> {
        self.tiers.get(&tier)
    }

    pub fn is_tradable(&self, ticker: &str) -> bool {
        self.trading_list.contains(ticker)
    }

    pub fn is_valid_level(&self, level: &str) -> bool {
        self.trading_levels.contains(level)
    }

    /// Whether `direction` may trade `ticker`. Only Bull and Bear are gated.
    pub fn direction_enabled(&self, ticker: &str, direction: &Direction) -> bool {
        let Some(flags) = self.direction_flags.get(ticker) else {
            return true;
        };
        match direction {
            Direction::Bull => flags.buy,
            Direction::Bear => flags.sell,
            Direction::Other(_) => true,
        }
    }

    /// Configuration smells that do not stop the engine but usually mean a typo.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match (self.sizing.fund_mode, self.sizing.qty_mode) {
            (true, true) => {
                warnings.push("Both fund_mode and qty_mode are on; fund mode is used".to_string())
            }
            (false, false) => warnings
                .push("Neither fund_mode nor qty_mode is on; every decision will be 0".to_string()),
            _ => {}
        }

        for ticker in &self.trading_list {
            match self.sizing.mode() {
                Some(SizingMode::Fund) if !self.sizing.initial_funds.contains_key(ticker) => {
                    warnings.push(format!("{} has no initial fund; fund mode sizes it at 0", ticker))
                }
                Some(SizingMode::Quantity) if !self.sizing.one_percent_qty.contains_key(ticker) => {
                    warnings.push(format!(
                        "{} has no one-percent quantity; quantity mode uses 1",
                        ticker
                    ))
                }
                _ => {}
            }
        }

        for level in &self.trading_levels {
            match parse_tier_level(level) {
                Ok(tier) if self.tier(tier).is_none() => {
                    warnings.push(format!("Trading level {} has no tier {} in the table", level, tier))
                }
                Err(e) => warnings.push(format!("Trading level {} is unusable: {}", level, e)),
                _ => {}
            }
        }

        warnings
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        let tiers = BTreeMap::from([
            (
                1,
                TierConfig {
                    enabled: true,
                    depth: BTreeMap::from([(1, dec!(0.01)), (2, dec!(0.02))]),
                    code: BTreeMap::from([(1, dec!(0.01))]),
                },
            ),
            (
                2,
                TierConfig {
                    enabled: true,
                    depth: BTreeMap::from([(1, dec!(0.02)), (2, dec!(0.03))]),
                    code: BTreeMap::from([(1, dec!(0.01)), (2, dec!(0.02))]),
                },
            ),
            (
                3,
                TierConfig {
                    enabled: true,
                    depth: BTreeMap::from([(1, dec!(0.03)), (2, dec!(0.04)), (3, dec!(0.05))]),
                    code: BTreeMap::from([(1, dec!(0.01)), (2, dec!(0.02)), (3, dec!(0.03))]),
                },
            ),
            (
                4,
                TierConfig {
                    enabled: false,
                    depth: BTreeMap::from([(1, dec!(0.05)), (2, dec!(0.08))]),
                    code: BTreeMap::from([(1, dec!(0.02))]),
                },
            ),
        ]);

        let tickers = ["TQQQ", "SOXL", "IBIT"];
        let all_on = DirectionFlags {
            buy: true,
            sell: true,
        };

        Self {
            tiers,
            trading_list: tickers.iter().map(|t| t.to_string()).collect(),
            trading_levels: ["L1", "L2", "L3"].iter().map(|l| l.to_string()).collect(),
            direction_flags: tickers.iter().map(|t| (t.to_string(), all_on)).collect(),
            sizing: SizingConfig {
                fund_mode: true,
                qty_mode: false,
                initial_funds: tickers.iter().map(|t| (t.to_string(), dec!(10000))).collect(),
                one_percent_qty: tickers.iter().map(|t| (t.to_string(), 10)).collect(),
            },
            order_type: OrderType::Limit,
            extended_hours: true,
        }
    }
}
