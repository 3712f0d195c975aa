//! Data models for trade signals and sizing decisions.

mod decision;
mod signal;

pub use decision::{Decision, Rejection};
pub use signal::{parse_tier_level, Direction, TradeSignal};
