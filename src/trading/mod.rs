//! Trading logic: configuration, signal sizing, order routing.

mod config;
mod decision_engine;
mod notifier;
mod processor;

pub use config::{SizingMode, TradingConfig};
pub use decision_engine::DecisionEngine;
pub use notifier::{Severity, StatusSink, TracingSink};
pub use processor::{Action, SignalProcessor};
