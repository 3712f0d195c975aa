//! Trade signal model: wire shape, validated signal, and tier level parsing.

use std::fmt;
use std::num::ParseIntError;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Intended bias of a signal.
///
/// Anything other than `Bull` or `Bear` is kept verbatim and is never gated
/// by the per-ticker direction flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Bull,
    Bear,
    Other(String),
}

impl Direction {
    pub fn as_str(&self) -> &str {
        match self {
            Direction::Bull => "Bull",
            Direction::Bear => "Bear",
            Direction::Other(raw) => raw,
        }
    }
}

impl From<&str> for Direction {
    fn from(raw: &str) -> Self {
        match raw {
            "Bull" => Direction::Bull,
            "Bear" => Direction::Bear,
            other => Direction::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to extract a tier number from a level string such as `"L3"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelParseError {
    #[error("level is empty")]
    Empty,

    #[error("level {0:?} has no prefix before the tier number")]
    MissingPrefix(String),

    #[error("level {0:?} has no tier number after the prefix")]
    MissingDigits(String),

    #[error("level {level:?} has an invalid tier number: {source}")]
    InvalidNumber {
        level: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parse the tier number out of a level identifier.
///
/// Exactly one leading non-digit character is stripped and the remainder is
/// parsed as an unsigned integer: `"L3"` -> `3`, `"T12"` -> `12`.
pub fn parse_tier_level(level: &str) -> Result<u32, LevelParseError> {
    let mut chars = level.chars();
    let prefix = chars.next().ok_or(LevelParseError::Empty)?;
    if prefix.is_ascii_digit() {
        return Err(LevelParseError::MissingPrefix(level.to_string()));
    }

    let digits = chars.as_str();
    if digits.is_empty() {
        return Err(LevelParseError::MissingDigits(level.to_string()));
    }

    digits
        .parse::<u32>()
        .map_err(|source| LevelParseError::InvalidNumber {
            level: level.to_string(),
            source,
        })
}

/// Errors raised while turning a wire payload into a [`TradeSignal`].
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("malformed signal payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("signal price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("signal ticker is empty")]
    EmptyTicker,
}

/// Signal exactly as received from the alert source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignal {
    pub level: String,

    #[serde(deserialize_with = "int_or_string")]
    pub depth: i64,

    #[serde(deserialize_with = "int_or_string")]
    pub code_num: i64,

    /// Accepts either a JSON number or a numeric string
    pub price: Decimal,

    pub ticker: String,

    pub direction: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(value) => Ok(value),
        IntOrString::Str(raw) => raw.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Validated, immutable trade signal handed to the decision engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSignal {
    /// Raw level identifier, e.g. "L3"
    pub level: String,

    /// Depth bucket within the tier
    pub depth: i64,

    /// Code bucket within the tier (independent of depth)
    pub code: i64,

    /// Reference price for the ticker
    pub price: Decimal,

    pub ticker: String,

    pub direction: Direction,
}

impl TradeSignal {
    /// Parse and validate a JSON payload in the wire shape.
    pub fn from_json(payload: &str) -> Result<Self, SignalError> {
        let raw: RawSignal = serde_json::from_str(payload)?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawSignal> for TradeSignal {
    type Error = SignalError;

    fn try_from(raw: RawSignal) -> Result<Self, Self::Error> {
        if raw.price <= Decimal::ZERO {
            return Err(SignalError::NonPositivePrice(raw.price));
        }
        let ticker = raw.ticker.trim();
        if ticker.is_empty() {
            return Err(SignalError::EmptyTicker);
        }

        Ok(Self {
            level: raw.level,
            depth: raw.depth,
            code: raw.code_num,
            price: raw.price,
            ticker: ticker.to_string(),
            direction: Direction::from(raw.direction.as_str()),
        })
    }
}
