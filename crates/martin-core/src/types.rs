//! Market data and window types.
//!
//! Contains the hourly market window identity, candle and tick
//! primitives, and the TA oracle output record.

use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Row id of a market window in the ledger.
pub type WindowId = i64;

/// Tradeable asset symbol (e.g. "BTC", "ETH").
///
/// The set of assets is small and fixed by configuration; this is a thin
/// wrapper so asset strings cannot be confused with slugs or token ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asset(String);

impl Asset {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Asset {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Market outcome direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }

    /// The opposite direction.
    pub fn flipped(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            other => Err(CoreError::InvalidDirection(other.to_string())),
        }
    }
}

/// Candle interval supported by the candle source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    OneMinute,
    FiveMinutes,
}

impl CandleInterval {
    /// Interval length in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
        }
    }

    /// Wire name used by candle APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
        }
    }
}

impl std::fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// OHLCV candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time (Unix seconds, UTC).
    pub ts: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Whether the bar closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// A single order-book price observation for an outcome token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Observation time (Unix seconds, UTC).
    pub ts: i64,
    /// Best-ask price of the outcome token, in [0, 1].
    pub price: Decimal,
}

impl PriceTick {
    pub fn new(ts: i64, price: Decimal) -> Self {
        Self { ts, price }
    }
}

/// An hourly up/down market window.
///
/// Created by discovery; the only later mutation is setting `outcome`
/// at settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketWindow {
    /// Ledger row id (0 before the window is persisted).
    pub id: WindowId,
    pub asset: Asset,
    /// Unique market slug from the catalog.
    pub slug: String,
    /// Catalog condition id.
    pub condition_id: String,
    /// Outcome token id for UP.
    pub up_token_id: String,
    /// Outcome token id for DOWN.
    pub down_token_id: String,
    /// Window open (Unix seconds, UTC).
    pub start_ts: i64,
    /// Window close / resolution time (Unix seconds, UTC).
    pub end_ts: i64,
    /// Resolved outcome; `None` until resolution, then fixed.
    pub outcome: Option<Direction>,
}

impl MarketWindow {
    /// Validate the window shape (`end_ts > start_ts`, non-empty slug).
    pub fn validate(&self) -> crate::Result<()> {
        if self.end_ts <= self.start_ts {
            return Err(CoreError::InvalidWindow(format!(
                "window {} has end_ts {} <= start_ts {}",
                self.slug, self.end_ts, self.start_ts
            )));
        }
        if self.slug.is_empty() {
            return Err(CoreError::InvalidWindow("empty slug".to_string()));
        }
        Ok(())
    }

    /// Outcome token id for the given direction.
    pub fn token_for(&self, direction: Direction) -> &str {
        match direction {
            Direction::Up => &self.up_token_id,
            Direction::Down => &self.down_token_id,
        }
    }

    /// Whether the window is past its close time at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.end_ts
    }
}

/// Output of the TA oracle for one evaluation.
///
/// `breakdown` is opaque to the orchestrator; only `quality` is ever
/// compared against the acceptance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaSignal {
    pub direction: Direction,
    /// Detection time (Unix seconds, UTC), within `[start_ts, now]`.
    pub signal_ts: i64,
    /// Non-negative quality score.
    pub quality: f64,
    /// Opaque quality breakdown, persisted verbatim.
    pub breakdown: serde_json::Value,
    /// Open time of the reference bar the oracle anchored on.
    pub anchor_bar_ts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn window(start_ts: i64, end_ts: i64) -> MarketWindow {
        MarketWindow {
            id: 1,
            asset: Asset::from("BTC"),
            slug: "btc-up-or-down-1000000".to_string(),
            condition_id: "0xc0ffee".to_string(),
            up_token_id: "tok-up".to_string(),
            down_token_id: "tok-down".to_string(),
            start_ts,
            end_ts,
            outcome: None,
        }
    }

    #[test]
    fn test_direction_round_trip() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("DOWN".parse::<Direction>().unwrap(), Direction::Down);
        assert_eq!(Direction::Up.as_str(), "UP");
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_direction_flipped() {
        assert_eq!(Direction::Up.flipped(), Direction::Down);
        assert_eq!(Direction::Down.flipped(), Direction::Up);
    }

    #[test]
    fn test_window_validate() {
        assert!(window(1_000_000, 1_003_600).validate().is_ok());
        assert!(window(1_003_600, 1_000_000).validate().is_err());
        assert!(window(1_000_000, 1_000_000).validate().is_err());
    }

    #[test]
    fn test_window_token_for() {
        let w = window(1_000_000, 1_003_600);
        assert_eq!(w.token_for(Direction::Up), "tok-up");
        assert_eq!(w.token_for(Direction::Down), "tok-down");
    }

    #[test]
    fn test_window_expiry() {
        let w = window(1_000_000, 1_003_600);
        assert!(!w.is_expired_at(1_003_599));
        assert!(w.is_expired_at(1_003_600));
        assert!(w.is_expired_at(1_003_601));
    }

    #[test]
    fn test_candle_is_bullish() {
        let c = Candle {
            ts: 1_000_000,
            open: dec!(0.50),
            high: dec!(0.56),
            low: dec!(0.49),
            close: dec!(0.55),
            volume: dec!(10),
        };
        assert!(c.is_bullish());
    }

    #[test]
    fn test_interval_names() {
        assert_eq!(CandleInterval::OneMinute.as_str(), "1m");
        assert_eq!(CandleInterval::FiveMinutes.as_str(), "5m");
        assert_eq!(CandleInterval::OneMinute.seconds(), 60);
        assert_eq!(CandleInterval::FiveMinutes.seconds(), 300);
    }
}
