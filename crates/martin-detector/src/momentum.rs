//! Reference momentum oracle.
//!
//! A deterministic EMA-cross evaluator over 1-minute closes, confirmed
//! by the direction of the latest 5-minute bar. It exists so paper mode
//! and the integration tests can run end-to-end; production deployments
//! plug in their own `TaOracle`.

use crate::error::{DetectorError, DetectorResult};
use crate::oracle::TaOracle;
use martin_core::{Candle, Direction, MarketWindow, TaSignal};
use martin_feed::TaContext;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Momentum oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// Fast EMA period in bars.
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    /// Slow EMA period in bars.
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
    /// Minimum 1-minute bars required before evaluating.
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,
    /// Multiplier applied to the EMA gap (in basis points of the slow
    /// EMA) to produce the quality score.
    #[serde(default = "default_quality_scale")]
    pub quality_scale: f64,
}

fn default_fast_period() -> usize {
    9
}

fn default_slow_period() -> usize {
    21
}

fn default_min_bars() -> usize {
    30
}

fn default_quality_scale() -> f64 {
    2.0
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            min_bars: default_min_bars(),
            quality_scale: default_quality_scale(),
        }
    }
}

impl MomentumConfig {
    pub fn validate(&self) -> DetectorResult<()> {
        if self.fast_period == 0 || self.slow_period == 0 {
            return Err(DetectorError::ConfigError(
                "EMA periods must be positive".to_string(),
            ));
        }
        if self.fast_period >= self.slow_period {
            return Err(DetectorError::ConfigError(format!(
                "fast period {} must be below slow period {}",
                self.fast_period, self.slow_period
            )));
        }
        if self.quality_scale <= 0.0 {
            return Err(DetectorError::ConfigError(
                "quality scale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deterministic EMA-cross momentum oracle.
pub struct MomentumOracle {
    config: MomentumConfig,
}

impl MomentumOracle {
    pub fn new(config: MomentumConfig) -> DetectorResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Exponential moving average over closes, last value only.
    fn ema(candles: &[Candle], period: usize) -> Option<Decimal> {
        if candles.len() < period {
            return None;
        }
        let alpha = Decimal::from(2) / Decimal::from(period as u64 + 1);
        let mut ema = candles[0].close;
        for candle in &candles[1..] {
            ema = candle.close * alpha + ema * (Decimal::ONE - alpha);
        }
        Some(ema)
    }
}

impl TaOracle for MomentumOracle {
    fn evaluate(&self, window: &MarketWindow, now: i64, ctx: &TaContext) -> Option<TaSignal> {
        // Only bars closed by `now` may influence the verdict.
        let bars_1m: Vec<Candle> = ctx
            .candles_1m
            .iter()
            .filter(|c| c.ts + 60 <= now)
            .cloned()
            .collect();
        if bars_1m.len() < self.config.min_bars {
            debug!(
                asset = %window.asset,
                bars = bars_1m.len(),
                min_bars = self.config.min_bars,
                "Momentum oracle warming up"
            );
            return None;
        }

        let fast = Self::ema(&bars_1m, self.config.fast_period)?;
        let slow = Self::ema(&bars_1m, self.config.slow_period)?;
        if slow.is_zero() || fast == slow {
            return None;
        }

        let direction = if fast > slow {
            Direction::Up
        } else {
            Direction::Down
        };

        // The latest closed 5m bar must agree with the cross.
        let anchor = ctx.candles_5m.iter().rev().find(|c| c.ts + 300 <= now)?;
        let anchor_agrees = match direction {
            Direction::Up => anchor.close >= anchor.open,
            Direction::Down => anchor.close <= anchor.open,
        };
        if !anchor_agrees {
            return None;
        }

        let gap_bps = ((fast - slow).abs() / slow * Decimal::from(10_000))
            .to_f64()
            .unwrap_or(0.0);
        let quality = gap_bps * self.config.quality_scale;

        let last_bar = bars_1m.last()?;
        let signal_ts = (last_bar.ts + 60).max(window.start_ts).min(now);

        debug!(
            asset = %window.asset,
            direction = %direction,
            quality,
            gap_bps,
            "Momentum signal"
        );

        Some(TaSignal {
            direction,
            signal_ts,
            quality,
            breakdown: serde_json::json!({
                "kind": "ema_cross",
                "fast": fast.to_string(),
                "slow": slow.to_string(),
                "gap_bps": gap_bps,
                "anchor_bullish": anchor.is_bullish(),
            }),
            anchor_bar_ts: anchor.ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use martin_core::Asset;
    use rust_decimal_macros::dec;

    fn window() -> MarketWindow {
        MarketWindow {
            id: 1,
            asset: Asset::from("BTC"),
            slug: "btc-up-or-down-1000000".to_string(),
            condition_id: "0xc0ffee".to_string(),
            up_token_id: "tok-up".to_string(),
            down_token_id: "tok-down".to_string(),
            start_ts: 1_000_000,
            end_ts: 1_003_600,
            outcome: None,
        }
    }

    fn flat_candle(ts: i64, close: Decimal) -> Candle {
        Candle {
            ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        }
    }

    /// 1m closes trending up into `now`, with an agreeing 5m bar.
    fn rising_context(now: i64) -> TaContext {
        let mut candles_1m = Vec::new();
        for i in 0..40i64 {
            let ts = now - (40 - i) * 60;
            let close = dec!(0.40) + Decimal::new(i * 5, 3); // +0.005 per bar
            candles_1m.push(flat_candle(ts, close));
        }
        let candles_5m = vec![Candle {
            ts: now - 600,
            open: dec!(0.45),
            high: dec!(0.60),
            low: dec!(0.45),
            close: dec!(0.58),
            volume: dec!(5),
        }];
        TaContext {
            candles_1m,
            candles_5m,
            fetched_at: now,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(MomentumConfig::default().validate().is_ok());
        let bad = MomentumConfig {
            fast_period: 21,
            slow_period: 9,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(MomentumOracle::new(bad).is_err());
    }

    #[test]
    fn test_uptrend_yields_up_signal() {
        let oracle = MomentumOracle::new(MomentumConfig::default()).unwrap();
        let now = 1_000_600;
        let signal = oracle.evaluate(&window(), now, &rising_context(now)).unwrap();

        assert_eq!(signal.direction, Direction::Up);
        assert!(signal.quality > 0.0);
        assert!(signal.signal_ts >= 1_000_000 && signal.signal_ts <= now);
        assert_eq!(signal.breakdown["kind"], "ema_cross");
    }

    #[test]
    fn test_warmup_returns_none() {
        let oracle = MomentumOracle::new(MomentumConfig::default()).unwrap();
        let now = 1_000_600;
        let mut ctx = rising_context(now);
        ctx.candles_1m.truncate(5);
        assert!(oracle.evaluate(&window(), now, &ctx).is_none());
    }

    #[test]
    fn test_disagreeing_anchor_suppresses_signal() {
        let oracle = MomentumOracle::new(MomentumConfig::default()).unwrap();
        let now = 1_000_600;
        let mut ctx = rising_context(now);
        // Bearish 5m bar against the up-cross.
        ctx.candles_5m = vec![Candle {
            ts: now - 600,
            open: dec!(0.60),
            high: dec!(0.60),
            low: dec!(0.40),
            close: dec!(0.42),
            volume: dec!(5),
        }];
        assert!(oracle.evaluate(&window(), now, &ctx).is_none());
    }

    #[test]
    fn test_deterministic() {
        let oracle = MomentumOracle::new(MomentumConfig::default()).unwrap();
        let now = 1_000_600;
        let ctx = rising_context(now);
        let a = oracle.evaluate(&window(), now, &ctx).unwrap();
        let b = oracle.evaluate(&window(), now, &ctx).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_future_bars_ignored() {
        let oracle = MomentumOracle::new(MomentumConfig::default()).unwrap();
        let now = 1_000_600;
        let mut ctx = rising_context(now);
        // A still-open bar past `now` must not change the verdict.
        let baseline = oracle.evaluate(&window(), now, &ctx).unwrap();
        ctx.candles_1m.push(flat_candle(now - 30, dec!(0.01)));
        let with_open_bar = oracle.evaluate(&window(), now, &ctx).unwrap();
        assert_eq!(baseline, with_open_bar);
    }
}
