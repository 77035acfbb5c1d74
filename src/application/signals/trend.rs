use super::indicators::{adx, ema};
use crate::domain::candle::Candle;
use crate::domain::signal::{clip_strength, Action, Signal, SignalCategory};
use std::collections::HashMap;

/// EMA20/EMA50 cross direction gated by ADX14 trend strength.
pub struct TrendStrategy;

pub const NAME: &str = "ema_adx_daily";

impl TrendStrategy {
    pub fn compute(&self, candles: &[Candle], symbol: &str, timeframe: &str) -> Signal {
        if candles.len() < 60 {
            return Signal::hold(
                NAME,
                SignalCategory::TrendFollowing,
                symbol,
                timeframe,
                "insufficient_candles_for_ema_adx",
            );
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let ema_fast = ema(&closes, 20);
        let ema_slow = ema(&closes, 50);
        let adx_values = adx(candles, 14);

        let fast = ema_fast.last().copied().flatten().unwrap_or(0.0);
        let slow = ema_slow.last().copied().flatten().unwrap_or(0.0);
        let adx_latest = adx_values.last().copied().flatten().unwrap_or(0.0);

        if fast <= 0.0 || slow <= 0.0 {
            return Signal::hold(
                NAME,
                SignalCategory::TrendFollowing,
                symbol,
                timeframe,
                "invalid_indicator_values",
            );
        }

        let gap = (fast - slow) / slow;
        let action = if adx_latest >= 25.0 && gap > 0.0 {
            Action::Buy
        } else if adx_latest >= 25.0 && gap < 0.0 {
            Action::Sell
        } else {
            Action::Hold
        };
        let strength = clip_strength(gap.abs() * 14.0 + (adx_latest - 20.0).max(0.0) / 40.0);

        let mut indicators = HashMap::new();
        indicators.insert("ema_fast".to_string(), fast);
        indicators.insert("ema_slow".to_string(), slow);
        indicators.insert("adx".to_string(), adx_latest);
        indicators.insert("trend_gap".to_string(), gap);

        Signal {
            strategy_name: NAME.to_string(),
            category: SignalCategory::TrendFollowing,
            timeframe: timeframe.to_string(),
            symbol: symbol.to_string(),
            timestamp: Some(candles.last().unwrap().open_time),
            action,
            strength,
            indicators,
            reasoning: format!(
                "ema_fast={fast:.2}, ema_slow={slow:.2}, adx={adx_latest:.2}, gap={gap:.4}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Timeframe;
    use chrono::Utc;

    fn uptrend_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64 * 2.0;
                Candle {
                    symbol: "BTCUSDT".to_string(),
                    timeframe: Timeframe::D1,
                    open_time: Utc::now(),
                    open: close - 1.0,
                    high: close + 1.0,
                    low: close - 2.0,
                    close,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_holds_with_insufficient_history() {
        let candles = uptrend_candles(10);
        let signal = TrendStrategy.compute(&candles, "BTCUSDT", "1d");
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.strength, 0.0);
    }

    #[test]
    fn test_buys_on_strong_uptrend() {
        let candles = uptrend_candles(70);
        let signal = TrendStrategy.compute(&candles, "BTCUSDT", "1d");
        assert_eq!(signal.action, Action::Buy);
        assert!(signal.strength > 0.0);
    }
}
