use super::indicators::donchian_prev;
use crate::domain::candle::Candle;
use crate::domain::signal::{clip_strength, Action, Signal, SignalCategory};
use std::collections::HashMap;

/// Donchian(20) breakout strategy: compares the latest close to the
/// previous-bar's 20-bar high/low channel.
pub struct BreakoutStrategy;

pub const NAME: &str = "donchian_breakout_daily";

impl BreakoutStrategy {
    pub fn compute(&self, candles: &[Candle], symbol: &str, timeframe: &str) -> Signal {
        if candles.len() < 25 {
            return Signal::hold(
                NAME,
                SignalCategory::Breakout,
                symbol,
                timeframe,
                "insufficient_candles_for_donchian",
            );
        }

        let (upper_prev, lower_prev) = donchian_prev(candles, 20);
        let upper = upper_prev.last().copied().flatten().unwrap_or(0.0);
        let lower = lower_prev.last().copied().flatten().unwrap_or(0.0);
        let latest_close = candles.last().unwrap().close;

        if upper <= 0.0 || lower <= 0.0 || latest_close <= 0.0 {
            return Signal::hold(
                NAME,
                SignalCategory::Breakout,
                symbol,
                timeframe,
                "invalid_indicator_values",
            );
        }

        let (action, breakout_pct) = if latest_close > upper {
            (Action::Buy, (latest_close - upper) / latest_close)
        } else if latest_close < lower {
            (Action::Sell, (lower - latest_close) / latest_close)
        } else {
            (Action::Hold, 0.0)
        };
        let strength = clip_strength(breakout_pct * 35.0);

        let mut indicators = HashMap::new();
        indicators.insert("donchian_upper_prev".to_string(), upper);
        indicators.insert("donchian_lower_prev".to_string(), lower);
        indicators.insert("breakout_pct".to_string(), breakout_pct);

        Signal {
            strategy_name: NAME.to_string(),
            category: SignalCategory::Breakout,
            timeframe: timeframe.to_string(),
            symbol: symbol.to_string(),
            timestamp: Some(candles.last().unwrap().open_time),
            action,
            strength,
            indicators,
            reasoning: format!(
                "close={latest_close:.2}, upper_prev={upper:.2}, lower_prev={lower:.2}, breakout={breakout_pct:.4}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Timeframe;
    use chrono::Utc;

    fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
        (0..n)
            .map(|_| Candle {
                symbol: "BTCUSDT".to_string(),
                timeframe: Timeframe::D1,
                open_time: Utc::now(),
                open: price,
                high: price + 0.5,
                low: price - 0.5,
                close: price,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_holds_inside_channel() {
        let candles = flat_candles(30, 100.0);
        let signal = BreakoutStrategy.compute(&candles, "BTCUSDT", "1d");
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.strength, 0.0);
    }

    #[test]
    fn test_buys_above_prior_channel_high() {
        let mut candles = flat_candles(30, 100.0);
        candles.last_mut().unwrap().close = 110.0;
        candles.last_mut().unwrap().high = 110.5;
        let signal = BreakoutStrategy.compute(&candles, "BTCUSDT", "1d");
        assert_eq!(signal.action, Action::Buy);
    }
}
