use super::indicators::supertrend;
use crate::domain::candle::Candle;
use crate::domain::signal::{clip_strength, Action, Signal, SignalCategory};
use std::collections::HashMap;

/// Supertrend(ATR10, multiplier=3) direction-following strategy.
pub struct VolatilityStrategy;

pub const NAME: &str = "supertrend_daily";

impl VolatilityStrategy {
    pub fn compute(&self, candles: &[Candle], symbol: &str, timeframe: &str) -> Signal {
        if candles.len() < 30 {
            return Signal::hold(
                NAME,
                SignalCategory::TrendFollowing,
                symbol,
                timeframe,
                "insufficient_candles_for_supertrend",
            );
        }

        let (line, direction) = supertrend(candles, 10, 3.0);
        let latest_line = *line.last().unwrap();
        let latest_close = candles.last().unwrap().close;
        let latest_direction = *direction.last().unwrap();

        if latest_line <= 0.0 || latest_close <= 0.0 {
            return Signal::hold(
                NAME,
                SignalCategory::TrendFollowing,
                symbol,
                timeframe,
                "invalid_indicator_values",
            );
        }

        let action = if latest_direction == 1 {
            Action::Buy
        } else {
            Action::Sell
        };
        let distance_ratio = ((latest_close - latest_line) / latest_close).abs();
        let strength = clip_strength(distance_ratio * 25.0);

        let mut indicators = HashMap::new();
        indicators.insert("supertrend".to_string(), latest_line);
        indicators.insert("direction".to_string(), latest_direction as f64);
        indicators.insert("distance_ratio".to_string(), distance_ratio);

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
                "close={latest_close:.2}, supertrend={latest_line:.2}, direction={latest_direction}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Timeframe;
    use chrono::Utc;

    fn downtrend_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 300.0 - i as f64 * 5.0;
                Candle {
                    symbol: "BTCUSDT".to_string(),
                    timeframe: Timeframe::D1,
                    open_time: Utc::now(),
                    open: close + 1.0,
                    high: close + 2.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_sells_on_strong_downtrend() {
        let candles = downtrend_candles(35);
        let signal = VolatilityStrategy.compute(&candles, "BTCUSDT", "1d");
        assert_eq!(signal.action, Action::Sell);
    }
}
