use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candle timeframe. The system tracks exactly these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    H1,
    H4,
    D1,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::H1 => write!(f, "1h"),
            Timeframe::H4 => write!(f, "4h"),
            Timeframe::D1 => write!(f, "1d"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => anyhow::bail!("Invalid timeframe: {other}. Must be one of 1h, 4h, 1d"),
        }
    }
}

/// One OHLCV bar. Uniqueness key is (symbol, timeframe, open_time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// True iff the OHLCV invariants from the data model hold for this bar.
    pub fn is_valid(&self) -> bool {
        self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.open >= 0.0
            && self.high >= 0.0
            && self.low >= 0.0
            && self.close >= 0.0
            && self.volume >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::D1,
            open_time: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn test_timeframe_roundtrip() {
        for tf in [Timeframe::H1, Timeframe::H4, Timeframe::D1] {
            let parsed: Timeframe = tf.to_string().parse().unwrap();
            assert_eq!(parsed, tf);
        }
    }

    #[test]
    fn test_valid_candle() {
        assert!(candle(100.0, 110.0, 95.0, 105.0).is_valid());
    }

    #[test]
    fn test_invalid_candle_high_below_close() {
        assert!(!candle(100.0, 102.0, 95.0, 105.0).is_valid());
    }

    #[test]
    fn test_invalid_negative_volume() {
        let mut c = candle(100.0, 110.0, 95.0, 105.0);
        c.volume = -1.0;
        assert!(!c.is_valid());
    }
}
