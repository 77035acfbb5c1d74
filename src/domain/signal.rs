use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Action recommended by a strategy or the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
            Action::Hold => write!(f, "hold"),
        }
    }
}

impl Action {
    /// The signed vote used by the aggregator: buy=+1, sell=-1, hold=0.
    pub fn signed_value(self) -> f64 {
        match self {
            Action::Buy => 1.0,
            Action::Sell => -1.0,
            Action::Hold => 0.0,
        }
    }
}

/// The strategy family a signal belongs to. `TrendFollowing` covers both the
/// EMA/ADX trend strategy and the Supertrend volatility-channel strategy, as
/// in the reference catalog; `Breakout` covers Donchian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    TrendFollowing,
    Breakout,
    MeanReversion,
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalCategory::TrendFollowing => write!(f, "trend_following"),
            SignalCategory::Breakout => write!(f, "breakout"),
            SignalCategory::MeanReversion => write!(f, "mean_reversion"),
        }
    }
}

/// A pure, non-persisted output of a single strategy over one candle window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub strategy_name: String,
    pub category: SignalCategory,
    pub timeframe: String,
    pub symbol: String,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub action: Action,
    pub strength: f64,
    pub indicators: HashMap<String, f64>,
    pub reasoning: String,
}

impl Signal {
    pub fn hold(strategy_name: &str, category: SignalCategory, symbol: &str, timeframe: &str, reason: &str) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            category,
            timeframe: timeframe.to_string(),
            symbol: symbol.to_string(),
            timestamp: None,
            action: Action::Hold,
            strength: 0.0,
            indicators: HashMap::new(),
            reasoning: reason.to_string(),
        }
    }
}

/// Clamp `value` into `[0, 1]`, rounded to 4 decimal places (matches the
/// reference strength clipping used throughout the signal library).
pub fn clip_strength(value: f64) -> f64 {
    let clipped = value.clamp(0.0, 1.0);
    (clipped * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_strength_bounds() {
        assert_eq!(clip_strength(-1.0), 0.0);
        assert_eq!(clip_strength(2.0), 1.0);
        assert_eq!(clip_strength(0.12345), 0.1235);
    }

    #[test]
    fn test_action_signed_value() {
        assert_eq!(Action::Buy.signed_value(), 1.0);
        assert_eq!(Action::Sell.signed_value(), -1.0);
        assert_eq!(Action::Hold.signed_value(), 0.0);
    }
}
