use crate::domain::candle::Candle;
use crate::domain::mind::CognitiveState;
use crate::domain::signal::{Action, Signal, SignalCategory};
use serde::Serialize;
use std::collections::HashMap;

use super::breakout::BreakoutStrategy;
use super::trend::TrendStrategy;
use super::volatility::VolatilityStrategy;

/// Per-strategy weight used by the aggregator, keyed by strategy name.
pub fn default_strategy_weights() -> HashMap<&'static str, f64> {
    HashMap::from([
        (super::trend::NAME, 0.45),
        (super::volatility::NAME, 0.35),
        (super::breakout::NAME, 0.20),
    ])
}

/// Computes all three strategy signals for one candle window.
pub fn compute_signals(candles: &[Candle], symbol: &str, timeframe: &str) -> Vec<Signal> {
    vec![
        TrendStrategy.compute(candles, symbol, timeframe),
        VolatilityStrategy.compute(candles, symbol, timeframe),
        BreakoutStrategy.compute(candles, symbol, timeframe),
    ]
}

/// The aggregate view over a signal list.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    pub recommended_action: Action,
    pub composite_score: f64,
    pub confidence: f64,
    pub signal_count: usize,
    pub active_signal_count: usize,
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub hold_count: usize,
}

impl AggregateSummary {
    fn empty() -> Self {
        Self {
            recommended_action: Action::Hold,
            composite_score: 0.0,
            confidence: 0.45,
            signal_count: 0,
            active_signal_count: 0,
            bullish_count: 0,
            bearish_count: 0,
            hold_count: 0,
        }
    }
}

/// `composite = Σ weight_i · s_i · strength_i / Σ weight_i`; action thresholds
/// at ±0.20; confidence widens with |composite| and the count of active
/// (non-hold) signals, capped at 0.95 and floored at 0.45.
pub fn summarize(signals: &[Signal], weights: &HashMap<&str, f64>) -> AggregateSummary {
    if signals.is_empty() {
        return AggregateSummary::empty();
    }

    let mut weighted_score = 0.0;
    let mut total_weight = 0.0;
    let mut bullish = 0;
    let mut bearish = 0;
    let mut hold = 0;
    let mut active = 0;

    for signal in signals {
        match signal.action {
            Action::Buy => {
                bullish += 1;
                active += 1;
            }
            Action::Sell => {
                bearish += 1;
                active += 1;
            }
            Action::Hold => hold += 1,
        }
        let weight = *weights.get(signal.strategy_name.as_str()).unwrap_or(&1.0);
        weighted_score += weight * signal.action.signed_value() * signal.strength;
        total_weight += weight;
    }

    let composite_score = if total_weight > 0.0 {
        weighted_score / total_weight
    } else {
        0.0
    };
    let composite_score = (composite_score * 1_000_000.0).round() / 1_000_000.0;

    let recommended_action = if composite_score >= 0.20 {
        Action::Buy
    } else if composite_score <= -0.20 {
        Action::Sell
    } else {
        Action::Hold
    };

    let confidence =
        (0.45 + composite_score.abs() * 0.75 + (active as f64 - 1.0).max(0.0) * 0.05).min(0.95);

    AggregateSummary {
        recommended_action,
        composite_score,
        confidence: (confidence * 1000.0).round() / 1000.0,
        signal_count: signals.len(),
        active_signal_count: active,
        bullish_count: bullish,
        bearish_count: bearish,
        hold_count: hold,
    }
}

/// Optional cognitive-weight filter (§4.5). Scales each signal's strength by
/// `clip(exact_strategy_weight · category_weight · regime_multiplier, 0.15, 2.0)`
/// read off the cognitive state's `strategy_weights` map, then demotes any
/// signal whose scaled strength falls below 0.18 to hold.
pub fn apply_cognitive_filter(signals: Vec<Signal>, mind: &CognitiveState) -> Vec<Signal> {
    let regime = mind.regime().unwrap_or("").to_lowercase();
    let trending = regime.contains("trend") || regime.contains("bull") || regime.contains("bear");
    let ranging = regime.contains("rang") || regime.contains("flat");

    signals
        .into_iter()
        .map(|mut signal| {
            let exact_weight = mind
                .0
                .get("strategy_weights")
                .and_then(|w| w.get(&signal.strategy_name))
                .and_then(|v| v.as_f64())
                .unwrap_or(1.0);
            let category_weight = mind
                .0
                .get("strategy_weights")
                .and_then(|w| w.get(signal.category.to_string().as_str()))
                .and_then(|v| v.as_f64())
                .unwrap_or(1.0);

            let regime_multiplier = match signal.category {
                SignalCategory::TrendFollowing if trending => 1.15,
                SignalCategory::TrendFollowing if ranging => 0.85,
                SignalCategory::MeanReversion if ranging => 1.15,
                SignalCategory::MeanReversion if trending => 0.85,
                _ => 1.0,
            };

            let combined = (exact_weight * category_weight * regime_multiplier).clamp(0.15, 2.0);
            let scaled = (signal.strength * combined).clamp(0.0, 1.0);
            if scaled < 0.18 {
                signal.action = Action::Hold;
                signal.strength = 0.0;
            } else {
                signal.strength = scaled;
            }
            signal
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalCategory;
    use serde_json::json;

    fn signal(action: Action, strength: f64, name: &str) -> Signal {
        Signal {
            strategy_name: name.to_string(),
            category: SignalCategory::TrendFollowing,
            timeframe: "1d".to_string(),
            symbol: "BTCUSDT".to_string(),
            timestamp: None,
            action,
            strength,
            indicators: HashMap::new(),
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_summarize_empty_is_neutral() {
        let summary = summarize(&[], &default_strategy_weights());
        assert_eq!(summary.recommended_action, Action::Hold);
        assert_eq!(summary.confidence, 0.45);
    }

    #[test]
    fn test_summarize_unanimous_buy() {
        let signals = vec![
            signal(Action::Buy, 0.8, super::super::trend::NAME),
            signal(Action::Buy, 0.8, super::super::volatility::NAME),
            signal(Action::Buy, 0.8, super::super::breakout::NAME),
        ];
        let summary = summarize(&signals, &default_strategy_weights());
        assert_eq!(summary.recommended_action, Action::Buy);
        assert!(summary.confidence <= 0.95);
    }

    #[test]
    fn test_confidence_floor_and_ceiling() {
        let signals = vec![signal(Action::Hold, 0.0, super::super::trend::NAME)];
        let summary = summarize(&signals, &default_strategy_weights());
        assert!(summary.confidence >= 0.45 && summary.confidence <= 0.95);
    }

    #[test]
    fn test_cognitive_filter_demotes_weak_signal() {
        let mind = CognitiveState(json!({"market_beliefs": {"regime": "ranging"}, "strategy_weights": {}}));
        let signals = vec![signal(Action::Buy, 0.1, super::super::trend::NAME)];
        let filtered = apply_cognitive_filter(signals, &mind);
        assert_eq!(filtered[0].action, Action::Hold);
    }
}
