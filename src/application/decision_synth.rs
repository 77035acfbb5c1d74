use crate::application::signals::{self, AggregateSummary};
use crate::domain::candle::Candle;
use crate::domain::decision::Decision;
use crate::domain::mind::CognitiveState;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::signal::{Action, Signal};
use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Everything the synthesizer needs to produce one decision.
pub struct DecisionContext<'a> {
    pub mind: &'a CognitiveState,
    pub daily_candles: &'a [Candle],
    pub hourly_candles: &'a [Candle],
    pub signals: &'a [Signal],
    pub portfolio: &'a PortfolioSnapshot,
    pub recent_decisions: &'a [Decision],
    pub max_position_pct: f64,
    pub max_stop_loss_pct: f64,
    pub model_used: &'a str,
    pub cognitive_filter_enabled: bool,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).filter(|c| *c > 0.0).collect()
}

/// 7/21-period MA crossover, used when every strategy signal is a hold.
fn fallback_trend_decision(daily_closes: &[f64]) -> (Action, f64) {
    let short_ma = if daily_closes.len() >= 7 {
        mean(&daily_closes[daily_closes.len() - 7..])
    } else {
        mean(daily_closes)
    };
    let long_ma = if daily_closes.len() >= 21 {
        mean(&daily_closes[daily_closes.len() - 21..])
    } else {
        mean(daily_closes)
    };
    let score = if long_ma > 0.0 {
        (short_ma - long_ma) / long_ma
    } else {
        0.0
    };
    let action = if score > 0.01 {
        Action::Buy
    } else if score < -0.01 {
        Action::Sell
    } else {
        Action::Hold
    };
    (action, score)
}

fn infer_bias_check(mind: &CognitiveState) -> String {
    let items = mind.bias_awareness();
    match items.first() {
        None => "No bias-awareness entries configured; defaulting to conservative sizing.".to_string(),
        Some(first) => {
            let bias = first.get("bias").and_then(Value::as_str).unwrap_or("unknown bias");
            let mitigation = first
                .get("mitigation")
                .and_then(Value::as_str)
                .unwrap_or("apply dual-signal confirmation");
            format!("Checked bias: {bias}; mitigation: {mitigation}.")
        }
    }
}

fn infer_mind_alignment(mind: &CognitiveState, action: Action) -> String {
    let regime = mind.regime().unwrap_or("undefined");
    match action {
        Action::Buy => format!("Signal is bullish, consistent with the mind's regime read ({regime})."),
        Action::Sell => "Signal has weakened, consistent with the mind's risk-first principle.".to_string(),
        Action::Hold => "Trend is unclear, consistent with the mind's noise-reduction principle.".to_string(),
    }
}

/// Produces a Decision from the fused signal/cognitive/portfolio inputs.
pub fn synthesize(ctx: &DecisionContext) -> Decision {
    let daily_closes = closes(ctx.daily_candles);
    let hourly_closes = closes(ctx.hourly_candles);
    let latest_price = hourly_closes
        .last()
        .copied()
        .or_else(|| daily_closes.last().copied())
        .unwrap_or(0.0);

    let filtered_signals;
    let signals_for_summary: &[Signal] = if ctx.cognitive_filter_enabled {
        filtered_signals = signals::apply_cognitive_filter(ctx.signals.to_vec(), ctx.mind);
        &filtered_signals
    } else {
        ctx.signals
    };

    let weights = signals::default_strategy_weights();
    let summary: AggregateSummary = signals::summarize(signals_for_summary, &weights);

    let (mut action, mut composite_score, mut confidence) =
        (summary.recommended_action, summary.composite_score, summary.confidence);

    let (short_ma, long_ma);
    if action == Action::Hold && summary.active_signal_count == 0 && !daily_closes.is_empty() {
        let (fallback_action, score) = fallback_trend_decision(&daily_closes);
        action = fallback_action;
        composite_score = score;
        confidence = (score.abs() * 12.0 + 0.45).clamp(0.45, 0.9);
        short_ma = if daily_closes.len() >= 7 {
            mean(&daily_closes[daily_closes.len() - 7..])
        } else {
            mean(&daily_closes)
        };
        long_ma = if daily_closes.len() >= 21 {
            mean(&daily_closes[daily_closes.len() - 21..])
        } else {
            mean(&daily_closes)
        };
    } else {
        short_ma = if daily_closes.len() >= 7 {
            mean(&daily_closes[daily_closes.len() - 7..])
        } else {
            mean(&daily_closes)
        };
        long_ma = if daily_closes.len() >= 21 {
            mean(&daily_closes[daily_closes.len() - 21..])
        } else {
            mean(&daily_closes)
        };
    }

    let mut position_size_pct = ((ctx.max_position_pct * 100.0).min(confidence * 20.0) * 100.0).round() / 100.0;
    if action == Action::Hold {
        position_size_pct = 0.0;
    }

    let (stop_loss, take_profit) = if latest_price > 0.0 {
        (
            (latest_price * (1.0 - ctx.max_stop_loss_pct) * 100.0).round() / 100.0,
            (latest_price * (1.0 + 2.0 * ctx.max_stop_loss_pct) * 100.0).round() / 100.0,
        )
    } else {
        (0.0, 0.0)
    };

    let reasoning = json!({
        "market_regime": ctx.mind.regime().unwrap_or("unknown"),
        "mind_alignment": infer_mind_alignment(ctx.mind, action),
        "quant_signals_summary": format!(
            "score={:.4}, action={}, votes(buy/sell/hold)={}/{}/{}",
            composite_score, action, summary.bullish_count, summary.bearish_count, summary.hold_count
        ),
        "key_factors": [
            format!("quant_composite_score={:.4}", composite_score),
            format!("active_signal_count={}", summary.active_signal_count),
            format!("daily_short_ma={:.2}", short_ma),
            format!("daily_long_ma={:.2}", long_ma),
            format!("latest_price={:.2}", latest_price),
        ],
        "risk_considerations": ["enforce hard position-size cap", "enforce stop-loss distance cap"],
        "bias_check": infer_bias_check(ctx.mind),
        "final_logic": "Structured recommendation derived from the aggregated strategy library and risk parameters.",
    });

    let input_payload = json!({
        "mind": ctx.mind.0,
        "daily_candles": ctx.daily_candles,
        "hourly_candles": ctx.hourly_candles,
        "signals": ctx.signals,
        "portfolio": ctx.portfolio,
        "recent_decisions": ctx.recent_decisions,
    });
    let input_hash = hex::encode(Sha256::digest(input_payload.to_string().as_bytes()));

    Decision {
        id: None,
        timestamp: Utc::now(),
        action,
        position_size_pct,
        entry_price: (latest_price * 100.0).round() / 100.0,
        stop_loss,
        take_profit,
        confidence: (confidence * 1000.0).round() / 1000.0,
        reasoning,
        model_used: ctx.model_used.to_string(),
        input_hash,
    }
}
