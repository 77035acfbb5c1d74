use crate::domain::decision::Decision;
use crate::domain::mind::CognitiveState;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::signal::Action;
use regex::Regex;

/// Output of the risk gate: the possibly-adjusted decision plus the record
/// of what was changed or rejected and why.
#[derive(Debug, Clone)]
pub struct RiskCheckResult {
    pub approved: bool,
    pub adjusted_decision: Decision,
    pub violations: Vec<String>,
    pub adjustments: Vec<String>,
}

fn bound(value: f64, low: f64, high: f64) -> f64 {
    value.max(low).min(high)
}

/// Extracts a dynamic position-size cap percentage from a bias-awareness
/// mitigation string, e.g. "连续盈利3次后仓位上限自动降低到10%". The regex is
/// intentionally narrow: it only fires when the text mentions both
/// position-cap tokens ("仓位" and "上限") alongside a `%`-bearing number; no
/// match means no override.
fn extract_dynamic_position_cap(mind: &CognitiveState) -> Option<f64> {
    let percent_re = Regex::new(r"(\d+(?:\.\d+)?)\s*%").ok()?;
    for item in mind.bias_awareness() {
        let mitigation = item.get("mitigation").and_then(|v| v.as_str()).unwrap_or("");
        if !mitigation.contains("仓位") || !mitigation.contains("上限") {
            continue;
        }
        if let Some(caps) = percent_re.captures(mitigation) {
            if let Ok(value) = caps[1].parse::<f64>() {
                return Some(value);
            }
        }
    }
    None
}

/// Pure function implementing the ordered risk rules of §4.6. Later rules
/// see adjustments made by earlier rules.
pub fn apply_risk_checks(
    decision: &Decision,
    portfolio: &PortfolioSnapshot,
    mind: &CognitiveState,
    max_position_pct: f64,
    max_exposure_pct: f64,
    max_daily_loss_pct: f64,
    max_stop_loss_pct: f64,
) -> RiskCheckResult {
    let mut adjusted = decision.clone();
    let mut violations = Vec::new();
    let mut adjustments = Vec::new();

    if !matches!(adjusted.action, Action::Buy | Action::Sell | Action::Hold) {
        violations.push("Invalid decision action".to_string());
        return RiskCheckResult {
            approved: false,
            adjusted_decision: adjusted,
            violations,
            adjustments,
        };
    }

    let mut max_position_pct_100 = max_position_pct * 100.0;
    if let Some(dynamic_cap) = extract_dynamic_position_cap(mind) {
        max_position_pct_100 = max_position_pct_100.min(dynamic_cap);
    }

    let bounded = bound(adjusted.position_size_pct, 0.0, max_position_pct_100);
    if (bounded - adjusted.position_size_pct).abs() > f64::EPSILON {
        adjusted.position_size_pct = (bounded * 100.0).round() / 100.0;
        adjustments.push(format!(
            "position_size_pct adjusted to max single position cap: {bounded:.2}%"
        ));
    }

    if adjusted.action == Action::Buy {
        let projected_exposure = portfolio.exposure_pct + adjusted.position_size_pct;
        let max_exposure_pct_100 = max_exposure_pct * 100.0;
        if projected_exposure > max_exposure_pct_100 {
            let allowed = (max_exposure_pct_100 - portfolio.exposure_pct).max(0.0);
            adjusted.position_size_pct = (allowed * 100.0).round() / 100.0;
            adjustments.push(format!(
                "position_size_pct adjusted to exposure cap allowance: {allowed:.2}%"
            ));
        }

        if adjusted.entry_price <= 0.0 || adjusted.stop_loss <= 0.0 {
            violations.push("Stop-loss is required for buy decisions.".to_string());
        } else if adjusted.stop_loss >= adjusted.entry_price {
            violations.push("Stop-loss must be lower than entry price for long positions.".to_string());
        } else {
            let stop_loss_pct = (adjusted.entry_price - adjusted.stop_loss) / adjusted.entry_price;
            if stop_loss_pct > max_stop_loss_pct {
                let adjusted_stop = adjusted.entry_price * (1.0 - max_stop_loss_pct);
                adjusted.stop_loss = (adjusted_stop * 100.0).round() / 100.0;
                adjustments.push(format!(
                    "stop_loss adjusted to max distance cap: {:.2}%",
                    max_stop_loss_pct * 100.0
                ));
            }
        }
    }

    if portfolio.daily_pnl_pct <= -max_daily_loss_pct * 100.0 {
        violations.push("Max daily loss reached; new positions are blocked.".to_string());
    }

    let approved = violations.is_empty() && (adjusted.action != Action::Buy || adjusted.position_size_pct > 0.0);

    RiskCheckResult {
        approved,
        adjusted_decision: adjusted,
        violations,
        adjustments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn decision(action: Action, position_size_pct: f64, entry: f64, stop: f64) -> Decision {
        Decision {
            id: None,
            timestamp: Utc::now(),
            action,
            position_size_pct,
            entry_price: entry,
            stop_loss: stop,
            take_profit: entry * 1.1,
            confidence: 0.6,
            reasoning: json!({}),
            model_used: "deterministic-fallback".to_string(),
            input_hash: "h".to_string(),
        }
    }

    fn portfolio(exposure_pct: f64, daily_pnl_pct: f64) -> PortfolioSnapshot {
        PortfolioSnapshot {
            balance: 10_000.0,
            equity: 10_000.0,
            available: 10_000.0,
            exposure_pct,
            daily_pnl_pct,
            realized_pnl: 0.0,
            positions: vec![],
        }
    }

    #[test]
    fn test_exposure_cap_clamps_size() {
        let d = decision(Action::Buy, 20.0, 245.0, 230.0);
        let mind = CognitiveState::empty_skeleton();
        let result = apply_risk_checks(&d, &portfolio(55.0, 0.0), &mind, 0.20, 0.60, 0.05, 0.08);
        assert!(result.adjusted_decision.position_size_pct <= 5.01);
        assert!(!result.adjustments.is_empty());
    }

    #[test]
    fn test_dynamic_mind_cap_overrides() {
        let d = decision(Action::Buy, 15.0, 245.0, 230.0);
        let mind = CognitiveState(json!({
            "bias_awareness": [{"bias": "过度自信", "mitigation": "连续盈利3次后仓位上限自动降低到10%"}]
        }));
        let result = apply_risk_checks(&d, &portfolio(0.0, 0.0), &mind, 0.20, 0.60, 0.05, 0.08);
        assert!(result.adjusted_decision.position_size_pct <= 10.0);
    }

    #[test]
    fn test_daily_loss_cutoff_blocks() {
        let d = decision(Action::Buy, 10.0, 245.0, 230.0);
        let mind = CognitiveState::empty_skeleton();
        let result = apply_risk_checks(&d, &portfolio(0.0, -5.0), &mind, 0.20, 0.60, 0.05, 0.08);
        assert!(!result.approved);
        assert!(result.violations.iter().any(|v| v.contains("daily loss")));
    }

    #[test]
    fn test_stop_too_wide_adjusted() {
        let d = decision(Action::Buy, 10.0, 3000.0, 2500.0);
        let mind = CognitiveState::empty_skeleton();
        let result = apply_risk_checks(&d, &portfolio(0.0, 0.0), &mind, 0.20, 0.60, 0.05, 0.08);
        assert_eq!(result.adjusted_decision.stop_loss, 2760.00);
        assert!(result.approved);
    }

    #[test]
    fn test_stop_above_entry_rejected() {
        let d = decision(Action::Buy, 10.0, 3000.0, 3100.0);
        let mind = CognitiveState::empty_skeleton();
        let result = apply_risk_checks(&d, &portfolio(0.0, 0.0), &mind, 0.20, 0.60, 0.05, 0.08);
        assert!(!result.approved);
        assert!(result.violations.iter().any(|v| v.contains("Stop-loss")));
    }
}
