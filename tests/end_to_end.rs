//! Integration tests covering literal end-to-end scenarios that span
//! multiple modules: signal computation -> decision synthesis -> risk gate
//! -> ledger execution, and the cognitive store's history round-trip.

use chrono::Utc;
use marketmind::application::{decision_synth, ledger, risk_gate, signals};
use marketmind::domain::candle::{Candle, Timeframe};
use marketmind::domain::decision::Decision;
use marketmind::domain::mind::CognitiveState;
use marketmind::domain::portfolio::PortfolioSnapshot;
use marketmind::domain::signal::Action;
use marketmind::infrastructure::mind_store::MindStore;
use marketmind::infrastructure::persistence::mind_history_repository::MindHistoryRepository;
use serde_json::json;

fn candles_with_closes(values: &[f64]) -> Vec<Candle> {
    values
        .iter()
        .map(|&close| Candle {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::D1,
            open_time: Utc::now(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
        })
        .collect()
}

fn flat_portfolio() -> PortfolioSnapshot {
    PortfolioSnapshot {
        balance: 10_000.0,
        equity: 10_000.0,
        available: 10_000.0,
        exposure_pct: 0.0,
        daily_pnl_pct: 0.0,
        realized_pnl: 0.0,
        positions: vec![],
    }
}

#[test]
fn test_scenario_1_uptrend_buys_end_to_end() {
    let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 5.0).collect();
    let daily = candles_with_closes(&closes);
    let hourly = candles_with_closes(&[245.0]);
    let mind = CognitiveState(json!({"market_beliefs": {"regime": "bullish"}, "bias_awareness": []}));
    let strategy_signals = signals::compute_signals(&daily, "BTCUSDT", "1d");
    let portfolio = flat_portfolio();
    let recent_decisions: Vec<Decision> = vec![];

    let decision = decision_synth::synthesize(&decision_synth::DecisionContext {
        mind: &mind,
        daily_candles: &daily,
        hourly_candles: &hourly,
        signals: &strategy_signals,
        portfolio: &portfolio,
        recent_decisions: &recent_decisions,
        max_position_pct: 0.20,
        max_stop_loss_pct: 0.08,
        model_used: "deterministic-fallback",
        cognitive_filter_enabled: false,
    });
    assert_eq!(decision.action, Action::Buy);

    let risk_result = risk_gate::apply_risk_checks(&decision, &portfolio, &mind, 0.20, 0.60, 0.05, 0.08);
    assert!(risk_result.approved);
    assert!(risk_result.adjusted_decision.position_size_pct > 0.0 && risk_result.adjusted_decision.position_size_pct <= 20.0);
    assert!(risk_result.adjusted_decision.stop_loss < 245.0);

    let execution = ledger::execute_decision(&risk_result.adjusted_decision, &[], "BTCUSDT", 245.0, 10_000.0, 0.001, 0.0005);
    assert!(execution.executed_trade.is_some());
    assert_eq!(execution.executed_trade.unwrap().side, marketmind::domain::trade::TradeSide::Buy);
}

#[test]
fn test_scenario_2_downtrend_sells_flat_book_journals_without_trade() {
    let closes: Vec<f64> = (0..30).map(|i| 300.0 - i as f64 * 5.0).collect();
    let daily = candles_with_closes(&closes);
    let hourly = candles_with_closes(&[*closes.last().unwrap()]);
    let mind = CognitiveState::empty_skeleton();
    let strategy_signals = signals::compute_signals(&daily, "BTCUSDT", "1d");
    let portfolio = flat_portfolio();
    let recent_decisions: Vec<Decision> = vec![];

    let decision = decision_synth::synthesize(&decision_synth::DecisionContext {
        mind: &mind,
        daily_candles: &daily,
        hourly_candles: &hourly,
        signals: &strategy_signals,
        portfolio: &portfolio,
        recent_decisions: &recent_decisions,
        max_position_pct: 0.20,
        max_stop_loss_pct: 0.08,
        model_used: "deterministic-fallback",
        cognitive_filter_enabled: false,
    });
    assert_eq!(decision.action, Action::Sell);

    let execution = ledger::execute_decision(&decision, &[], "BTCUSDT", *closes.last().unwrap(), 10_000.0, 0.001, 0.0005);
    assert!(execution.executed_trade.is_none(), "selling with no position must not produce a trade");
}

#[test]
fn test_scenario_10_ledger_replay_matches_literal_pnl() {
    let trades = vec![
        marketmind::domain::trade::Trade {
            id: None,
            timestamp: Utc::now(),
            symbol: "BTCUSDT".to_string(),
            side: marketmind::domain::trade::TradeSide::Buy,
            quantity: 1.0,
            price: 3000.0,
            fee: 3000.0 * 0.001,
            slippage: 3000.0 * 0.0005,
            pnl: 0.0,
            notes: String::new(),
        },
        marketmind::domain::trade::Trade {
            id: None,
            timestamp: Utc::now(),
            symbol: "BTCUSDT".to_string(),
            side: marketmind::domain::trade::TradeSide::Sell,
            quantity: 1.0,
            price: 3100.0,
            fee: 3100.0 * 0.001,
            slippage: 3100.0 * 0.0005,
            pnl: 0.0,
            notes: String::new(),
        },
    ];

    let first = ledger::rebuild_account_state(&trades, 10_000.0);
    let second = ledger::rebuild_account_state(&trades, 10_000.0);
    assert_eq!(first, second);

    let fees = 3000.0 * 0.001 + 3100.0 * 0.001;
    let slippage = 3000.0 * 0.0005 + 3100.0 * 0.0005;
    let expected = 100.0 - fees - slippage;
    assert!((first.realized_pnl - expected).abs() < 1e-6);
}

#[tokio::test]
async fn test_scenario_9_cognitive_history_round_trip() {
    let pool = sqlx::sqlite::SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        r#"
        CREATE TABLE mind_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            changed_at INTEGER NOT NULL,
            changed_by TEXT NOT NULL,
            previous_state TEXT NOT NULL,
            new_state TEXT NOT NULL,
            change_summary TEXT NOT NULL
        );
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let file_path = std::env::temp_dir().join(format!("marketmind_e2e_mind_{}.json", std::process::id()));
    let template_path = std::env::temp_dir().join(format!("marketmind_e2e_mind_template_{}.json", std::process::id()));
    let _ = tokio::fs::remove_file(&file_path).await;

    let store = MindStore::new(file_path.clone(), template_path, MindHistoryRepository::new(pool));
    let before = store.load().await.unwrap();
    store.save(before.clone(), "test_seed", "seed").await.unwrap();

    let patch = json!({"market_beliefs": {"regime": "ranging"}});
    let updated = store.update(&patch, "test_update", "regime update").await.unwrap();
    assert_eq!(updated.regime(), Some("ranging"));

    let reloaded = store.load().await.unwrap();
    assert_eq!(reloaded.regime(), Some("ranging"));

    let history = store.history(1).await.unwrap();
    let newest = history.first().unwrap();
    assert_eq!(newest.new_state["market_beliefs"]["regime"], "ranging");
    assert_eq!(newest.previous_state["market_beliefs"], before.0["market_beliefs"]);

    let _ = tokio::fs::remove_file(&file_path).await;
}
