//! Read/command HTTP surface (C9).

use crate::application::{ledger, signals};
use crate::domain::candle::{Candle, Timeframe};
use crate::domain::errors::InvalidCommand;
use crate::domain::mind::CognitiveState;
use crate::domain::trade::TradeSide;
use crate::interfaces::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/klines", get(get_klines))
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/signals", get(get_signals))
        .route("/api/decisions", get(get_decisions))
        .route("/api/decisions/{id}", get(get_decision_by_id))
        .route("/api/trades", get(get_trades))
        .route("/api/performance", get(get_performance))
        .route("/api/mind", get(get_mind).put(put_mind))
        .route("/api/mind/history", get(get_mind_history))
        .route("/api/system/status", get(get_system_status))
        .route("/api/system/health", get(get_system_health))
        .route("/api/system/trigger-analysis", post(trigger_analysis))
        .route("/api/system/pause", post(pause_system))
        .route("/api/system/resume", post(resume_system))
}

fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// A short flat synthetic series used when a symbol/timeframe has no stored
/// candles yet, so chart and signal consumers always get a well-formed
/// response instead of an empty one.
fn mock_fallback_candles(symbol: &str, timeframe: Timeframe, limit: u32) -> Vec<Candle> {
    let step = match timeframe {
        Timeframe::H1 => chrono::Duration::hours(1),
        Timeframe::H4 => chrono::Duration::hours(4),
        Timeframe::D1 => chrono::Duration::days(1),
    };
    let now = chrono::Utc::now();
    let base_price = 100.0;
    let count = limit.clamp(1, 500);
    (0..count)
        .map(|i| {
            let open_time = now - step * ((count - 1 - i) as i32);
            Candle {
                symbol: symbol.to_string(),
                timeframe,
                open_time,
                open: base_price,
                high: base_price,
                low: base_price,
                close: base_price,
                volume: 0.0,
            }
        })
        .collect()
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({"error": self.1}))).into_response()
    }
}

impl From<crate::domain::errors::StorageError> for ApiError {
    fn from(err: crate::domain::errors::StorageError) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<InvalidCommand> for ApiError {
    fn from(err: InvalidCommand) -> Self {
        ApiError(StatusCode::BAD_REQUEST, err.to_string())
    }
}

#[derive(Deserialize)]
struct KlinesQuery {
    symbol: Option<String>,
    timeframe: Option<String>,
    limit: Option<u32>,
    refresh: Option<bool>,
}

async fn get_klines(State(state): State<AppState>, Query(q): Query<KlinesQuery>) -> Result<Json<Value>, ApiError> {
    let symbol = q.symbol.unwrap_or_else(|| state.config.trading_pair.clone());
    let timeframe: Timeframe = q
        .timeframe
        .unwrap_or_else(|| "1d".to_string())
        .parse()
        .map_err(|e: anyhow::Error| InvalidCommand::BadRequest(e.to_string()))?;
    let limit = q.limit.unwrap_or(200);
    let refresh_requested = q.refresh.unwrap_or(false);

    let mut refresh = json!({"requested": refresh_requested});
    if refresh_requested {
        match state.orchestrator.market_data.fetch_klines(&symbol, timeframe, limit).await {
            Ok(fresh) => {
                let stored = fresh.len();
                state.orchestrator.candles.upsert_klines(&fresh).await?;
                refresh["stored"] = json!(stored);
            }
            Err(err) => {
                refresh["error"] = json!(err.to_string());
            }
        }
    }

    let mut items = state.orchestrator.candles.get_recent_klines(&symbol, timeframe, limit).await?;
    let source = if items.is_empty() {
        items = mock_fallback_candles(&symbol, timeframe, limit);
        "mock_fallback"
    } else {
        "database"
    };

    Ok(Json(json!({"items": items, "source": source, "refresh": refresh})))
}

async fn get_portfolio(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let symbol = &state.config.trading_pair;
    let trades = state.orchestrator.trades.all_for_symbol(symbol).await?;
    let mark_price = state.orchestrator.candles.latest_price_from_db(symbol).await?.unwrap_or(0.0);
    let account = ledger::rebuild_account_state(&trades, state.config.initial_balance);
    let snapshot = ledger::portfolio_snapshot(&account, symbol, mark_price, state.config.initial_balance);

    let mut payload = json!(snapshot);
    payload["symbol"] = json!(symbol);
    payload["mark_price"] = json!(round(mark_price, 2));
    Ok(Json(payload))
}

#[derive(Deserialize)]
struct SignalsQuery {
    symbol: Option<String>,
    timeframe: Option<String>,
    limit: Option<u32>,
}

async fn get_signals(State(state): State<AppState>, Query(q): Query<SignalsQuery>) -> Result<Json<Value>, ApiError> {
    let symbol = q.symbol.unwrap_or_else(|| state.config.trading_pair.clone());
    let timeframe: Timeframe = q
        .timeframe
        .unwrap_or_else(|| "1d".to_string())
        .parse()
        .map_err(|e: anyhow::Error| InvalidCommand::BadRequest(e.to_string()))?;
    let limit = q.limit.unwrap_or(90);

    let mut candles = state.orchestrator.candles.get_recent_klines(&symbol, timeframe, limit).await?;
    let source = if candles.is_empty() {
        candles = mock_fallback_candles(&symbol, timeframe, limit);
        "mock_fallback"
    } else {
        "database"
    };

    let items = signals::compute_signals(&candles, &symbol, &timeframe.to_string());
    let summary = signals::summarize(&items, &signals::default_strategy_weights());
    Ok(Json(json!({"items": items, "summary": summary, "source": source})))
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

async fn get_decisions(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> Result<Json<Value>, ApiError> {
    let decisions = state.orchestrator.decisions.recent(q.limit.unwrap_or(20)).await?;
    Ok(Json(json!(decisions)))
}

async fn get_decision_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    match state.orchestrator.decisions.by_id(id).await? {
        Some(decision) => Ok(Json(json!(decision))),
        None => Err(ApiError(StatusCode::NOT_FOUND, format!("no decision with id {id}"))),
    }
}

async fn get_trades(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> Result<Json<Value>, ApiError> {
    let trades = state.orchestrator.trades.recent(q.limit.unwrap_or(50)).await?;
    Ok(Json(json!(trades)))
}

async fn get_performance(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let symbol = &state.config.trading_pair;
    let trades = state.orchestrator.trades.all_for_symbol(symbol).await?;
    let initial_balance = state.config.initial_balance;

    let mut equity_curve = Vec::with_capacity(trades.len());
    let mut peak = initial_balance;
    let mut max_drawdown_pct: f64 = 0.0;
    let mut final_equity = initial_balance;

    for i in 0..trades.len() {
        let account = ledger::rebuild_account_state(&trades[..=i], initial_balance);
        let snapshot = ledger::portfolio_snapshot(&account, symbol, trades[i].price, initial_balance);
        peak = peak.max(snapshot.equity);
        if peak > 0.0 {
            max_drawdown_pct = max_drawdown_pct.max((peak - snapshot.equity) / peak * 100.0);
        }
        final_equity = snapshot.equity;
        equity_curve.push(json!({"timestamp": trades[i].timestamp, "equity": snapshot.equity}));
    }

    let closed: Vec<_> = trades.iter().filter(|t| t.side == TradeSide::Sell).collect();
    let total_trades = closed.len();
    let winning_trades = closed.iter().filter(|t| t.pnl > 0.0).count();
    let losing_trades = closed.iter().filter(|t| t.pnl < 0.0).count();
    let win_rate = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };
    let gross_profit: f64 = closed.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = closed.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl.abs()).sum();
    let profit_factor = if gross_loss > 0.0 {
        Some(gross_profit / gross_loss)
    } else if gross_profit > 0.0 {
        None // unbounded: no losing trades to divide by
    } else {
        Some(0.0)
    };
    let total_return_pct = if initial_balance > 0.0 {
        (final_equity - initial_balance) / initial_balance * 100.0
    } else {
        0.0
    };

    Ok(Json(json!({
        "equity_curve": equity_curve,
        "total_return_pct": round(total_return_pct, 2),
        "max_drawdown_pct": round(max_drawdown_pct, 2),
        "win_rate": round(win_rate, 2),
        "profit_factor": profit_factor.map(|v| round(v, 2)),
        "total_trades": total_trades,
        "winning_trades": winning_trades,
        "losing_trades": losing_trades,
    })))
}

async fn get_mind(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mind = state.orchestrator.mind.load().await?;
    Ok(Json(mind.0))
}

#[derive(Deserialize)]
struct MindUpdateBody {
    market_mind: Option<Value>,
    patch: Option<Value>,
}

async fn put_mind(State(state): State<AppState>, Json(body): Json<MindUpdateBody>) -> Result<Json<Value>, ApiError> {
    let updated = if let Some(market_mind) = body.market_mind {
        state
            .orchestrator
            .mind
            .save(CognitiveState(market_mind), "api_user", "replaced market_mind via API")
            .await?
    } else if let Some(patch) = body.patch {
        state.orchestrator.mind.update(&patch, "api_user", "patched via API").await?
    } else {
        return Err(InvalidCommand::BadRequest("body must include 'market_mind' or 'patch'".to_string()).into());
    };
    Ok(Json(updated.0))
}

async fn get_mind_history(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> Result<Json<Value>, ApiError> {
    let entries = state.orchestrator.mind.history(q.limit.unwrap_or(20)).await?;
    Ok(Json(json!(entries)))
}

async fn get_system_status(State(state): State<AppState>) -> Json<Value> {
    let status = state
        .runtime
        .status(state.config.scheduler_enabled, state.config.analysis_interval_hours)
        .await;
    Json(json!(status))
}

async fn get_system_health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn trigger_analysis(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.orchestrator.run_cycle_tracked(&state.runtime).await {
        Some(decision) => Ok(Json(json!(decision))),
        None => Err(ApiError(StatusCode::UNPROCESSABLE_ENTITY, "analysis cycle failed; see server logs".to_string())),
    }
}

async fn pause_system(State(state): State<AppState>) -> Json<Value> {
    state.orchestrator.stop_scheduler(&state.runtime).await;
    Json(json!({"scheduler_running": false}))
}

async fn resume_system(State(state): State<AppState>) -> Json<Value> {
    state.orchestrator.start_scheduler(&state.runtime).await;
    Json(json!({"scheduler_running": true}))
}
