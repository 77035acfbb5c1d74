//! Orchestrator (C8): the scheduled analysis cycle that ties market data,
//! cognition, signals, decisioning, risk, and the ledger together.

use crate::application::{decision_synth, ledger, risk_gate, signals};
use crate::config::Config;
use crate::domain::candle::Timeframe;
use crate::domain::decision::Decision;
use crate::domain::errors::StorageError;
use crate::domain::trade::Trade;
use crate::infrastructure::market_data::MarketDataClient;
use crate::infrastructure::mind_store::MindStore;
use crate::infrastructure::persistence::candle_repository::CandleRepository;
use crate::infrastructure::persistence::decision_repository::DecisionRepository;
use crate::infrastructure::persistence::trade_repository::TradeRepository;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Per-cycle incremental sync depth, distinct from the one-time backfill
/// window: fetched every cycle to pick up the latest few bars.
const SYNC_LIMITS: [(Timeframe, u32); 3] = [(Timeframe::H1, 200), (Timeframe::H4, 120), (Timeframe::D1, 90)];

/// Consecutive scheduler failures past which the scheduler is considered
/// unavailable rather than merely running: it is ticking but not producing
/// decisions.
const UNAVAILABLE_FAILURE_THRESHOLD: u32 = 5;

/// Mutable scheduler/cycle bookkeeping, held explicitly rather than as
/// process globals so multiple orchestrators (e.g. in tests) don't collide.
#[derive(Default)]
pub struct OrchestratorRuntime {
    pub last_cycle_at: Mutex<Option<DateTime<Utc>>>,
    pub consecutive_failures: AtomicU32,
    scheduler_handle: Mutex<Option<JoinHandle<()>>>,
    /// Per-timeframe sync failure reasons from the most recent cycle's
    /// gather phase, keyed by timeframe string. Cleared on a clean sync.
    last_sync_errors: Mutex<HashMap<String, String>>,
}

impl OrchestratorRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record_sync_errors(&self, errors: HashMap<String, String>) {
        *self.last_sync_errors.lock().await = errors;
    }

    pub async fn status(&self, scheduler_enabled: bool, interval_hours: u32) -> SchedulerStatus {
        let running = self.scheduler_handle.lock().await.is_some();
        let consecutive_failures = self.consecutive_failures.load(Ordering::SeqCst);
        let status = if !scheduler_enabled {
            "disabled"
        } else if !running {
            "stopped"
        } else if consecutive_failures >= UNAVAILABLE_FAILURE_THRESHOLD {
            "unavailable"
        } else {
            "running"
        };
        SchedulerStatus {
            status,
            last_cycle_at: *self.last_cycle_at.lock().await,
            consecutive_failures,
            interval_hours,
            sync_status: SyncStatus {
                errors: self.last_sync_errors.lock().await.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncStatus {
    /// Timeframe -> failure reason for the most recent cycle's gather phase.
    /// Empty when the last sync fetched every timeframe cleanly.
    pub errors: HashMap<String, String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulerStatus {
    pub status: &'static str,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub interval_hours: u32,
    pub sync_status: SyncStatus,
}

pub struct Orchestrator {
    pub config: Config,
    pub market_data: MarketDataClient,
    pub candles: CandleRepository,
    pub decisions: DecisionRepository,
    pub trades: TradeRepository,
    pub mind: MindStore,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("no usable market price for {0}; cycle skipped")]
    NoPrice(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Orchestrator {
    /// Fetches missing history (first run) then the latest bars for every
    /// tracked timeframe. Per-timeframe failures are logged and skipped
    /// rather than aborting the whole sync; each one is also returned keyed
    /// by timeframe so the caller can surface it as `sync_status.errors`.
    async fn sync_latest_klines(&self, symbol: &str) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if let Err(err) = self.candles.maybe_backfill_initial_klines(&self.market_data, symbol).await {
            warn!(%err, symbol, "initial backfill failed");
            errors.insert("backfill".to_string(), err.to_string());
        }

        for (timeframe, limit) in SYNC_LIMITS {
            match self.market_data.fetch_klines(symbol, timeframe, limit).await {
                Ok(candles) => {
                    if let Err(err) = self.candles.upsert_klines(&candles).await {
                        warn!(%err, symbol, %timeframe, "failed to store synced candles");
                        errors.insert(timeframe.to_string(), err.to_string());
                    }
                }
                Err(err) => {
                    warn!(%err, symbol, %timeframe, "kline sync failed for timeframe");
                    errors.insert(timeframe.to_string(), err.to_string());
                }
            }
        }
        errors
    }

    /// Runs one full analysis cycle: sync, gather, synthesize, risk-check,
    /// execute, persist. Returns the decision that was recorded, or an error
    /// if the cycle could not proceed (e.g. no price available yet).
    pub async fn run_cycle(&self, symbol: &str, runtime: &OrchestratorRuntime) -> Result<Decision, CycleError> {
        let sync_errors = self.sync_latest_klines(symbol).await;
        runtime.record_sync_errors(sync_errors).await;

        let daily = self.candles.get_recent_klines(symbol, Timeframe::D1, 120).await?;
        let hourly = self.candles.get_recent_klines(symbol, Timeframe::H1, 24).await?;

        let latest_price = self.candles.latest_price_from_db(symbol).await?.unwrap_or(0.0);
        if latest_price <= 0.0 {
            return Err(CycleError::NoPrice(symbol.to_string()));
        }

        let mind = self.mind.load().await?;
        let existing_trades = self.trades.all_for_symbol(symbol).await?;
        let account_state = ledger::rebuild_account_state(&existing_trades, self.config.initial_balance);
        let portfolio = ledger::portfolio_snapshot(&account_state, symbol, latest_price, self.config.initial_balance);
        let recent_decisions = self.decisions.recent(5).await?;

        let strategy_signals = signals::compute_signals(&daily, symbol, "1d");

        let ctx = decision_synth::DecisionContext {
            mind: &mind,
            daily_candles: &daily,
            hourly_candles: &hourly,
            signals: &strategy_signals,
            portfolio: &portfolio,
            recent_decisions: &recent_decisions,
            max_position_pct: self.config.risk.max_position_pct,
            max_stop_loss_pct: self.config.risk.max_stop_loss_pct,
            model_used: &self.config.ai_model,
            cognitive_filter_enabled: self.config.cognitive_filter_enabled,
        };
        let raw_decision = decision_synth::synthesize(&ctx);

        let risk_result = risk_gate::apply_risk_checks(
            &raw_decision,
            &portfolio,
            &mind,
            self.config.risk.max_position_pct,
            self.config.risk.max_exposure_pct,
            self.config.risk.max_daily_loss_pct,
            self.config.risk.max_stop_loss_pct,
        );

        let mut final_decision = risk_result.adjusted_decision;
        if !risk_result.approved {
            final_decision.action = crate::domain::signal::Action::Hold;
            final_decision.position_size_pct = 0.0;
        }
        final_decision.reasoning["risk_check"] = serde_json::json!({
            "approved": risk_result.approved,
            "violations": risk_result.violations,
            "adjustments": risk_result.adjustments,
        });

        if risk_result.approved {
            let execution = ledger::execute_decision(
                &final_decision,
                &existing_trades,
                symbol,
                latest_price,
                self.config.initial_balance,
                self.config.trading_fee_pct,
                self.config.slippage_pct,
            );
            if let Some(trade) = execution.executed_trade {
                self.persist_trade(&trade).await?;
            }
        }

        let id = self.decisions.insert(&final_decision).await?;
        final_decision.id = Some(id);

        Ok(final_decision)
    }

    async fn persist_trade(&self, trade: &Trade) -> Result<(), StorageError> {
        self.trades.insert(trade).await.map(|_| ())
    }

    /// Runs `run_cycle` and updates the runtime's failure/timestamp state.
    /// Logs failures rather than propagating them so a scheduler tick or an
    /// API-triggered cycle never panics the caller; returns the decision
    /// when the cycle completed.
    pub async fn run_cycle_tracked(&self, runtime: &OrchestratorRuntime) -> Option<Decision> {
        let result = self.run_cycle(&self.config.trading_pair, runtime).await;
        *runtime.last_cycle_at.lock().await = Some(Utc::now());
        match result {
            Ok(decision) => {
                info!(action = %decision.action, "analysis cycle completed");
                runtime.consecutive_failures.store(0, Ordering::SeqCst);
                Some(decision)
            }
            Err(err) => {
                error!(%err, "analysis cycle failed");
                runtime.consecutive_failures.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }

    /// Starts the periodic background scheduler at
    /// `config.analysis_interval_hours`. A no-op if already running.
    pub async fn start_scheduler(self: &Arc<Self>, runtime: &Arc<OrchestratorRuntime>) {
        let mut handle_slot = runtime.scheduler_handle.lock().await;
        if handle_slot.is_some() {
            return;
        }

        let interval_hours = self.config.analysis_interval_hours.max(1);
        let orchestrator = Arc::clone(self);
        let runtime_clone = Arc::clone(runtime);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_hours as u64 * 3600));
            loop {
                interval.tick().await;
                orchestrator.run_cycle_tracked(&runtime_clone).await;
            }
        });
        *handle_slot = Some(handle);
        info!(interval_hours, "scheduler started");
    }

    pub async fn stop_scheduler(&self, runtime: &OrchestratorRuntime) {
        if let Some(handle) = runtime.scheduler_handle.lock().await.take() {
            handle.abort();
            info!("scheduler stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_limits_distinct_from_backfill_limits() {
        let d1 = SYNC_LIMITS.iter().find(|(tf, _)| *tf == Timeframe::D1).unwrap();
        assert_eq!(d1.1, 90);
        let h1 = SYNC_LIMITS.iter().find(|(tf, _)| *tf == Timeframe::H1).unwrap();
        assert_eq!(h1.1, 200);
    }
}
