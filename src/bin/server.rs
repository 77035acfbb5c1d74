//! MarketMind server: runs the scheduled analysis loop and serves the
//! read/command HTTP+WS API.

use anyhow::Result;
use marketmind::application::orchestrator::{Orchestrator, OrchestratorRuntime};
use marketmind::config::Config;
use marketmind::infrastructure::market_data::MarketDataClientBuilder;
use marketmind::infrastructure::mind_store::MindStore;
use marketmind::infrastructure::persistence::candle_repository::CandleRepository;
use marketmind::infrastructure::persistence::decision_repository::DecisionRepository;
use marketmind::infrastructure::persistence::mind_history_repository::MindHistoryRepository;
use marketmind::infrastructure::persistence::trade_repository::TradeRepository;
use marketmind::infrastructure::persistence::Database;
use marketmind::interfaces::{router, AppState};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("marketmind {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let database = Database::new(&config.database_url).await?;

    let orchestrator = Arc::new(Orchestrator {
        market_data: MarketDataClientBuilder::new(config.upstream_base_url.clone()).build()?,
        candles: CandleRepository::new(database.pool.clone()),
        decisions: DecisionRepository::new(database.pool.clone()),
        trades: TradeRepository::new(database.pool.clone()),
        mind: MindStore::new(
            config.mind_file_path.clone(),
            config.mind_template_path.clone(),
            MindHistoryRepository::new(database.pool.clone()),
        ),
        config: config.clone(),
    });
    let runtime = Arc::new(OrchestratorRuntime::new());

    if config.scheduler_enabled {
        orchestrator.start_scheduler(&runtime).await;
    }

    let state = AppState {
        orchestrator,
        runtime,
        config: config.clone(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    info!(addr = %config.http_bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
