//! Configuration module.
//!
//! Structured configuration loaded from environment variables, organized by
//! domain: Risk, plus the top-level aggregate `Config`.

mod risk_env_config;

pub use risk_env_config::RiskEnvConfig;

use anyhow::{Context, Result};
use std::env;

/// Main application configuration, aggregating all sub-configs.
#[derive(Debug, Clone)]
pub struct Config {
    pub trading_pair: String,
    pub analysis_interval_hours: u32,
    pub initial_balance: f64,
    pub trading_fee_pct: f64,
    pub slippage_pct: f64,
    pub scheduler_enabled: bool,
    pub database_url: String,
    pub upstream_base_url: String,
    pub mind_file_path: String,
    pub mind_template_path: String,
    pub ai_model: String,
    pub http_bind_addr: String,
    /// Whether the decision synthesizer applies the cognitive-weight filter
    /// before aggregating signals. Defaults to off to match the reference
    /// implementation's plain aggregation path.
    pub cognitive_filter_enabled: bool,
    pub risk: RiskEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            trading_pair: env::var("TRADING_PAIR").unwrap_or_else(|_| "BTCUSDT".to_string()),
            analysis_interval_hours: Self::parse_u32("ANALYSIS_INTERVAL_HOURS", 4)?,
            initial_balance: Self::parse_f64("INITIAL_BALANCE", 10_000.0)?,
            trading_fee_pct: Self::parse_f64("TRADING_FEE_PCT", 0.001)?,
            slippage_pct: Self::parse_f64("SLIPPAGE_PCT", 0.0005)?,
            scheduler_enabled: Self::parse_bool("SCHEDULER_ENABLED", true),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/marketmind.db".to_string()),
            upstream_base_url: env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
            mind_file_path: env::var("MIND_FILE_PATH")
                .unwrap_or_else(|_| "data/market_mind.json".to_string()),
            mind_template_path: env::var("MIND_TEMPLATE_PATH")
                .unwrap_or_else(|_| "data/market_mind.template.json".to_string()),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "deterministic-fallback".to_string()),
            http_bind_addr: env::var("HTTP_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            cognitive_filter_enabled: Self::parse_bool("COGNITIVE_FILTER_ENABLED", false),
            risk: RiskEnvConfig::from_env()?,
        })
    }

    fn parse_u32(key: &str, default: u32) -> Result<u32> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u32>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<bool>()
            .unwrap_or(default)
    }
}
