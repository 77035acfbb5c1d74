//! Risk gate configuration parsing from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Risk gate thresholds. All percentage fields are fractional (0.20 means 20%).
#[derive(Debug, Clone)]
pub struct RiskEnvConfig {
    pub max_position_pct: f64,
    pub max_exposure_pct: f64,
    pub max_daily_loss_pct: f64,
    pub max_stop_loss_pct: f64,
}

impl RiskEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            max_position_pct: Self::parse_f64("MAX_POSITION_PCT", 0.20)?,
            max_exposure_pct: Self::parse_f64("MAX_EXPOSURE_PCT", 0.60)?,
            max_daily_loss_pct: Self::parse_f64("MAX_DAILY_LOSS_PCT", 0.05)?,
            max_stop_loss_pct: Self::parse_f64("MAX_STOP_LOSS_PCT", 0.08)?,
        })
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_config_defaults() {
        let config = RiskEnvConfig::from_env().expect("should parse with defaults");
        assert_eq!(config.max_position_pct, 0.20);
        assert_eq!(config.max_exposure_pct, 0.60);
    }
}
