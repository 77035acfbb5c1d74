use thiserror::Error;

/// Errors from the market-data client (C1).
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("upstream unavailable for {symbol} {timeframe} after {attempts} attempts: {reason}")]
    UpstreamUnavailable {
        symbol: String,
        timeframe: String,
        attempts: u32,
        reason: String,
    },
}

/// Errors from candle/decision/trade/mind-history persistence (C2/C3/C7 storage).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage operation failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cognitive document io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cognitive document was not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("stored data was corrupt: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the read/command API (C9).
#[derive(Debug, Error)]
pub enum InvalidCommand {
    #[error("invalid command: {0}")]
    BadRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_unavailable_formatting() {
        let err = MarketDataError::UpstreamUnavailable {
            symbol: "BTCUSDT".to_string(),
            timeframe: "1h".to_string(),
            attempts: 4,
            reason: "connection reset".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("BTCUSDT"));
        assert!(msg.contains("4 attempts"));
    }
}
