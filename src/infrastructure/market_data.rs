//! Market-data client (C1): fetches OHLCV candles from an exchange REST
//! endpoint. Retries transient failures via the same `reqwest-middleware` /
//! `reqwest-retry` stack the exchange adapters build their clients on.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::errors::MarketDataError;
use chrono::{TimeZone, Utc};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use serde_json::Value;
use std::time::Duration;

pub struct MarketDataClient {
    http: ClientWithMiddleware,
    base_url: String,
    max_retries: u32,
}

pub struct MarketDataClientBuilder {
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl MarketDataClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn build(self) -> anyhow::Result<MarketDataClient> {
        let inner = reqwest::Client::builder().timeout(self.timeout).build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(self.max_retries);
        let http = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(MarketDataClient {
            http,
            base_url: self.base_url,
            max_retries: self.max_retries,
        })
    }
}

impl MarketDataClient {
    /// Fetches the most recent `limit` candles for `(symbol, timeframe)`.
    /// Transient transport failures are retried by the client's own
    /// middleware with exponential backoff, up to `max_retries` extra
    /// attempts, before this returns an error.
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let symbol_upper = symbol.to_uppercase();
        let interval = timeframe.to_string();

        let unavailable = |reason: String| MarketDataError::UpstreamUnavailable {
            symbol: symbol_upper.clone(),
            timeframe: interval.clone(),
            attempts: self.max_retries + 1,
            reason,
        };

        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol_upper.as_str()),
                ("interval", interval.as_str()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(|err| unavailable(err.to_string()))?;

        let response = response.error_for_status().map_err(|err| unavailable(err.to_string()))?;
        let body = response.text().await.map_err(|err| unavailable(err.to_string()))?;

        let raw: Value = serde_json::from_str(&body)
            .map_err(|err| unavailable(format!("response was not valid JSON: {err}")))?;

        let rows = raw.as_array().ok_or_else(|| unavailable("response body was not a JSON array".to_string()))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            candles.push(parse_row(row, &symbol_upper, timeframe).map_err(unavailable)?);
        }
        Ok(candles)
    }
}

fn parse_row(row: &Value, symbol: &str, timeframe: Timeframe) -> Result<Candle, String> {
    let cols = row.as_array().ok_or("malformed kline row: not an array")?;
    if cols.len() < 6 {
        return Err("malformed kline row: fewer than 6 columns".to_string());
    }
    let open_time_ms = cols[0].as_i64().ok_or("malformed kline row: open_time not a number")?;
    let parse_num = |v: &Value| -> Result<f64, String> {
        v.as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .or_else(|| v.as_f64())
            .ok_or_else(|| "malformed kline row: non-numeric OHLCV field".to_string())
    };

    Ok(Candle {
        symbol: symbol.to_string(),
        timeframe,
        open_time: Utc.timestamp_millis_opt(open_time_ms).single().ok_or("invalid open_time")?,
        open: parse_num(&cols[1])?,
        high: parse_num(&cols[2])?,
        low: parse_num(&cols[3])?,
        close: parse_num(&cols[4])?,
        volume: parse_num(&cols[5])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_row_converts_ms_epoch_to_utc() {
        let row = json!([1_700_000_000_000i64, "100.0", "110.0", "95.0", "105.0", "12.5"]);
        let candle = parse_row(&row, "BTCUSDT", Timeframe::D1).unwrap();
        assert_eq!(candle.close, 105.0);
        assert!(candle.is_valid());
    }

    #[test]
    fn test_parse_row_rejects_short_rows() {
        let row = json!([1_700_000_000_000i64, "100.0"]);
        assert!(parse_row(&row, "BTCUSDT", Timeframe::D1).is_err());
    }
}
