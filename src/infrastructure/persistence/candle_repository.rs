//! Candle store (C2): upsert, recent-window reads, latest-price lookup, and
//! one-time initial backfill.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::errors::{MarketDataError, StorageError};
use crate::infrastructure::market_data::MarketDataClient;
use chrono::TimeZone;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// Bar counts fetched once per timeframe when a symbol has no history yet.
/// Distinct from the smaller per-cycle incremental sync limits.
const INITIAL_BACKFILL_LIMITS: [(Timeframe, u32); 3] =
    [(Timeframe::D1, 90), (Timeframe::H4, 42), (Timeframe::H1, 168)];

pub struct CandleRepository {
    pool: SqlitePool,
}

impl CandleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts or updates candles, keyed on (symbol, timeframe, open_time).
    pub async fn upsert_klines(&self, candles: &[Candle]) -> Result<(), StorageError> {
        for candle in candles {
            sqlx::query(
                r#"
                INSERT INTO candles (symbol, timeframe, open_time, open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (symbol, timeframe, open_time) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume
                "#,
            )
            .bind(&candle.symbol)
            .bind(candle.timeframe.to_string())
            .bind(candle.open_time.timestamp_millis())
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Returns the most recent `limit` candles for `(symbol, timeframe)`, in
    /// ascending time order.
    pub async fn get_recent_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, timeframe, open_time, open, high, low, close, volume
            FROM candles
            WHERE symbol = ? AND timeframe = ?
            ORDER BY open_time DESC
            LIMIT ?
            "#,
        )
        .bind(symbol)
        .bind(timeframe.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut candles = row_to_candles(rows)?;
        candles.reverse();
        Ok(candles)
    }

    /// Prefers the latest 1h close; falls back to the latest close across
    /// any timeframe if no 1h data exists.
    pub async fn latest_price_from_db(&self, symbol: &str) -> Result<Option<f64>, StorageError> {
        if let Some(row) = sqlx::query(
            "SELECT close FROM candles WHERE symbol = ? AND timeframe = '1h' ORDER BY open_time DESC LIMIT 1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok(Some(row.try_get::<f64, _>("close")?));
        }

        let row = sqlx::query("SELECT close FROM candles WHERE symbol = ? ORDER BY open_time DESC LIMIT 1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get::<f64, _>("close")).transpose()?)
    }

    /// Tops a symbol's history up to the backfill window for every
    /// timeframe: for each timeframe with fewer than `limit` stored candles,
    /// fetches the full window and stores it. No-op for timeframes already
    /// at or above target.
    pub async fn maybe_backfill_initial_klines(
        &self,
        client: &MarketDataClient,
        symbol: &str,
    ) -> Result<(), BackfillError> {
        for (timeframe, limit) in INITIAL_BACKFILL_LIMITS {
            let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM candles WHERE symbol = ? AND timeframe = ?")
                .bind(symbol)
                .bind(timeframe.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(StorageError::from)?
                .try_get("n")
                .map_err(StorageError::from)?;

            if count as u32 >= limit {
                continue;
            }

            let candles = client.fetch_klines(symbol, timeframe, limit).await?;
            self.upsert_klines(&candles).await?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error(transparent)]
    MarketData(#[from] MarketDataError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn row_to_candles(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<Candle>, StorageError> {
    rows.into_iter()
        .map(|row| {
            let symbol: String = row.try_get("symbol")?;
            let timeframe_str: String = row.try_get("timeframe")?;
            let timeframe = Timeframe::from_str(&timeframe_str)
                .map_err(|e| StorageError::Corrupt(format!("invalid timeframe in candles row: {e}")))?;
            let open_time_ms: i64 = row.try_get("open_time")?;
            Ok(Candle {
                symbol,
                timeframe,
                open_time: chrono::Utc.timestamp_millis_opt(open_time_ms).single().unwrap_or_default(),
                open: row.try_get("open")?,
                high: row.try_get("high")?,
                low: row.try_get("low")?,
                close: row.try_get("close")?,
                volume: row.try_get("volume")?,
            })
        })
        .collect()
}
