//! Paper-trade ledger persistence (C7): append-only trade log, replayed in
//! insertion order to reconstruct account state.

use crate::domain::errors::StorageError;
use crate::domain::trade::{Trade, TradeSide};
use chrono::{TimeZone, Utc};
use sqlx::{Row, SqlitePool};

pub struct TradeRepository {
    pool: SqlitePool,
}

impl TradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, trade: &Trade) -> Result<i64, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO trades (timestamp, symbol, side, quantity, price, fee, slippage, pnl, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.timestamp.timestamp_millis())
        .bind(&trade.symbol)
        .bind(side_to_str(trade.side))
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(trade.fee)
        .bind(trade.slippage)
        .bind(trade.pnl)
        .bind(&trade.notes)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// All trades for `symbol` in insertion order — the replay order the
    /// ledger depends on.
    pub async fn all_for_symbol(&self, symbol: &str) -> Result<Vec<Trade>, StorageError> {
        let rows = sqlx::query("SELECT * FROM trades WHERE symbol = ? ORDER BY timestamp ASC, id ASC")
            .bind(symbol)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_trade).collect()
    }

    /// Most recent `limit` trades across all symbols, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<Trade>, StorageError> {
        let rows = sqlx::query("SELECT * FROM trades ORDER BY timestamp DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_trade).collect()
    }
}

fn side_to_str(side: TradeSide) -> &'static str {
    match side {
        TradeSide::Buy => "buy",
        TradeSide::Sell => "sell",
    }
}

fn row_to_trade(row: sqlx::sqlite::SqliteRow) -> Result<Trade, StorageError> {
    let side_str: String = row.try_get("side")?;
    let side = match side_str.as_str() {
        "buy" => TradeSide::Buy,
        "sell" => TradeSide::Sell,
        other => return Err(StorageError::Corrupt(format!("invalid side in trades row: {other}"))),
    };
    let timestamp_ms: i64 = row.try_get("timestamp")?;

    Ok(Trade {
        id: Some(row.try_get("id")?),
        timestamp: Utc.timestamp_millis_opt(timestamp_ms).single().unwrap_or_default(),
        symbol: row.try_get("symbol")?,
        side,
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        fee: row.try_get("fee")?,
        slippage: row.try_get("slippage")?,
        pnl: row.try_get("pnl")?,
        notes: row.try_get("notes")?,
    })
}
