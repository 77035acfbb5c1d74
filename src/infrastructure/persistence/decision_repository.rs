//! Decision log persistence (part of C5/C9): append-only, read back most
//! recent-first.

use crate::domain::decision::Decision;
use crate::domain::errors::StorageError;
use crate::domain::signal::Action;
use chrono::{TimeZone, Utc};
use sqlx::{Row, SqlitePool};

pub struct DecisionRepository {
    pool: SqlitePool,
}

impl DecisionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, decision: &Decision) -> Result<i64, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO decisions
                (timestamp, action, position_size_pct, entry_price, stop_loss, take_profit, confidence, reasoning, model_used, input_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(decision.timestamp.timestamp_millis())
        .bind(action_to_str(decision.action))
        .bind(decision.position_size_pct)
        .bind(decision.entry_price)
        .bind(decision.stop_loss)
        .bind(decision.take_profit)
        .bind(decision.confidence)
        .bind(decision.reasoning.to_string())
        .bind(&decision.model_used)
        .bind(&decision.input_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent `limit` decisions, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<Decision>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM decisions ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_decision).collect()
    }

    pub async fn by_id(&self, id: i64) -> Result<Option<Decision>, StorageError> {
        let row = sqlx::query("SELECT * FROM decisions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_decision).transpose()
    }
}

fn action_to_str(action: Action) -> &'static str {
    match action {
        Action::Buy => "buy",
        Action::Sell => "sell",
        Action::Hold => "hold",
    }
}

fn row_to_decision(row: sqlx::sqlite::SqliteRow) -> Result<Decision, StorageError> {
    let action_str: String = row.try_get("action")?;
    let action = match action_str.as_str() {
        "buy" => Action::Buy,
        "sell" => Action::Sell,
        "hold" => Action::Hold,
        other => return Err(StorageError::Corrupt(format!("invalid action in decisions row: {other}"))),
    };
    let reasoning_str: String = row.try_get("reasoning")?;
    let reasoning = serde_json::from_str(&reasoning_str)?;
    let timestamp_ms: i64 = row.try_get("timestamp")?;

    Ok(Decision {
        id: Some(row.try_get("id")?),
        timestamp: Utc.timestamp_millis_opt(timestamp_ms).single().unwrap_or_default(),
        action,
        position_size_pct: row.try_get("position_size_pct")?,
        entry_price: row.try_get("entry_price")?,
        stop_loss: row.try_get("stop_loss")?,
        take_profit: row.try_get("take_profit")?,
        confidence: row.try_get("confidence")?,
        reasoning,
        model_used: row.try_get("model_used")?,
        input_hash: row.try_get("input_hash")?,
    })
}
