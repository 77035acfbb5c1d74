//! Audit log for cognitive-state writes (C3): one row per successful save.

use crate::domain::errors::StorageError;
use crate::domain::mind::MindHistory;
use chrono::{TimeZone, Utc};
use sqlx::{Row, SqlitePool};

pub struct MindHistoryRepository {
    pool: SqlitePool,
}

impl MindHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &MindHistory) -> Result<i64, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO mind_history (changed_at, changed_by, previous_state, new_state, change_summary)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.changed_at.timestamp_millis())
        .bind(&entry.changed_by)
        .bind(entry.previous_state.to_string())
        .bind(entry.new_state.to_string())
        .bind(&entry.change_summary)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent `limit` history entries, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<MindHistory>, StorageError> {
        let rows = sqlx::query("SELECT * FROM mind_history ORDER BY changed_at DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> Result<MindHistory, StorageError> {
    let changed_at_ms: i64 = row.try_get("changed_at")?;
    let previous_state_str: String = row.try_get("previous_state")?;
    let new_state_str: String = row.try_get("new_state")?;

    Ok(MindHistory {
        id: Some(row.try_get("id")?),
        changed_at: Utc.timestamp_millis_opt(changed_at_ms).single().unwrap_or_default(),
        changed_by: row.try_get("changed_by")?,
        previous_state: serde_json::from_str(&previous_state_str)?,
        new_state: serde_json::from_str(&new_state_str)?,
        change_summary: row.try_get("change_summary")?,
    })
}
