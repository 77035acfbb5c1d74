//! Cognitive store (C3): the on-disk belief document plus its append-only
//! audit trail. Single-writer: all mutating access goes through one mutex so
//! load-merge-save never races with itself.

use crate::domain::errors::StorageError;
use crate::domain::mind::{deep_merge, CognitiveState, MindHistory};
use crate::infrastructure::persistence::mind_history_repository::MindHistoryRepository;
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

pub struct MindStore {
    file_path: PathBuf,
    template_path: PathBuf,
    history: MindHistoryRepository,
    write_lock: Mutex<()>,
}

impl MindStore {
    pub fn new(file_path: impl Into<PathBuf>, template_path: impl Into<PathBuf>, history: MindHistoryRepository) -> Self {
        Self {
            file_path: file_path.into(),
            template_path: template_path.into(),
            history,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the live document, falling back to the template, falling back
    /// to the empty skeleton. Logs (but never fails on) validation warnings.
    pub async fn load(&self) -> Result<CognitiveState, StorageError> {
        let state = self.read_document().await?;
        for warning in state.validate() {
            warn!(%warning, "cognitive document validation warning");
        }
        Ok(state)
    }

    async fn read_document(&self) -> Result<CognitiveState, StorageError> {
        if let Some(value) = self.try_read_json(&self.file_path).await? {
            return Ok(CognitiveState(value));
        }
        if let Some(value) = self.try_read_json(&self.template_path).await? {
            return Ok(CognitiveState(value));
        }
        Ok(CognitiveState::empty_skeleton())
    }

    async fn try_read_json(&self, path: &PathBuf) -> Result<Option<Value>, StorageError> {
        match fs::read_to_string(path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Replaces the live document with `new_state`, stamping it and
    /// recording an audit row in the same logical transaction.
    pub async fn save(&self, new_state: CognitiveState, changed_by: &str, change_summary: &str) -> Result<CognitiveState, StorageError> {
        let _guard = self.write_lock.lock().await;
        self.save_locked(new_state, changed_by, change_summary).await
    }

    /// Does the actual write; callers must already hold `write_lock` for
    /// the full load-merge-save sequence they're part of.
    async fn save_locked(&self, mut new_state: CognitiveState, changed_by: &str, change_summary: &str) -> Result<CognitiveState, StorageError> {
        let previous = self.read_document().await?;
        let now = Utc::now();
        new_state.stamp(changed_by, now);

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let serialized = serde_json::to_string_pretty(&new_state.0)?;
        fs::write(&self.file_path, serialized).await?;

        self.history
            .insert(&MindHistory {
                id: None,
                changed_at: now,
                changed_by: changed_by.to_string(),
                previous_state: previous.0,
                new_state: new_state.0.clone(),
                change_summary: change_summary.to_string(),
            })
            .await?;

        Ok(new_state)
    }

    /// Loads, deep-merges `patch` on top, and saves the result. Holds
    /// `write_lock` across the whole load-merge-save sequence so two
    /// concurrent updates can't both merge against the same stale base and
    /// silently drop one another's patch.
    pub async fn update(&self, patch: &Value, changed_by: &str, change_summary: &str) -> Result<CognitiveState, StorageError> {
        let _guard = self.write_lock.lock().await;

        let current = self.read_document().await?;
        for warning in current.validate() {
            warn!(%warning, "cognitive document validation warning");
        }
        let merged = CognitiveState(deep_merge(&current.0, patch));
        self.save_locked(merged, changed_by, change_summary).await
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<MindHistory>, StorageError> {
        self.history.recent(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("marketmind_mind_store_test_{name}_{}.json", std::process::id()))
    }

    #[tokio::test]
    async fn test_load_falls_back_to_empty_skeleton_when_nothing_on_disk() {
        let file_path = temp_path("missing");
        let template_path = temp_path("missing_template");
        let store = MindStore::new(file_path, template_path, MindHistoryRepository::new(dummy_pool().await));
        let state = store.load().await.unwrap();
        assert!(state.validate().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_and_persists() {
        let file_path = temp_path("update");
        let template_path = temp_path("update_template");
        let _ = fs::remove_file(&file_path).await;
        let store = MindStore::new(file_path.clone(), template_path, MindHistoryRepository::new(dummy_pool().await));
        store.save(CognitiveState::empty_skeleton(), "test_init", "seed").await.unwrap();

        let patch = json!({"market_beliefs": {"regime": "bullish"}});
        let updated = store.update(&patch, "test_update", "regime shift").await.unwrap();
        assert_eq!(updated.regime(), Some("bullish"));

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.regime(), Some("bullish"));
        let _ = fs::remove_file(&file_path).await;
    }

    async fn dummy_pool() -> sqlx::SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE mind_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                changed_at INTEGER NOT NULL,
                changed_by TEXT NOT NULL,
                previous_state TEXT NOT NULL,
                new_state TEXT NOT NULL,
                change_summary TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }
}
