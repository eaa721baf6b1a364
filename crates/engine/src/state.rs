//! Durable sync progress: cursor position plus run bookkeeping.
//!
//! State survives process restarts so a multi-page sync can resume mid-run.
//! The whole record is stored as one JSON document under a single key; a
//! missing record means a fresh install and loads as the default state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopsync_core::SyncCursor;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::sync::{PageSummary, SyncTrigger};

/// Storage key of the state document.
const STATE_KEY: &str = "sync";

/// Error type for state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistent sync progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// Where the next page sync resumes from.
    #[serde(default)]
    pub cursor: SyncCursor,
    /// Summary of the most recent page sync.
    #[serde(default)]
    pub last_summary: Option<PageSummary>,
    /// When a manually-triggered run last reached [`SyncCursor::End`].
    #[serde(default)]
    pub last_completed_manual: Option<DateTime<Utc>>,
    /// When a scheduled run last reached [`SyncCursor::End`].
    #[serde(default)]
    pub last_completed_auto: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Record a full pass reaching the end of the listing.
    pub fn mark_completed(&mut self, trigger: SyncTrigger, at: DateTime<Utc>) {
        match trigger {
            SyncTrigger::Manual => self.last_completed_manual = Some(at),
            SyncTrigger::Scheduled => self.last_completed_auto = Some(at),
        }
    }
}

/// Durable storage for [`SyncState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the current state; a store with no saved state yields the
    /// default (cursor at [`SyncCursor::Start`], no history).
    async fn load(&self) -> Result<SyncState, StateError>;

    /// Persist the state, replacing whatever was stored.
    async fn save(&self, state: &SyncState) -> Result<(), StateError>;

    /// Drop all saved state, returning the store to the fresh-install state.
    async fn reset(&self) -> Result<(), StateError>;
}

/// State store holding the record in process memory.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<SyncState>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &SyncState) -> Result<(), StateError> {
        *self.state.lock().await = state.clone();
        Ok(())
    }

    async fn reset(&self) -> Result<(), StateError> {
        *self.state.lock().await = SyncState::default();
        Ok(())
    }
}

/// State store backed by the `sync_state` table.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self) -> Result<SyncState, StateError> {
        let value =
            sqlx::query_scalar::<_, String>("SELECT value FROM sync_state WHERE key = ?")
                .bind(STATE_KEY)
                .fetch_optional(&self.pool)
                .await?;
        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(SyncState::default()),
        }
    }

    async fn save(&self, state: &SyncState) -> Result<(), StateError> {
        let json = serde_json::to_string(state)?;
        sqlx::query(
            r"
            INSERT INTO sync_state (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(STATE_KEY)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), StateError> {
        sqlx::query("DELETE FROM sync_state WHERE key = ?")
            .bind(STATE_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::catalog::{init_pool, run_migrations};

    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStateStore::new();
        assert!(matches!(store.load().await.unwrap().cursor, SyncCursor::Start));

        let state = SyncState {
            cursor: SyncCursor::page("tok123").unwrap(),
            ..SyncState::default()
        };
        store.save(&state).await.unwrap();
        assert_eq!(
            store.load().await.unwrap().cursor.to_string(),
            "tok123"
        );

        store.reset().await.unwrap();
        assert!(matches!(store.load().await.unwrap().cursor, SyncCursor::Start));
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = SqliteStateStore::new(pool);

        // Fresh install: default state.
        assert!(matches!(store.load().await.unwrap().cursor, SyncCursor::Start));

        let mut state = SyncState {
            cursor: SyncCursor::End,
            ..SyncState::default()
        };
        state.mark_completed(SyncTrigger::Manual, Utc::now());
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.cursor.is_end());
        assert!(loaded.last_completed_manual.is_some());
        assert!(loaded.last_completed_auto.is_none());

        store.reset().await.unwrap();
        assert!(matches!(store.load().await.unwrap().cursor, SyncCursor::Start));
    }

    #[test]
    fn test_state_deserializes_with_missing_fields() {
        // Older documents may lack fields added later.
        let state: SyncState = serde_json::from_str(r#"{"cursor": "tok"}"#).unwrap();
        assert_eq!(state.cursor.to_string(), "tok");
        assert!(state.last_summary.is_none());
    }
}
