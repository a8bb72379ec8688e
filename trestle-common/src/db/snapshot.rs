//! Session snapshot persistence
//!
//! One record under a fixed id with overwrite semantics. The write happens
//! inside a transaction, so an interrupted save never corrupts the
//! previously committed snapshot.

use sqlx::SqlitePool;
use tracing::debug;

use crate::model::SessionSnapshot;
use crate::Result;

/// Fixed id of the single application-state record
pub const STATE_ID: &str = "field-session";

/// Access to the persisted session snapshot
#[derive(Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist the snapshot, replacing any prior one
    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR REPLACE INTO app_state (id, payload, updated_at) VALUES (?, ?, ?)")
            .bind(STATE_ID)
            .bind(&payload)
            .bind(crate::time::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(bytes = payload.len(), "Saved session snapshot");
        Ok(())
    }

    /// Whether a prior session snapshot exists
    pub async fn exists(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_state WHERE id = ?")
            .bind(STATE_ID)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Load the persisted snapshot; `None` when no session was saved
    pub async fn load(&self) -> Result<Option<SessionSnapshot>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM app_state WHERE id = ?")
                .bind(STATE_ID)
                .fetch_optional(&self.pool)
                .await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Remove the persisted snapshot.
    ///
    /// Called only after a confirmed successful submission, so stale local
    /// state cannot be resubmitted.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM app_state WHERE id = ?")
            .bind(STATE_ID)
            .execute(&self.pool)
            .await?;
        debug!("Cleared session snapshot");
        Ok(())
    }
}
