//! Captured image blob storage
//!
//! Photos taken in the field are stored locally, keyed by a generated id and
//! indexed by the maintenance action they belong to. The `uploaded` flag is
//! toggled once a blob reaches remote storage, which makes uploads resumable
//! after a connectivity loss.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result};

/// One stored image blob
#[derive(Debug, Clone)]
pub struct ImageRow {
    pub id: Uuid,
    pub maintenance_id: Uuid,
    pub file_name: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub uploaded: bool,
}

/// Access to locally captured images
#[derive(Clone)]
pub struct ImageStore {
    pool: SqlitePool,
}

impl ImageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a captured image; returns its generated id
    pub async fn put(
        &self,
        maintenance_id: Uuid,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO images (id, maintenance_id, file_name, data, created_at, uploaded)
            VALUES (?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(id.to_string())
        .bind(maintenance_id.to_string())
        .bind(file_name)
        .bind(&data)
        .bind(crate::time::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(%id, %maintenance_id, bytes = data.len(), "Stored image");
        Ok(id)
    }

    /// Fetch one image by id
    pub async fn get(&self, id: Uuid) -> Result<Option<ImageRow>> {
        let row = sqlx::query_as::<_, (String, String, String, Vec<u8>, String, i64)>(
            r#"
            SELECT id, maintenance_id, file_name, data, created_at, uploaded
            FROM images WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(parse_row).transpose()
    }

    /// Images for a maintenance action that still await upload
    pub async fn pending_for(&self, maintenance_id: Uuid) -> Result<Vec<ImageRow>> {
        let rows = sqlx::query_as::<_, (String, String, String, Vec<u8>, String, i64)>(
            r#"
            SELECT id, maintenance_id, file_name, data, created_at, uploaded
            FROM images WHERE maintenance_id = ? AND uploaded = 0
            ORDER BY created_at ASC
            "#,
        )
        .bind(maintenance_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_row).collect()
    }

    /// Flag an image as pushed to remote storage
    pub async fn mark_uploaded(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE images SET uploaded = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop all images belonging to a maintenance action
    pub async fn delete_for(&self, maintenance_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM images WHERE maintenance_id = ?")
            .bind(maintenance_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_row(row: (String, String, String, Vec<u8>, String, i64)) -> Result<ImageRow> {
    let (id, maintenance_id, file_name, data, created_at, uploaded) = row;
    Ok(ImageRow {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Bad image id {id}: {e}")))?,
        maintenance_id: Uuid::parse_str(&maintenance_id)
            .map_err(|e| Error::Internal(format!("Bad maintenance id {maintenance_id}: {e}")))?,
        file_name,
        data,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Bad image timestamp {created_at}: {e}")))?
            .with_timezone(&Utc),
        uploaded: uploaded != 0,
    })
}
