//! Durable store initialization and recovery
//!
//! Opens (creating if needed) the local SQLite store that holds the session
//! snapshot and captured images. Open failures are retried once; if the
//! store still cannot be opened it is deleted and recreated empty, so a
//! corrupt file never leaves the app non-functional.

use std::path::Path;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{info, warn};

use crate::Result;

/// Open the durable store, applying the recovery policy.
pub async fn open_store(db_path: &Path) -> Result<SqlitePool> {
    match try_open(db_path).await {
        Ok(pool) => Ok(pool),
        Err(first) => {
            warn!(error = %first, "Durable store failed to open, retrying once");
            match try_open(db_path).await {
                Ok(pool) => Ok(pool),
                Err(second) => {
                    warn!(
                        error = %second,
                        "Durable store unusable, recreating from empty"
                    );
                    remove_store_files(db_path);
                    try_open(db_path).await
                }
            }
        }
    }
}

async fn try_open(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new durable store: {}", db_path.display());
    } else {
        info!("Opened existing durable store: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL keeps snapshot writes from blocking concurrent reads
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_app_state_table(&pool).await?;
    create_images_table(&pool).await?;

    Ok(pool)
}

/// Delete the database file and its WAL/SHM sidecars
fn remove_store_files(db_path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut path = db_path.as_os_str().to_owned();
        path.push(suffix);
        let _ = std::fs::remove_file(&path);
    }
}

async fn create_app_state_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS app_state (
            id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_images_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id TEXT PRIMARY KEY,
            maintenance_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            data BLOB NOT NULL,
            created_at TEXT NOT NULL,
            uploaded INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_images_maintenance ON images (maintenance_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}
