use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::time::Duration;

use crate::db_schema::initialize_schema;
use crate::photo_store::{StoreError, StoreResult};

pub type DbPool = sqlx::SqlitePool;

pub async fn create_db_pool(database_path: &str) -> StoreResult<DbPool> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = std::path::Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::StorageUnavailable(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    // WAL with a busy timeout so transient locks are waited on instead of failing immediately
    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::StorageUnavailable(format!("{}: {}", database_path, e)))?;

    initialize_schema(&pool)
        .await
        .map_err(|e| StoreError::StorageUnavailable(format!("schema setup failed: {}", e)))?;

    info!("Photo database ready at {}", database_path);
    Ok(pool)
}

/// Single-connection in-memory database; every extra connection would see an empty database.
pub async fn create_in_memory_pool() -> StoreResult<DbPool> {
    let options = SqliteConnectOptions::new().in_memory(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

    initialize_schema(&pool)
        .await
        .map_err(|e| StoreError::StorageUnavailable(format!("schema setup failed: {}", e)))?;

    Ok(pool)
}
