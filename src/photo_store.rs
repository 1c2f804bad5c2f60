//! Durable photo storage with two independent partitions.
//!
//! Every partition is an append/clear-only table: records are never updated in place,
//! ids are assigned by SQLite (`AUTOINCREMENT`, so they keep ascending across clears)
//! and each call runs as a single statement, which makes it atomic on its own.

use log::{debug, info};

use crate::db_pool::{create_db_pool, create_in_memory_pool, DbPool};
use crate::db_schema::initialize_schema;
use crate::error_kind::ErrorKind;
use crate::models::{Partition, PhotoMetadata, PhotoRecord, PhotoSummary};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Persistent storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Storage transaction failed: {0}")]
    TransactionFailed(#[from] sqlx::Error),
    #[error("Stored metadata of record {id} is unreadable: {source}")]
    CorruptMetadata {
        id: i64,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            StoreError::TransactionFailed(_) | StoreError::CorruptMetadata { .. } => {
                ErrorKind::TransactionFailed
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone)]
pub struct PhotoStore {
    pool: DbPool,
}

impl PhotoStore {
    /// Opens (creating if needed) the database file and both partitions
    pub async fn open(database_path: &str) -> StoreResult<Self> {
        let pool = create_db_pool(database_path).await?;
        Ok(Self { pool })
    }

    pub async fn open_in_memory() -> StoreResult<Self> {
        let pool = create_in_memory_pool().await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Makes sure both partitions exist. Safe to call any number of times.
    pub async fn ensure_partitions(&self) -> StoreResult<()> {
        initialize_schema(&self.pool)
            .await
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))
    }

    pub async fn add(
        &self,
        partition: Partition,
        image_data: &[u8],
        metadata: &PhotoMetadata,
    ) -> StoreResult<i64> {
        let metadata_json = serde_json::to_string(metadata).map_err(|e| {
            StoreError::TransactionFailed(sqlx::Error::Encode(Box::new(e)))
        })?;
        let stored_at = chrono::Utc::now().timestamp_millis();

        let sql = format!(
            "INSERT INTO {} (blob, metadata, timestamp) VALUES (?, ?, ?)",
            partition.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(image_data)
            .bind(&metadata_json)
            .bind(stored_at)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        debug!(
            "Stored photo {} in {} partition ({} bytes)",
            id,
            partition,
            image_data.len()
        );
        Ok(id)
    }

    /// All records of a partition in insertion order
    pub async fn list_all(&self, partition: Partition) -> StoreResult<Vec<PhotoRecord>> {
        let sql = format!(
            "SELECT id, blob, metadata, timestamp FROM {} ORDER BY id ASC",
            partition.table_name()
        );
        let rows: Vec<(i64, Vec<u8>, String, i64)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(id, image_data, metadata, stored_at)| {
                Ok(PhotoRecord {
                    id,
                    image_data,
                    metadata: parse_metadata(id, &metadata)?,
                    stored_at,
                })
            })
            .collect()
    }

    /// Gallery listing without loading the image bytes
    pub async fn list_summaries(&self, partition: Partition) -> StoreResult<Vec<PhotoSummary>> {
        let sql = format!(
            "SELECT id, metadata, timestamp, length(blob) FROM {} ORDER BY id ASC",
            partition.table_name()
        );
        let rows: Vec<(i64, String, i64, i64)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(id, metadata, stored_at, size_bytes)| {
                Ok(PhotoSummary {
                    id,
                    partition,
                    metadata: parse_metadata(id, &metadata)?,
                    stored_at,
                    size_bytes,
                })
            })
            .collect()
    }

    pub async fn get(&self, partition: Partition, id: i64) -> StoreResult<Option<PhotoRecord>> {
        let sql = format!(
            "SELECT id, blob, metadata, timestamp FROM {} WHERE id = ?",
            partition.table_name()
        );
        let row: Option<(i64, Vec<u8>, String, i64)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((id, image_data, metadata, stored_at)) => Ok(Some(PhotoRecord {
                id,
                image_data,
                metadata: parse_metadata(id, &metadata)?,
                stored_at,
            })),
            None => Ok(None),
        }
    }

    pub async fn count(&self, partition: Partition) -> StoreResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", partition.table_name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as usize)
    }

    /// Deletes every record of the partition and returns how many were removed
    pub async fn clear(&self, partition: Partition) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {}", partition.table_name());
        let result = sqlx::query(&sql).execute(&self.pool).await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!("Cleared {} photos from {} partition", removed, partition);
        }
        Ok(removed)
    }
}

fn parse_metadata(id: i64, raw: &str) -> StoreResult<PhotoMetadata> {
    serde_json::from_str(raw).map_err(|source| StoreError::CorruptMetadata { id, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use tempfile::TempDir;

    fn metadata(address: &str) -> PhotoMetadata {
        PhotoMetadata {
            timestamp: "1/2/2025, 3:04:05 PM".to_string(),
            location: Some(Coordinates {
                latitude: 48.8584,
                longitude: 2.2945,
            }),
            address: address.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_returns_ascending_ids_in_insertion_order() {
        let store = PhotoStore::open_in_memory().await.unwrap();

        let mut ids = Vec::new();
        for i in 0..5u8 {
            let id = store
                .add(Partition::Session, &[i; 4], &metadata(&format!("street {}", i)))
                .await
                .unwrap();
            ids.push(id);
        }

        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

        let records = store.list_all(Partition::Session).await.unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.image_data, vec![i as u8; 4]);
            assert_eq!(record.metadata.address, format!("street {}", i));
        }
    }

    #[tokio::test]
    async fn test_list_all_on_empty_partition() {
        let store = PhotoStore::open_in_memory().await.unwrap();
        assert!(store.list_all(Partition::Archive).await.unwrap().is_empty());
        assert_eq!(store.count(Partition::Archive).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_empties_partition_and_is_idempotent() {
        let store = PhotoStore::open_in_memory().await.unwrap();
        store
            .add(Partition::Session, b"a", &metadata("one"))
            .await
            .unwrap();
        store
            .add(Partition::Session, b"b", &metadata("two"))
            .await
            .unwrap();

        assert_eq!(store.clear(Partition::Session).await.unwrap(), 2);
        assert!(store.list_all(Partition::Session).await.unwrap().is_empty());

        assert_eq!(store.clear(Partition::Session).await.unwrap(), 0);
        assert!(store.list_all(Partition::Session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let store = PhotoStore::open_in_memory().await.unwrap();
        let session_id = store
            .add(Partition::Session, b"session", &metadata("s"))
            .await
            .unwrap();
        let archive_id = store
            .add(Partition::Archive, b"archive", &metadata("a"))
            .await
            .unwrap();

        // Each partition has its own id sequence
        assert_eq!(session_id, 1);
        assert_eq!(archive_id, 1);

        store.clear(Partition::Session).await.unwrap();
        assert_eq!(store.count(Partition::Session).await.unwrap(), 0);
        assert_eq!(store.count(Partition::Archive).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ids_keep_ascending_after_clear() {
        let store = PhotoStore::open_in_memory().await.unwrap();
        let first = store
            .add(Partition::Session, b"x", &metadata("x"))
            .await
            .unwrap();
        store.clear(Partition::Session).await.unwrap();
        let second = store
            .add(Partition::Session, b"y", &metadata("y"))
            .await
            .unwrap();

        assert!(second > first);
    }

    #[tokio::test]
    async fn test_get_and_summaries() {
        let store = PhotoStore::open_in_memory().await.unwrap();
        let id = store
            .add(Partition::Archive, &[7u8; 32], &metadata("Eiffel Tower"))
            .await
            .unwrap();

        let record = store.get(Partition::Archive, id).await.unwrap().unwrap();
        assert_eq!(record.image_data.len(), 32);
        assert_eq!(record.metadata, metadata("Eiffel Tower"));
        assert!(record.stored_at > 0);

        assert!(store.get(Partition::Session, id).await.unwrap().is_none());
        assert!(store.get(Partition::Archive, id + 1).await.unwrap().is_none());

        let summaries = store.list_summaries(Partition::Archive).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, id);
        assert_eq!(summaries[0].partition, Partition::Archive);
        assert_eq!(summaries[0].size_bytes, 32);
    }

    #[tokio::test]
    async fn test_open_is_idempotent_and_durable() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/photos.db");
        let db_path = db_path.to_str().unwrap();

        {
            let store = PhotoStore::open(db_path).await.unwrap();
            store.ensure_partitions().await.unwrap();
            store
                .add(Partition::Archive, b"kept", &metadata("kept"))
                .await
                .unwrap();
            store.pool().close().await;
        }

        let reopened = PhotoStore::open(db_path).await.unwrap();
        let records = reopened.list_all(Partition::Archive).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image_data, b"kept".to_vec());
    }

    #[tokio::test]
    async fn test_open_fails_when_location_is_not_writable() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"file").unwrap();
        let db_path = blocker.join("photos.db");

        let result = PhotoStore::open(db_path.to_str().unwrap()).await;
        match result {
            Err(err) => assert_eq!(err.kind(), ErrorKind::StorageUnavailable),
            Ok(_) => panic!("opening a database below a regular file must fail"),
        }
    }

    #[tokio::test]
    async fn test_corrupt_metadata_is_reported() {
        let store = PhotoStore::open_in_memory().await.unwrap();
        sqlx::query("INSERT INTO session_photos (blob, metadata, timestamp) VALUES (?, ?, ?)")
            .bind(b"raw".as_slice())
            .bind("not json")
            .bind(0i64)
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.list_all(Partition::Session).await.unwrap_err();
        assert!(matches!(err, StoreError::CorruptMetadata { id: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::TransactionFailed);
    }
}
