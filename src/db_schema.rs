use crate::db_pool::DbPool;
use crate::models::Partition;

// Both partitions are created from this one template so their layout cannot drift.
// `metadata` is the JSON-encoded PhotoMetadata, `timestamp` the insert time in epoch millis.
const PARTITION_TABLE_TEMPLATE: &str = r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    blob BLOB NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    timestamp INTEGER NOT NULL
)
"#;

pub fn partition_table_sql(partition: Partition) -> String {
    PARTITION_TABLE_TEMPLATE.replace("{table}", partition.table_name())
}

pub async fn initialize_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    for partition in Partition::ALL {
        let sql = partition_table_sql(partition);
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}
