use async_trait::async_trait;
use sentinel_core::{SentinelError, StateStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;

/// `sqlx`-backed `StateStore`: a `Clone`-able pool handle, embedded-migration
/// setup, `ON CONFLICT ... DO UPDATE` upsert.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, SentinelError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| SentinelError::Store(format!("postgres connect: {e}")))?;
        info!(max_connections, "connected to postgres state store");
        Ok(PostgresStore { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), SentinelError> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await
            .map_err(|e| SentinelError::Store(format!("migration failed: {e}")))?;
        info!("state store migrations complete");
        Ok(())
    }
}

#[async_trait]
impl StateStore for PostgresStore {
    async fn get(&self, store: &str, key: &str) -> Result<Option<Vec<u8>>, SentinelError> {
        let row = sqlx::query("SELECT value FROM sentinel_kv WHERE store = $1 AND key = $2")
            .bind(store)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SentinelError::Store(format!("get failed: {e}")))?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>("value")))
    }

    async fn put(
        &self,
        store: &str,
        key: &str,
        value: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), SentinelError> {
        sqlx::query(
            "INSERT INTO sentinel_kv (store, key, value, content_type, created_at, updated_at)
             VALUES ($1, $2, $3, $4, NOW(), NOW())
             ON CONFLICT (store, key) DO UPDATE SET
                value = EXCLUDED.value,
                content_type = EXCLUDED.content_type,
                updated_at = NOW()",
        )
        .bind(store)
        .bind(key)
        .bind(value)
        .bind(content_type)
        .execute(&self.pool)
        .await
        .map_err(|e| SentinelError::Store(format!("put failed: {e}")))?;
        Ok(())
    }

    async fn list(
        &self,
        store: &str,
        limit: usize,
        offset: usize,
        desc: bool,
    ) -> Result<Vec<(String, Vec<u8>)>, SentinelError> {
        let order = if desc { "DESC" } else { "ASC" };
        let query = format!(
            "SELECT key, value FROM sentinel_kv WHERE store = $1 ORDER BY updated_at {order} LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&query)
            .bind(store)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SentinelError::Store(format!("list failed: {e}")))?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("key"), r.get::<Vec<u8>, _>("value")))
            .collect())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<(), SentinelError> {
        sqlx::query("DELETE FROM sentinel_kv WHERE store = $1 AND key = $2")
            .bind(store)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| SentinelError::Store(format!("delete failed: {e}")))?;
        Ok(())
    }
}
