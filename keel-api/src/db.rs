//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres and the
//! [`PgRecordStore`] backend. Every entity lives in a single `keel_records`
//! table: indexed columns for kind, id, tenant and parent, plus the entity as
//! JSONB. Every statement filters on `tenant_id`.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use keel_core::{RecordKind, StorageError, TenantId, Timestamp};
use keel_storage::{RecordQuery, RecordStore, StorageResult, StoredRecord};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create/recycle timeout for pooled connections
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "keel".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from `KEEL_DB_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("KEEL_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("KEEL_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("KEEL_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("KEEL_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("KEEL_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("KEEL_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("KEEL_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        pool_cfg.timeouts.create = Some(self.timeout);
        pool_cfg.timeouts.recycle = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// POSTGRES RECORD STORE
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS keel_records (
    id          UUID PRIMARY KEY,
    kind        TEXT NOT NULL,
    tenant_id   UUID NOT NULL,
    parent_id   UUID,
    data        JSONB NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS keel_records_tenant_kind_parent
    ON keel_records (tenant_id, kind, parent_id);
CREATE INDEX IF NOT EXISTS keel_records_tenant_kind_created
    ON keel_records (tenant_id, kind, created_at, id);
"#;

const COLUMNS: &str = "kind, id, tenant_id, parent_id, data, created_at, updated_at";

/// [`RecordStore`] over a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: Pool,
}

impl PgRecordStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size, for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create the records table and its indexes if absent.
    pub async fn migrate(&self) -> StorageResult<()> {
        let conn = self.conn().await?;
        conn.batch_execute(SCHEMA).await.map_err(backend)?;
        tracing::info!("keel_records schema ready");
        Ok(())
    }

    async fn conn(&self) -> StorageResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            tracing::error!("Connection pool error: {:?}", e);
            StorageError::Backend {
                reason: format!("Failed to acquire database connection: {}", e),
            }
        })
    }
}

impl std::fmt::Debug for PgRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgRecordStore")
            .field("pool_size", &self.pool_size())
            .finish()
    }
}

fn backend(err: tokio_postgres::Error) -> StorageError {
    tracing::error!("Database error: {:?}", err);
    StorageError::Backend {
        reason: err.to_string(),
    }
}

fn row_to_record(row: &Row) -> StorageResult<StoredRecord> {
    let id: Uuid = row.try_get("id").map_err(backend)?;
    let kind_str: String = row.try_get("kind").map_err(backend)?;
    let kind = RecordKind::from_db_str(&kind_str).map_err(|e| StorageError::Backend {
        reason: format!("row {} has {}", id, e),
    })?;
    let tenant: Uuid = row.try_get("tenant_id").map_err(backend)?;
    let data: JsonValue = row.try_get("data").map_err(backend)?;
    let created_at: Timestamp = row.try_get("created_at").map_err(backend)?;
    let updated_at: Timestamp = row.try_get("updated_at").map_err(backend)?;
    Ok(StoredRecord {
        kind,
        id,
        tenant_id: TenantId::new(tenant),
        parent_id: row.try_get("parent_id").map_err(backend)?,
        data,
        created_at,
        updated_at,
    })
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, record: StoredRecord) -> StorageResult<()> {
        let conn = self.conn().await?;
        let inserted = conn
            .execute(
                &format!(
                    "INSERT INTO keel_records ({}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
                     ON CONFLICT (id) DO NOTHING",
                    COLUMNS
                ),
                &[
                    &record.kind.as_db_str(),
                    &record.id,
                    &record.tenant_id.as_uuid(),
                    &record.parent_id,
                    &record.data,
                    &record.created_at,
                    &record.updated_at,
                ],
            )
            .await
            .map_err(backend)?;
        if inserted == 0 {
            return Err(StorageError::AlreadyExists {
                kind: record.kind,
                id: record.id,
            });
        }
        Ok(())
    }

    async fn get(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        id: Uuid,
    ) -> StorageResult<Option<StoredRecord>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                &format!(
                    "SELECT {} FROM keel_records WHERE kind = $1 AND tenant_id = $2 AND id = $3",
                    COLUMNS
                ),
                &[&kind.as_db_str(), &tenant_id.as_uuid(), &id],
            )
            .await
            .map_err(backend)?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn update(&self, record: StoredRecord) -> StorageResult<bool> {
        let conn = self.conn().await?;
        let updated = conn
            .execute(
                "UPDATE keel_records SET parent_id = $4, data = $5, updated_at = $6 \
                 WHERE kind = $1 AND tenant_id = $2 AND id = $3",
                &[
                    &record.kind.as_db_str(),
                    &record.tenant_id.as_uuid(),
                    &record.id,
                    &record.parent_id,
                    &record.data,
                    &record.updated_at,
                ],
            )
            .await
            .map_err(backend)?;
        Ok(updated > 0)
    }

    async fn delete(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        id: Uuid,
    ) -> StorageResult<bool> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM keel_records WHERE kind = $1 AND tenant_id = $2 AND id = $3",
                &[&kind.as_db_str(), &tenant_id.as_uuid(), &id],
            )
            .await
            .map_err(backend)?;
        Ok(deleted > 0)
    }

    async fn list(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        query: &RecordQuery,
    ) -> StorageResult<Vec<StoredRecord>> {
        let conn = self.conn().await?;
        let limit: Option<i64> = query.limit.map(to_i64);
        let offset: i64 = to_i64(query.offset.unwrap_or(0));
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM keel_records \
                     WHERE kind = $1 AND tenant_id = $2 AND ($3::uuid IS NULL OR parent_id = $3) \
                     ORDER BY created_at, id LIMIT $4 OFFSET $5",
                    COLUMNS
                ),
                &[
                    &kind.as_db_str(),
                    &tenant_id.as_uuid(),
                    &query.parent_id,
                    &limit,
                    &offset,
                ],
            )
            .await
            .map_err(backend)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn count(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        query: &RecordQuery,
    ) -> StorageResult<u64> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "SELECT COUNT(*) FROM keel_records \
                 WHERE kind = $1 AND tenant_id = $2 AND ($3::uuid IS NULL OR parent_id = $3)",
                &[&kind.as_db_str(), &tenant_id.as_uuid(), &query.parent_id],
            )
            .await
            .map_err(backend)?;
        let n: i64 = row.try_get(0).map_err(backend)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn ping(&self) -> StorageResult<()> {
        let conn = self.conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(backend)?;
        Ok(())
    }
}
