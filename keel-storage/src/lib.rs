//! Keel Storage - Record Store Trait and In-Memory Implementation
//!
//! Every entity is persisted as a [`StoredRecord`]: a handful of indexed
//! columns (kind, id, tenant, parent) plus the entity itself as a JSON
//! document. Backends implement the object-safe [`RecordStore`]; services use
//! the typed helpers on [`RecordStoreExt`]. The Postgres backend lives in
//! keel-api.

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use keel_core::{Record, RecordKind, StorageError, TenantId, Timestamp};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// ROW FORMAT
// ============================================================================

/// The row format shared by every backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub kind: RecordKind,
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub parent_id: Option<Uuid>,
    pub data: JsonValue,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StoredRecord {
    /// Encode an entity into its row.
    pub fn from_record<R: Record>(record: &R) -> StorageResult<Self> {
        let data = serde_json::to_value(record).map_err(|e| StorageError::InsertFailed {
            kind: R::KIND,
            reason: e.to_string(),
        })?;
        Ok(Self {
            kind: R::KIND,
            id: record.id(),
            tenant_id: record.tenant_id(),
            parent_id: record.parent_id(),
            data,
            created_at: record.created_at(),
            updated_at: record.updated_at(),
        })
    }

    /// Decode the JSON document back into an entity.
    pub fn decode<R: Record>(&self) -> StorageResult<R> {
        if self.kind != R::KIND {
            return Err(StorageError::Corrupt {
                kind: R::KIND,
                id: self.id,
                reason: format!("row has kind {}", self.kind),
            });
        }
        serde_json::from_value(self.data.clone()).map_err(|e| StorageError::Corrupt {
            kind: R::KIND,
            id: self.id,
            reason: e.to_string(),
        })
    }
}

/// Filters for [`RecordStore::list`] and [`RecordStore::count`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Only rows whose parent is this id.
    pub parent_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl RecordQuery {
    /// Every row of a kind for the tenant.
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows directly under `parent`.
    pub fn children_of(parent: Uuid) -> Self {
        Self {
            parent_id: Some(parent),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Tenant-scoped persistence for [`StoredRecord`] rows.
///
/// A row owned by another tenant is indistinguishable from a missing row:
/// `get` returns `None`, `update` and `delete` return `false`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new row. Fails with `AlreadyExists` if the id is taken.
    async fn insert(&self, record: StoredRecord) -> StorageResult<()>;

    async fn get(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        id: Uuid,
    ) -> StorageResult<Option<StoredRecord>>;

    /// Replace an existing row's parent, data and `updated_at`.
    /// Returns `false` if no matching row exists.
    async fn update(&self, record: StoredRecord) -> StorageResult<bool>;

    /// Returns `false` if no matching row exists.
    async fn delete(&self, kind: RecordKind, tenant_id: TenantId, id: Uuid)
        -> StorageResult<bool>;

    /// Rows ordered by `created_at`, then id. Limit and offset apply after filtering.
    async fn list(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        query: &RecordQuery,
    ) -> StorageResult<Vec<StoredRecord>>;

    /// Number of rows matching the query's parent filter (limit/offset ignored).
    async fn count(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        query: &RecordQuery,
    ) -> StorageResult<u64>;

    /// Cheap round-trip used by readiness checks.
    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}

// ============================================================================
// TYPED HELPERS
// ============================================================================

/// Typed wrappers over [`RecordStore`] that encode and decode entities.
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn insert_record<R: Record>(&self, record: &R) -> StorageResult<()> {
        self.insert(StoredRecord::from_record(record)?).await
    }

    async fn get_record<R: Record>(&self, tenant_id: TenantId, id: Uuid) -> StorageResult<Option<R>> {
        match self.get(R::KIND, tenant_id, id).await? {
            Some(row) => row.decode().map(Some),
            None => Ok(None),
        }
    }

    /// Like [`get_record`](Self::get_record) but a missing row is `NotFound`.
    async fn require_record<R: Record>(&self, tenant_id: TenantId, id: Uuid) -> StorageResult<R> {
        self.get_record(tenant_id, id)
            .await?
            .ok_or(StorageError::NotFound { kind: R::KIND, id })
    }

    async fn update_record<R: Record>(&self, record: &R) -> StorageResult<bool> {
        self.update(StoredRecord::from_record(record)?).await
    }

    async fn delete_record<R: Record>(&self, tenant_id: TenantId, id: Uuid) -> StorageResult<bool> {
        self.delete(R::KIND, tenant_id, id).await
    }

    async fn list_records<R: Record>(
        &self,
        tenant_id: TenantId,
        query: &RecordQuery,
    ) -> StorageResult<Vec<R>> {
        self.list(R::KIND, tenant_id, query)
            .await?
            .iter()
            .map(|row| row.decode::<R>())
            .collect()
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
