//! In-memory record store for tests and local development.

use crate::{RecordQuery, RecordStore, StorageResult, StoredRecord};
use async_trait::async_trait;
use keel_core::{RecordKind, StorageError, TenantId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// `RwLock<HashMap>`-backed [`RecordStore`]. Cloning shares the same rows.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    rows: Arc<RwLock<HashMap<Uuid, StoredRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every row, across all tenants.
    pub fn clear(&self) -> StorageResult<()> {
        self.write()?.clear();
        Ok(())
    }

    /// Total row count across all tenants and kinds.
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<Uuid, StoredRecord>>> {
        self.rows.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<Uuid, StoredRecord>>> {
        self.rows.write().map_err(|_| StorageError::LockPoisoned)
    }

    fn matching(
        rows: &HashMap<Uuid, StoredRecord>,
        kind: RecordKind,
        tenant_id: TenantId,
        query: &RecordQuery,
    ) -> Vec<StoredRecord> {
        let mut out: Vec<StoredRecord> = rows
            .values()
            .filter(|r| r.kind == kind && r.tenant_id == tenant_id)
            .filter(|r| query.parent_id.is_none() || r.parent_id == query.parent_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }
}

fn owned(row: &StoredRecord, kind: RecordKind, tenant_id: TenantId) -> bool {
    row.kind == kind && row.tenant_id == tenant_id
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, record: StoredRecord) -> StorageResult<()> {
        let mut rows = self.write()?;
        if rows.contains_key(&record.id) {
            return Err(StorageError::AlreadyExists {
                kind: record.kind,
                id: record.id,
            });
        }
        rows.insert(record.id, record);
        Ok(())
    }

    async fn get(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        id: Uuid,
    ) -> StorageResult<Option<StoredRecord>> {
        let rows = self.read()?;
        Ok(rows
            .get(&id)
            .filter(|r| owned(r, kind, tenant_id))
            .cloned())
    }

    async fn update(&self, record: StoredRecord) -> StorageResult<bool> {
        let mut rows = self.write()?;
        match rows.get_mut(&record.id) {
            Some(existing) if owned(existing, record.kind, record.tenant_id) => {
                existing.parent_id = record.parent_id;
                existing.data = record.data;
                existing.updated_at = record.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        id: Uuid,
    ) -> StorageResult<bool> {
        let mut rows = self.write()?;
        let is_owned = rows.get(&id).is_some_and(|r| owned(r, kind, tenant_id));
        if is_owned {
            rows.remove(&id);
        }
        Ok(is_owned)
    }

    async fn list(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        query: &RecordQuery,
    ) -> StorageResult<Vec<StoredRecord>> {
        let rows = self.read()?;
        let matching = Self::matching(&rows, kind, tenant_id, query);
        Ok(matching
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count(
        &self,
        kind: RecordKind,
        tenant_id: TenantId,
        query: &RecordQuery,
    ) -> StorageResult<u64> {
        let rows = self.read()?;
        let n = rows
            .values()
            .filter(|r| owned(r, kind, tenant_id))
            .filter(|r| query.parent_id.is_none() || r.parent_id == query.parent_id)
            .count();
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordStoreExt;
    use chrono::{Duration, Utc};
    use keel_core::{Interface, InterfaceId, Product, ProductId};

    fn product(tenant_id: TenantId, name: &str) -> Product {
        let now = Utc::now();
        Product {
            product_id: ProductId::now_v7(),
            tenant_id,
            name: name.to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn interface(product: &Product, name: &str) -> Interface {
        let now = Utc::now();
        Interface {
            interface_id: InterfaceId::now_v7(),
            tenant_id: product.tenant_id,
            product_id: product.product_id,
            name: name.to_string(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryStore::new();
        let p = product(TenantId::now_v7(), "Atlas");
        store.insert_record(&p).await.unwrap();

        let got: Option<Product> = store
            .get_record(p.tenant_id, p.product_id.as_uuid())
            .await
            .unwrap();
        assert_eq!(got, Some(p));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryStore::new();
        let p = product(TenantId::now_v7(), "Atlas");
        store.insert_record(&p).await.unwrap();
        let err = store.insert_record(&p).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { kind: RecordKind::Product, .. }));
    }

    #[tokio::test]
    async fn test_other_tenant_sees_nothing() {
        let store = InMemoryStore::new();
        let p = product(TenantId::now_v7(), "Atlas");
        store.insert_record(&p).await.unwrap();
        let intruder = TenantId::now_v7();
        let id = p.product_id.as_uuid();

        assert!(store.get_record::<Product>(intruder, id).await.unwrap().is_none());
        assert!(!store.delete_record::<Product>(intruder, id).await.unwrap());

        let mut hijack = p.clone();
        hijack.tenant_id = intruder;
        hijack.name = "Stolen".to_string();
        assert!(!store.update_record(&hijack).await.unwrap());

        let still: Product = store.require_record(p.tenant_id, id).await.unwrap();
        assert_eq!(still.name, "Atlas");
        assert!(store
            .list_records::<Product>(intruder, &RecordQuery::all())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_wrong_kind_is_missing() {
        let store = InMemoryStore::new();
        let p = product(TenantId::now_v7(), "Atlas");
        store.insert_record(&p).await.unwrap();
        let row = store
            .get(RecordKind::Roadmap, p.tenant_id, p.product_id.as_uuid())
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_returns_false() {
        let store = InMemoryStore::new();
        let p = product(TenantId::now_v7(), "Atlas");
        assert!(!store.update_record(&p).await.unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let store = InMemoryStore::new();
        let mut p = product(TenantId::now_v7(), "Atlas");
        store.insert_record(&p).await.unwrap();
        let created = p.created_at;
        p.name = "Atlas 2".to_string();
        p.updated_at = created + Duration::seconds(5);
        assert!(store.update_record(&p).await.unwrap());

        let row = store
            .get(RecordKind::Product, p.tenant_id, p.product_id.as_uuid())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.created_at, created);
        assert_eq!(row.updated_at, created + Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_list_orders_and_paginates() {
        let store = InMemoryStore::new();
        let tenant = TenantId::now_v7();
        let base = Utc::now();
        let mut names = Vec::new();
        for i in (0..5).rev() {
            let mut p = product(tenant, &format!("p{}", i));
            p.created_at = base + Duration::seconds(i);
            p.updated_at = p.created_at;
            store.insert_record(&p).await.unwrap();
            names.push(p.name);
        }

        let all: Vec<Product> = store.list_records(tenant, &RecordQuery::all()).await.unwrap();
        let listed: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(listed, vec!["p0", "p1", "p2", "p3", "p4"]);

        let page: Vec<Product> = store
            .list_records(tenant, &RecordQuery::all().with_offset(1).with_limit(2))
            .await
            .unwrap();
        let paged: Vec<_> = page.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(paged, vec!["p1", "p2"]);

        assert_eq!(
            store.count(RecordKind::Product, tenant, &RecordQuery::all().with_limit(1)).await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn test_list_filters_by_parent() {
        let store = InMemoryStore::new();
        let tenant = TenantId::now_v7();
        let a = product(tenant, "A");
        let b = product(tenant, "B");
        store.insert_record(&a).await.unwrap();
        store.insert_record(&b).await.unwrap();
        store.insert_record(&interface(&a, "web")).await.unwrap();
        store.insert_record(&interface(&a, "ios")).await.unwrap();
        store.insert_record(&interface(&b, "api")).await.unwrap();

        let under_a: Vec<Interface> = store
            .list_records(tenant, &RecordQuery::children_of(a.product_id.as_uuid()))
            .await
            .unwrap();
        assert_eq!(under_a.len(), 2);
        assert!(under_a.iter().all(|i| i.product_id == a.product_id));
        assert_eq!(
            store
                .count(RecordKind::Interface, tenant, &RecordQuery::children_of(b.product_id.as_uuid()))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_require_record_not_found() {
        let store = InMemoryStore::new();
        let id = Uuid::now_v7();
        let err = store
            .require_record::<Product>(TenantId::now_v7(), id)
            .await
            .unwrap_err();
        assert_eq!(err, StorageError::NotFound { kind: RecordKind::Product, id });
    }

    #[tokio::test]
    async fn test_works_through_trait_object() {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryStore::new());
        let p = product(TenantId::now_v7(), "Atlas");
        store.insert_record(&p).await.unwrap();
        assert!(store.delete_record::<Product>(p.tenant_id, p.product_id.as_uuid()).await.unwrap());
        assert!(store.ping().await.is_ok());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::RecordStoreExt;
    use chrono::Utc;
    use keel_core::{Product, ProductId};
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Rows written by one tenant are never listed, counted or fetched by another.
        #[test]
        fn prop_tenant_isolation(owned_a in 0usize..8, owned_b in 0usize..8) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryStore::new();
                let tenant_a = TenantId::now_v7();
                let tenant_b = TenantId::now_v7();
                let mut a_ids = Vec::new();
                for (tenant, n) in [(tenant_a, owned_a), (tenant_b, owned_b)] {
                    for i in 0..n {
                        let now = Utc::now();
                        let p = Product {
                            product_id: ProductId::now_v7(),
                            tenant_id: tenant,
                            name: format!("p{}", i),
                            description: String::new(),
                            created_at: now,
                            updated_at: now,
                        };
                        if tenant == tenant_a {
                            a_ids.push(p.product_id.as_uuid());
                        }
                        store.insert_record(&p).await.unwrap();
                    }
                }

                let listed_b: Vec<Product> = store.list_records(tenant_b, &RecordQuery::all()).await.unwrap();
                prop_assert_eq!(listed_b.len(), owned_b);
                prop_assert!(listed_b.iter().all(|p| p.tenant_id == tenant_b));
                prop_assert_eq!(
                    store.count(RecordKind::Product, tenant_a, &RecordQuery::all()).await.unwrap(),
                    owned_a as u64
                );
                for id in a_ids {
                    prop_assert!(store.get_record::<Product>(tenant_b, id).await.unwrap().is_none());
                }
                Ok(())
            })?;
        }
    }
}
