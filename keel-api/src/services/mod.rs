//! Service Layer
//!
//! Business logic for every entity, shared by the REST routes and the agent
//! operations. Services validate input, check that parents exist in the
//! caller's tenant, and cascade deletes down the product tree. Every method
//! takes the caller's [`TenantId`].

mod cascade;
mod feature_service;
mod interface_service;
mod page_service;
mod product_service;
mod release_service;
mod requirement_service;
mod roadmap_service;

pub use feature_service::FeatureService;
pub use interface_service::InterfaceService;
pub use page_service::PageService;
pub use product_service::ProductService;
pub use release_service::ReleaseService;
pub use requirement_service::RequirementService;
pub use roadmap_service::RoadmapService;

use std::sync::Arc;

use keel_core::{Record, TenantId};
use keel_storage::{RecordQuery, RecordStore, RecordStoreExt};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::types::{ListParams, ListResponse};

/// Every service over one shared store.
#[derive(Clone)]
pub struct Services {
    pub products: ProductService,
    pub interfaces: InterfaceService,
    pub features: FeatureService,
    pub requirements: RequirementService,
    pub releases: ReleaseService,
    pub roadmaps: RoadmapService,
    pub pages: PageService,
}

impl Services {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            products: ProductService::new(store.clone()),
            interfaces: InterfaceService::new(store.clone()),
            features: FeatureService::new(store.clone()),
            requirements: RequirementService::new(store.clone()),
            releases: ReleaseService::new(store.clone()),
            roadmaps: RoadmapService::new(store.clone()),
            pages: PageService::new(store),
        }
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// One page of `R` rows, optionally under `parent`, plus the unpaginated total.
pub(crate) async fn list_page<R: Record>(
    store: &dyn RecordStore,
    tenant_id: TenantId,
    parent: Option<Uuid>,
    params: ListParams,
) -> ApiResult<ListResponse<R>> {
    let filter = RecordQuery {
        parent_id: parent,
        ..RecordQuery::default()
    };
    let total = store.count(R::KIND, tenant_id, &filter).await?;
    let query = filter
        .with_limit(params.limit())
        .with_offset(params.offset());
    let items = store.list_records::<R>(tenant_id, &query).await?;
    Ok(ListResponse { items, total })
}

/// Paginate rows that were filtered in memory.
pub(crate) fn paginate<T>(rows: Vec<T>, params: ListParams) -> ListResponse<T> {
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(params.offset())
        .take(params.limit())
        .collect();
    ListResponse { items, total }
}

/// Persist an updated entity; a vanished row is 404.
pub(crate) async fn save<R: Record>(store: &dyn RecordStore, record: &R) -> ApiResult<()> {
    if store.update_record(record).await? {
        Ok(())
    } else {
        Err(ApiError::entity_not_found(R::KIND.label(), record.id()))
    }
}

/// Apply an optional name change through the shared validation.
pub(crate) fn updated_name(current: &mut String, value: Option<&String>) -> ApiResult<()> {
    if let Some(value) = value {
        *current = keel_core::validation::validate_name("name", value)?;
    }
    Ok(())
}

pub(crate) fn updated_description(current: &mut String, value: Option<&String>) -> ApiResult<()> {
    if let Some(value) = value {
        *current = keel_core::validation::validate_description("description", value)?;
    }
    Ok(())
}

/// Blank optional text becomes `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_reports_full_total() {
        let page = paginate((0..10).collect::<Vec<_>>(), ListParams::new(Some(3), Some(8)));
        assert_eq!(page.items, vec![8, 9]);
        assert_eq!(page.total, 10);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" ana ".to_string())), Some("ana".to_string()));
        assert_eq!(non_blank(None), None);
    }
}
