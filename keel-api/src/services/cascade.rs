//! Cascading deletes down the product tree.
//!
//! Children are removed before their parent, so an interrupted cascade never
//! leaves rows pointing at a deleted parent.

use keel_core::{Feature, Interface, Product, Record, Release, Requirement, TenantId};
use keel_storage::{RecordQuery, RecordStore, RecordStoreExt};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

async fn delete_one<R: Record>(
    store: &dyn RecordStore,
    tenant_id: TenantId,
    id: Uuid,
) -> ApiResult<u64> {
    if store.delete_record::<R>(tenant_id, id).await? {
        Ok(1)
    } else {
        Err(ApiError::entity_not_found(R::KIND.label(), id))
    }
}

async fn delete_children<R: Record>(
    store: &dyn RecordStore,
    tenant_id: TenantId,
    parent: Uuid,
) -> ApiResult<u64> {
    let children = store
        .list_records::<R>(tenant_id, &RecordQuery::children_of(parent))
        .await?;
    let mut deleted = 0;
    for child in &children {
        if store.delete_record::<R>(tenant_id, child.id()).await? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Delete a feature with its requirements and releases.
pub(crate) async fn delete_feature(
    store: &dyn RecordStore,
    tenant_id: TenantId,
    feature_id: Uuid,
) -> ApiResult<u64> {
    let requirements = delete_children::<Requirement>(store, tenant_id, feature_id).await?;
    let releases = delete_children::<Release>(store, tenant_id, feature_id).await?;
    let own = delete_one::<Feature>(store, tenant_id, feature_id).await?;
    tracing::debug!(%feature_id, requirements, releases, "Feature subtree deleted");
    Ok(requirements + releases + own)
}

/// Delete an interface and every feature under it.
pub(crate) async fn delete_interface(
    store: &dyn RecordStore,
    tenant_id: TenantId,
    interface_id: Uuid,
) -> ApiResult<u64> {
    let features = store
        .list_records::<Feature>(tenant_id, &RecordQuery::children_of(interface_id))
        .await?;
    let mut deleted = 0;
    for feature in &features {
        deleted += delete_feature(store, tenant_id, feature.id()).await?;
    }
    Ok(deleted + delete_one::<Interface>(store, tenant_id, interface_id).await?)
}

/// Delete a product and everything below it.
pub(crate) async fn delete_product(
    store: &dyn RecordStore,
    tenant_id: TenantId,
    product_id: Uuid,
) -> ApiResult<u64> {
    let interfaces = store
        .list_records::<Interface>(tenant_id, &RecordQuery::children_of(product_id))
        .await?;
    let mut deleted = 0;
    for interface in &interfaces {
        deleted += delete_interface(store, tenant_id, interface.id()).await?;
    }
    Ok(deleted + delete_one::<Product>(store, tenant_id, product_id).await?)
}
