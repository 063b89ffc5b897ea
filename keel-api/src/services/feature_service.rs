//! Feature Service

use std::sync::Arc;

use chrono::Utc;
use keel_core::validation::{validate_description, validate_name};
use keel_core::{Feature, FeatureId, Interface, InterfaceId, Record, TenantId};
use keel_storage::{RecordStore, RecordStoreExt};

use super::{cascade, list_page, save, updated_description, updated_name};
use crate::error::ApiResult;
use crate::types::{
    CreateFeatureRequest, DeleteResponse, ListParams, ListResponse, UpdateFeatureRequest,
};

#[derive(Clone)]
pub struct FeatureService {
    store: Arc<dyn RecordStore>,
}

impl FeatureService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create an unsaved feature under an interface of the same tenant.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        interface_id: InterfaceId,
        req: CreateFeatureRequest,
    ) -> ApiResult<Feature> {
        self.store
            .require_record::<Interface>(tenant_id, interface_id.as_uuid())
            .await?;

        let now = Utc::now();
        let feature = Feature {
            feature_id: FeatureId::now_v7(),
            tenant_id,
            interface_id,
            name: validate_name("name", &req.name)?,
            description: validate_description("description", &req.description)?,
            priority: req.priority.unwrap_or_default(),
            status: req.status.unwrap_or_default(),
            is_saved: false,
            saved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&feature).await?;
        tracing::info!(%tenant_id, %interface_id, feature_id = %feature.feature_id, "Feature created");
        Ok(feature)
    }

    pub async fn get(&self, tenant_id: TenantId, feature_id: FeatureId) -> ApiResult<Feature> {
        Ok(self
            .store
            .require_record::<Feature>(tenant_id, feature_id.as_uuid())
            .await?)
    }

    pub async fn list_by_interface(
        &self,
        tenant_id: TenantId,
        interface_id: InterfaceId,
        params: ListParams,
    ) -> ApiResult<ListResponse<Feature>> {
        self.store
            .require_record::<Interface>(tenant_id, interface_id.as_uuid())
            .await?;
        list_page(self.store.as_ref(), tenant_id, Some(interface_id.as_uuid()), params).await
    }

    /// Sparse update. `is_saved: true` stamps `saved_at`; `false` clears it.
    pub async fn update(
        &self,
        tenant_id: TenantId,
        feature_id: FeatureId,
        req: UpdateFeatureRequest,
    ) -> ApiResult<Feature> {
        let mut feature = self.get(tenant_id, feature_id).await?;
        let now = Utc::now();

        updated_name(&mut feature.name, req.name.as_ref())?;
        updated_description(&mut feature.description, req.description.as_ref())?;
        if let Some(priority) = req.priority {
            feature.priority = priority;
        }
        if let Some(status) = req.status {
            feature.status = status;
        }
        match req.is_saved {
            Some(true) => {
                feature.is_saved = true;
                feature.saved_at = Some(now);
            }
            Some(false) => {
                feature.is_saved = false;
                feature.saved_at = None;
            }
            None => {}
        }

        feature.touch(now);
        save(self.store.as_ref(), &feature).await?;
        Ok(feature)
    }

    /// Delete the feature with its requirements and releases.
    pub async fn delete(&self, tenant_id: TenantId, feature_id: FeatureId) -> ApiResult<DeleteResponse> {
        let deleted =
            cascade::delete_feature(self.store.as_ref(), tenant_id, feature_id.as_uuid()).await?;
        tracing::info!(%tenant_id, %feature_id, deleted, "Feature deleted");
        Ok(DeleteResponse {
            deleted,
            ..DeleteResponse::default()
        })
    }
}
