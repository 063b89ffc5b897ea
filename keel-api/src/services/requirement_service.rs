//! Requirement Service

use std::sync::Arc;

use chrono::Utc;
use keel_core::validation::{normalize_criteria, validate_description, validate_name};
use keel_core::{Feature, FeatureId, Record, Requirement, RequirementId, TenantId};
use keel_storage::{RecordStore, RecordStoreExt};

use super::{list_page, non_blank, save, updated_description, updated_name};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    CreateRequirementRequest, DeleteResponse, ListParams, ListResponse, UpdateRequirementRequest,
};

#[derive(Clone)]
pub struct RequirementService {
    store: Arc<dyn RecordStore>,
}

impl RequirementService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        tenant_id: TenantId,
        feature_id: FeatureId,
        req: CreateRequirementRequest,
    ) -> ApiResult<Requirement> {
        self.store
            .require_record::<Feature>(tenant_id, feature_id.as_uuid())
            .await?;

        let now = Utc::now();
        let requirement = Requirement {
            requirement_id: RequirementId::now_v7(),
            tenant_id,
            feature_id,
            name: validate_name("name", &req.name)?,
            description: validate_description("description", &req.description)?,
            owner: non_blank(req.owner),
            priority: req.priority.unwrap_or_default(),
            status: req.status.unwrap_or_default(),
            cuj: non_blank(req.cuj),
            acceptance_criteria: normalize_criteria(&req.acceptance_criteria),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&requirement).await?;
        tracing::info!(
            %tenant_id,
            %feature_id,
            requirement_id = %requirement.requirement_id,
            "Requirement created"
        );
        Ok(requirement)
    }

    pub async fn get(
        &self,
        tenant_id: TenantId,
        requirement_id: RequirementId,
    ) -> ApiResult<Requirement> {
        Ok(self
            .store
            .require_record::<Requirement>(tenant_id, requirement_id.as_uuid())
            .await?)
    }

    pub async fn list_by_feature(
        &self,
        tenant_id: TenantId,
        feature_id: FeatureId,
        params: ListParams,
    ) -> ApiResult<ListResponse<Requirement>> {
        self.store
            .require_record::<Feature>(tenant_id, feature_id.as_uuid())
            .await?;
        list_page(self.store.as_ref(), tenant_id, Some(feature_id.as_uuid()), params).await
    }

    pub async fn update(
        &self,
        tenant_id: TenantId,
        requirement_id: RequirementId,
        req: UpdateRequirementRequest,
    ) -> ApiResult<Requirement> {
        let mut requirement = self.get(tenant_id, requirement_id).await?;

        updated_name(&mut requirement.name, req.name.as_ref())?;
        updated_description(&mut requirement.description, req.description.as_ref())?;
        if let Some(owner) = req.owner {
            requirement.owner = non_blank(owner);
        }
        if let Some(priority) = req.priority {
            requirement.priority = priority;
        }
        if let Some(status) = req.status {
            requirement.status = status;
        }
        if let Some(cuj) = req.cuj {
            requirement.cuj = non_blank(cuj);
        }
        if let Some(criteria) = req.acceptance_criteria {
            requirement.acceptance_criteria = normalize_criteria(&criteria);
        }

        requirement.touch(Utc::now());
        save(self.store.as_ref(), &requirement).await?;
        Ok(requirement)
    }

    pub async fn delete(
        &self,
        tenant_id: TenantId,
        requirement_id: RequirementId,
    ) -> ApiResult<DeleteResponse> {
        if !self
            .store
            .delete_record::<Requirement>(tenant_id, requirement_id.as_uuid())
            .await?
        {
            return Err(ApiError::entity_not_found("Requirement", requirement_id));
        }
        tracing::info!(%tenant_id, %requirement_id, "Requirement deleted");
        Ok(DeleteResponse {
            deleted: 1,
            ..DeleteResponse::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use keel_core::{FeatureStatus, InterfaceId, Priority, RequirementStatus};
    use keel_storage::InMemoryStore;

    /// Insert a bare feature row; requirements only check that it exists.
    async fn setup() -> (RequirementService, TenantId, FeatureId) {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryStore::new());
        let tenant = TenantId::now_v7();
        let now = Utc::now();
        let feature = Feature {
            feature_id: FeatureId::now_v7(),
            tenant_id: tenant,
            interface_id: InterfaceId::now_v7(),
            name: "Search".to_string(),
            description: String::new(),
            priority: Priority::Med,
            status: FeatureStatus::Planned,
            is_saved: false,
            saved_at: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_record(&feature).await.unwrap();
        (RequirementService::new(store), tenant, feature.feature_id)
    }

    fn req(name: &str) -> CreateRequirementRequest {
        CreateRequirementRequest {
            name: name.to_string(),
            description: String::new(),
            owner: Some("  ".to_string()),
            priority: Some(Priority::High),
            status: None,
            cuj: None,
            acceptance_criteria: vec!["  returns results ".to_string(), "".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_fields() {
        let (svc, tenant, feature_id) = setup().await;
        let requirement = svc.create(tenant, feature_id, req("Fuzzy match")).await.unwrap();
        assert_eq!(requirement.owner, None);
        assert_eq!(requirement.status, RequirementStatus::Draft);
        assert_eq!(requirement.acceptance_criteria, vec!["returns results"]);
    }

    #[tokio::test]
    async fn test_update_clears_owner_with_null() {
        let (svc, tenant, feature_id) = setup().await;
        let requirement = svc.create(tenant, feature_id, req("Fuzzy match")).await.unwrap();

        let owned = svc
            .update(
                tenant,
                requirement.requirement_id,
                UpdateRequirementRequest {
                    owner: Some(Some("ana".to_string())),
                    status: Some(RequirementStatus::Approved),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(owned.owner.as_deref(), Some("ana"));
        assert_eq!(owned.status, RequirementStatus::Approved);

        let cleared: UpdateRequirementRequest =
            serde_json::from_value(serde_json::json!({ "owner": null })).unwrap();
        let cleared = svc
            .update(tenant, requirement.requirement_id, cleared)
            .await
            .unwrap();
        assert_eq!(cleared.owner, None);
        assert_eq!(cleared.status, RequirementStatus::Approved);
    }

    #[tokio::test]
    async fn test_delete_twice_is_404() {
        let (svc, tenant, feature_id) = setup().await;
        let requirement = svc.create(tenant, feature_id, req("Fuzzy match")).await.unwrap();
        svc.delete(tenant, requirement.requirement_id).await.unwrap();
        let err = svc.delete(tenant, requirement.requirement_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }
}
