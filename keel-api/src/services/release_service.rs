//! Release Service

use std::sync::Arc;

use chrono::Utc;
use keel_core::validation::{validate_description, validate_name};
use keel_core::{Feature, FeatureId, Record, Release, ReleaseId, Roadmap, RoadmapId, TenantId};
use keel_storage::{RecordQuery, RecordStore, RecordStoreExt};

use super::{list_page, paginate, save, updated_description, updated_name};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    CreateReleaseRequest, DeleteResponse, ListParams, ListResponse, UpdateReleaseRequest,
};

#[derive(Clone)]
pub struct ReleaseService {
    store: Arc<dyn RecordStore>,
}

impl ReleaseService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn require_roadmap(&self, tenant_id: TenantId, roadmap_id: RoadmapId) -> ApiResult<()> {
        self.store
            .require_record::<Roadmap>(tenant_id, roadmap_id.as_uuid())
            .await?;
        Ok(())
    }

    /// Create a release under a feature, optionally on an existing roadmap.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        feature_id: FeatureId,
        req: CreateReleaseRequest,
    ) -> ApiResult<Release> {
        self.store
            .require_record::<Feature>(tenant_id, feature_id.as_uuid())
            .await?;
        if let Some(roadmap_id) = req.roadmap_id {
            self.require_roadmap(tenant_id, roadmap_id).await?;
        }

        let now = Utc::now();
        let release = Release {
            release_id: ReleaseId::now_v7(),
            tenant_id,
            feature_id,
            roadmap_id: req.roadmap_id,
            name: validate_name("name", &req.name)?,
            description: validate_description("description", &req.description)?,
            target_date: req.target_date,
            priority: req.priority.unwrap_or_default(),
            status: req.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&release).await?;
        tracing::info!(%tenant_id, %feature_id, release_id = %release.release_id, "Release created");
        Ok(release)
    }

    pub async fn get(&self, tenant_id: TenantId, release_id: ReleaseId) -> ApiResult<Release> {
        Ok(self
            .store
            .require_record::<Release>(tenant_id, release_id.as_uuid())
            .await?)
    }

    pub async fn list_by_feature(
        &self,
        tenant_id: TenantId,
        feature_id: FeatureId,
        params: ListParams,
    ) -> ApiResult<ListResponse<Release>> {
        self.store
            .require_record::<Feature>(tenant_id, feature_id.as_uuid())
            .await?;
        list_page(self.store.as_ref(), tenant_id, Some(feature_id.as_uuid()), params).await
    }

    /// Releases grouped under a roadmap, across all features.
    pub async fn list_by_roadmap(
        &self,
        tenant_id: TenantId,
        roadmap_id: RoadmapId,
        params: ListParams,
    ) -> ApiResult<ListResponse<Release>> {
        self.require_roadmap(tenant_id, roadmap_id).await?;
        let releases = self
            .store
            .list_records::<Release>(tenant_id, &RecordQuery::all())
            .await?
            .into_iter()
            .filter(|r| r.roadmap_id == Some(roadmap_id))
            .collect();
        Ok(paginate(releases, params))
    }

    pub async fn update(
        &self,
        tenant_id: TenantId,
        release_id: ReleaseId,
        req: UpdateReleaseRequest,
    ) -> ApiResult<Release> {
        let mut release = self.get(tenant_id, release_id).await?;

        updated_name(&mut release.name, req.name.as_ref())?;
        updated_description(&mut release.description, req.description.as_ref())?;
        if let Some(roadmap_id) = req.roadmap_id {
            if let Some(id) = roadmap_id {
                self.require_roadmap(tenant_id, id).await?;
            }
            release.roadmap_id = roadmap_id;
        }
        if let Some(target_date) = req.target_date {
            release.target_date = target_date;
        }
        if let Some(priority) = req.priority {
            release.priority = priority;
        }
        if let Some(status) = req.status {
            release.status = status;
        }

        release.touch(Utc::now());
        save(self.store.as_ref(), &release).await?;
        Ok(release)
    }

    pub async fn delete(&self, tenant_id: TenantId, release_id: ReleaseId) -> ApiResult<DeleteResponse> {
        if !self
            .store
            .delete_record::<Release>(tenant_id, release_id.as_uuid())
            .await?
        {
            return Err(ApiError::entity_not_found("Release", release_id));
        }
        tracing::info!(%tenant_id, %release_id, "Release deleted");
        Ok(DeleteResponse {
            deleted: 1,
            ..DeleteResponse::default()
        })
    }
}
