//! Roadmap Service
//!
//! Roadmaps group releases across features. At most one roadmap per tenant
//! is the default; changes to the default flag are serialized so two
//! concurrent `set_default` calls cannot both win.

use std::sync::Arc;

use chrono::Utc;
use keel_core::validation::{validate_description, validate_name};
use keel_core::{Record, Release, Roadmap, RoadmapId, TenantId, Timestamp};
use keel_storage::{RecordQuery, RecordStore, RecordStoreExt};
use tokio::sync::Mutex;

use super::{list_page, save, updated_description, updated_name};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    CreateRoadmapRequest, DeleteResponse, ListParams, ListResponse, UpdateRoadmapRequest,
};

#[derive(Clone)]
pub struct RoadmapService {
    store: Arc<dyn RecordStore>,
    default_lock: Arc<Mutex<()>>,
}

impl RoadmapService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            default_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn create(&self, tenant_id: TenantId, req: CreateRoadmapRequest) -> ApiResult<Roadmap> {
        let now = Utc::now();
        let roadmap = Roadmap {
            roadmap_id: RoadmapId::now_v7(),
            tenant_id,
            name: validate_name("name", &req.name)?,
            description: validate_description("description", &req.description)?,
            is_default: false,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&roadmap).await?;
        tracing::info!(%tenant_id, roadmap_id = %roadmap.roadmap_id, "Roadmap created");

        if req.is_default {
            return self.set_default(tenant_id, roadmap.roadmap_id).await;
        }
        Ok(roadmap)
    }

    pub async fn get(&self, tenant_id: TenantId, roadmap_id: RoadmapId) -> ApiResult<Roadmap> {
        Ok(self
            .store
            .require_record::<Roadmap>(tenant_id, roadmap_id.as_uuid())
            .await?)
    }

    pub async fn list(&self, tenant_id: TenantId, params: ListParams) -> ApiResult<ListResponse<Roadmap>> {
        list_page(self.store.as_ref(), tenant_id, None, params).await
    }

    pub async fn update(
        &self,
        tenant_id: TenantId,
        roadmap_id: RoadmapId,
        req: UpdateRoadmapRequest,
    ) -> ApiResult<Roadmap> {
        // Re-read under the default lock so a stale `is_default` is never saved.
        let _guard = self.default_lock.lock().await;
        let mut roadmap = self.get(tenant_id, roadmap_id).await?;
        updated_name(&mut roadmap.name, req.name.as_ref())?;
        updated_description(&mut roadmap.description, req.description.as_ref())?;
        roadmap.touch(Utc::now());
        save(self.store.as_ref(), &roadmap).await?;
        Ok(roadmap)
    }

    /// Make `roadmap_id` the tenant's only default roadmap.
    pub async fn set_default(&self, tenant_id: TenantId, roadmap_id: RoadmapId) -> ApiResult<Roadmap> {
        let _guard = self.default_lock.lock().await;
        let mut target = self.get(tenant_id, roadmap_id).await?;
        let now = Utc::now();

        let roadmaps = self
            .store
            .list_records::<Roadmap>(tenant_id, &RecordQuery::all())
            .await?;
        for mut other in roadmaps
            .into_iter()
            .filter(|r| r.is_default && r.roadmap_id != roadmap_id)
        {
            other.is_default = false;
            other.touch(now);
            save(self.store.as_ref(), &other).await?;
            tracing::debug!(%tenant_id, roadmap_id = %other.roadmap_id, "Default roadmap cleared");
        }

        if !target.is_default {
            target.is_default = true;
            target.touch(now);
            save(self.store.as_ref(), &target).await?;
        }
        tracing::info!(%tenant_id, %roadmap_id, "Default roadmap set");
        Ok(target)
    }

    /// The tenant's default roadmap, if any.
    pub async fn get_default(&self, tenant_id: TenantId) -> ApiResult<Option<Roadmap>> {
        Ok(self
            .store
            .list_records::<Roadmap>(tenant_id, &RecordQuery::all())
            .await?
            .into_iter()
            .find(|r| r.is_default))
    }

    /// Delete the roadmap. Its releases stay on their features with
    /// `roadmap_id` cleared.
    pub async fn delete(&self, tenant_id: TenantId, roadmap_id: RoadmapId) -> ApiResult<DeleteResponse> {
        self.get(tenant_id, roadmap_id).await?;
        let detached = detach_releases(self.store.as_ref(), tenant_id, roadmap_id, Utc::now()).await?;

        if !self
            .store
            .delete_record::<Roadmap>(tenant_id, roadmap_id.as_uuid())
            .await?
        {
            return Err(ApiError::entity_not_found("Roadmap", roadmap_id));
        }
        tracing::info!(%tenant_id, %roadmap_id, detached, "Roadmap deleted");
        Ok(DeleteResponse {
            deleted: 1,
            detached,
            ..DeleteResponse::default()
        })
    }
}

async fn detach_releases(
    store: &dyn RecordStore,
    tenant_id: TenantId,
    roadmap_id: RoadmapId,
    now: Timestamp,
) -> ApiResult<u64> {
    let releases = store
        .list_records::<Release>(tenant_id, &RecordQuery::all())
        .await?;
    let mut detached = 0;
    for mut release in releases
        .into_iter()
        .filter(|r| r.roadmap_id == Some(roadmap_id))
    {
        release.roadmap_id = None;
        release.touch(now);
        save(store, &release).await?;
        detached += 1;
    }
    Ok(detached)
}
