//! Roadmap REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use keel_core::{Release, Roadmap, RoadmapId};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::{ReleaseService, RoadmapService},
    state::AppState,
    types::{
        CreateRoadmapRequest, DeleteResponse, ListParams, ListResponse, UpdateRoadmapRequest,
    },
};

/// POST /api/v1/roadmaps - Create a roadmap
#[utoipa::path(
    post,
    path = "/api/v1/roadmaps",
    tag = "Roadmaps",
    request_body = CreateRoadmapRequest,
    responses(
        (status = 201, description = "Roadmap created", body = Roadmap),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_roadmap(
    State(svc): State<RoadmapService>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateRoadmapRequest>,
) -> ApiResult<impl IntoResponse> {
    let roadmap = svc.create(auth.tenant_id, req).await?;
    Ok((StatusCode::CREATED, Json(roadmap)))
}

/// GET /api/v1/roadmaps - List roadmaps
#[utoipa::path(
    get,
    path = "/api/v1/roadmaps",
    tag = "Roadmaps",
    params(
        ("limit" = Option<usize>, Query, description = "Page size"),
        ("offset" = Option<usize>, Query, description = "Rows to skip"),
    ),
    responses(
        (status = 200, description = "Page of roadmaps", body = ListResponse<Roadmap>),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_roadmaps(
    State(svc): State<RoadmapService>,
    AuthExtractor(auth): AuthExtractor,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse<Roadmap>>> {
    Ok(Json(svc.list(auth.tenant_id, params).await?))
}

/// GET /api/v1/roadmaps/default - The tenant's default roadmap
#[utoipa::path(
    get,
    path = "/api/v1/roadmaps/default",
    tag = "Roadmaps",
    responses(
        (status = 200, description = "Default roadmap", body = Roadmap),
        (status = 404, description = "No default roadmap", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_default_roadmap(
    State(svc): State<RoadmapService>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<Roadmap>> {
    svc.get_default(auth.tenant_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No default roadmap is set"))
}

/// GET /api/v1/roadmaps/{id} - Get a roadmap
#[utoipa::path(
    get,
    path = "/api/v1/roadmaps/{id}",
    tag = "Roadmaps",
    params(("id" = uuid::Uuid, Path, description = "Roadmap ID")),
    responses(
        (status = 200, description = "Roadmap details", body = Roadmap),
        (status = 404, description = "Roadmap not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_roadmap(
    State(svc): State<RoadmapService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<RoadmapId>,
) -> ApiResult<Json<Roadmap>> {
    Ok(Json(svc.get(auth.tenant_id, id).await?))
}

/// PATCH /api/v1/roadmaps/{id} - Update a roadmap
#[utoipa::path(
    patch,
    path = "/api/v1/roadmaps/{id}",
    tag = "Roadmaps",
    params(("id" = uuid::Uuid, Path, description = "Roadmap ID")),
    request_body = UpdateRoadmapRequest,
    responses(
        (status = 200, description = "Roadmap updated", body = Roadmap),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Roadmap not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_roadmap(
    State(svc): State<RoadmapService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<RoadmapId>,
    Json(req): Json<UpdateRoadmapRequest>,
) -> ApiResult<Json<Roadmap>> {
    Ok(Json(svc.update(auth.tenant_id, id, req).await?))
}

/// DELETE /api/v1/roadmaps/{id} - Delete a roadmap, detaching its releases
#[utoipa::path(
    delete,
    path = "/api/v1/roadmaps/{id}",
    tag = "Roadmaps",
    params(("id" = uuid::Uuid, Path, description = "Roadmap ID")),
    responses(
        (status = 200, description = "Roadmap deleted", body = DeleteResponse),
        (status = 404, description = "Roadmap not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_roadmap(
    State(svc): State<RoadmapService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<RoadmapId>,
) -> ApiResult<Json<DeleteResponse>> {
    Ok(Json(svc.delete(auth.tenant_id, id).await?))
}

/// PUT /api/v1/roadmaps/{id}/default - Make a roadmap the default
#[utoipa::path(
    put,
    path = "/api/v1/roadmaps/{id}/default",
    tag = "Roadmaps",
    params(("id" = uuid::Uuid, Path, description = "Roadmap ID")),
    responses(
        (status = 200, description = "Roadmap is now the default", body = Roadmap),
        (status = 404, description = "Roadmap not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn set_default_roadmap(
    State(svc): State<RoadmapService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<RoadmapId>,
) -> ApiResult<Json<Roadmap>> {
    Ok(Json(svc.set_default(auth.tenant_id, id).await?))
}

/// GET /api/v1/roadmaps/{id}/releases - Releases placed on a roadmap
#[utoipa::path(
    get,
    path = "/api/v1/roadmaps/{id}/releases",
    tag = "Roadmaps",
    params(
        ("id" = uuid::Uuid, Path, description = "Roadmap ID"),
        ("limit" = Option<usize>, Query, description = "Page size"),
        ("offset" = Option<usize>, Query, description = "Rows to skip"),
    ),
    responses(
        (status = 200, description = "Page of releases", body = ListResponse<Release>),
        (status = 404, description = "Roadmap not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_roadmap_releases(
    State(svc): State<ReleaseService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<RoadmapId>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse<Release>>> {
    Ok(Json(svc.list_by_roadmap(auth.tenant_id, id, params).await?))
}

/// Create the roadmap router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roadmaps).post(create_roadmap))
        .route("/default", get(get_default_roadmap))
        .route(
            "/:id",
            get(get_roadmap).patch(update_roadmap).delete(delete_roadmap),
        )
        .route("/:id/default", put(set_default_roadmap))
        .route("/:id/releases", get(list_roadmap_releases))
}
