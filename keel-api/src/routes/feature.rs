//! Feature REST API Routes
//!
//! A feature's requirements and releases are created and listed through the
//! feature itself; they are addressed directly by id afterwards.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use keel_core::{Feature, FeatureId, Release, Requirement};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::{FeatureService, ReleaseService, RequirementService},
    state::AppState,
    types::{
        CreateReleaseRequest, CreateRequirementRequest, DeleteResponse, ListParams, ListResponse,
        UpdateFeatureRequest,
    },
};

/// GET /api/v1/features/{id} - Get a feature
#[utoipa::path(
    get,
    path = "/api/v1/features/{id}",
    tag = "Features",
    params(("id" = uuid::Uuid, Path, description = "Feature ID")),
    responses(
        (status = 200, description = "Feature details", body = Feature),
        (status = 404, description = "Feature not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_feature(
    State(svc): State<FeatureService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<FeatureId>,
) -> ApiResult<Json<Feature>> {
    Ok(Json(svc.get(auth.tenant_id, id).await?))
}

/// PATCH /api/v1/features/{id} - Update a feature
#[utoipa::path(
    patch,
    path = "/api/v1/features/{id}",
    tag = "Features",
    params(("id" = uuid::Uuid, Path, description = "Feature ID")),
    request_body = UpdateFeatureRequest,
    responses(
        (status = 200, description = "Feature updated", body = Feature),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Feature not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_feature(
    State(svc): State<FeatureService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<FeatureId>,
    Json(req): Json<UpdateFeatureRequest>,
) -> ApiResult<Json<Feature>> {
    Ok(Json(svc.update(auth.tenant_id, id, req).await?))
}

/// DELETE /api/v1/features/{id} - Delete a feature with its requirements and releases
#[utoipa::path(
    delete,
    path = "/api/v1/features/{id}",
    tag = "Features",
    params(("id" = uuid::Uuid, Path, description = "Feature ID")),
    responses(
        (status = 200, description = "Feature deleted", body = DeleteResponse),
        (status = 404, description = "Feature not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_feature(
    State(svc): State<FeatureService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<FeatureId>,
) -> ApiResult<Json<DeleteResponse>> {
    Ok(Json(svc.delete(auth.tenant_id, id).await?))
}

/// GET /api/v1/features/{id}/requirements - List a feature's requirements
#[utoipa::path(
    get,
    path = "/api/v1/features/{id}/requirements",
    tag = "Requirements",
    params(
        ("id" = uuid::Uuid, Path, description = "Feature ID"),
        ("limit" = Option<usize>, Query, description = "Page size"),
        ("offset" = Option<usize>, Query, description = "Rows to skip"),
    ),
    responses(
        (status = 200, description = "Page of requirements", body = ListResponse<Requirement>),
        (status = 404, description = "Feature not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_feature_requirements(
    State(svc): State<RequirementService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<FeatureId>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse<Requirement>>> {
    Ok(Json(svc.list_by_feature(auth.tenant_id, id, params).await?))
}

/// POST /api/v1/features/{id}/requirements - Create a requirement under a feature
#[utoipa::path(
    post,
    path = "/api/v1/features/{id}/requirements",
    tag = "Requirements",
    params(("id" = uuid::Uuid, Path, description = "Feature ID")),
    request_body = CreateRequirementRequest,
    responses(
        (status = 201, description = "Requirement created", body = Requirement),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Feature not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_feature_requirement(
    State(svc): State<RequirementService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<FeatureId>,
    Json(req): Json<CreateRequirementRequest>,
) -> ApiResult<impl IntoResponse> {
    let requirement = svc.create(auth.tenant_id, id, req).await?;
    Ok((StatusCode::CREATED, Json(requirement)))
}

/// GET /api/v1/features/{id}/releases - List a feature's releases
#[utoipa::path(
    get,
    path = "/api/v1/features/{id}/releases",
    tag = "Releases",
    params(
        ("id" = uuid::Uuid, Path, description = "Feature ID"),
        ("limit" = Option<usize>, Query, description = "Page size"),
        ("offset" = Option<usize>, Query, description = "Rows to skip"),
    ),
    responses(
        (status = 200, description = "Page of releases", body = ListResponse<Release>),
        (status = 404, description = "Feature not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_feature_releases(
    State(svc): State<ReleaseService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<FeatureId>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse<Release>>> {
    Ok(Json(svc.list_by_feature(auth.tenant_id, id, params).await?))
}

/// POST /api/v1/features/{id}/releases - Create a release of a feature
#[utoipa::path(
    post,
    path = "/api/v1/features/{id}/releases",
    tag = "Releases",
    params(("id" = uuid::Uuid, Path, description = "Feature ID")),
    request_body = CreateReleaseRequest,
    responses(
        (status = 201, description = "Release created", body = Release),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Feature or roadmap not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_feature_release(
    State(svc): State<ReleaseService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<FeatureId>,
    Json(req): Json<CreateReleaseRequest>,
) -> ApiResult<impl IntoResponse> {
    let release = svc.create(auth.tenant_id, id, req).await?;
    Ok((StatusCode::CREATED, Json(release)))
}

/// Create the feature router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            "/:id",
            get(get_feature).patch(update_feature).delete(delete_feature),
        )
        .route(
            "/:id/requirements",
            get(list_feature_requirements).post(create_feature_requirement),
        )
        .route(
            "/:id/releases",
            get(list_feature_releases).post(create_feature_release),
        )
}
