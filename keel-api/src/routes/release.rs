//! Release REST API Routes

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use keel_core::{Release, ReleaseId};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::ReleaseService,
    state::AppState,
    types::{DeleteResponse, UpdateReleaseRequest},
};

/// GET /api/v1/releases/{id} - Get a release
#[utoipa::path(
    get,
    path = "/api/v1/releases/{id}",
    tag = "Releases",
    params(("id" = uuid::Uuid, Path, description = "Release ID")),
    responses(
        (status = 200, description = "Release details", body = Release),
        (status = 404, description = "Release not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_release(
    State(svc): State<ReleaseService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ReleaseId>,
) -> ApiResult<Json<Release>> {
    Ok(Json(svc.get(auth.tenant_id, id).await?))
}

/// PATCH /api/v1/releases/{id} - Update a release
///
/// `"roadmap_id": null` detaches the release from its roadmap.
#[utoipa::path(
    patch,
    path = "/api/v1/releases/{id}",
    tag = "Releases",
    params(("id" = uuid::Uuid, Path, description = "Release ID")),
    request_body = UpdateReleaseRequest,
    responses(
        (status = 200, description = "Release updated", body = Release),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Release not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_release(
    State(svc): State<ReleaseService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ReleaseId>,
    Json(req): Json<UpdateReleaseRequest>,
) -> ApiResult<Json<Release>> {
    Ok(Json(svc.update(auth.tenant_id, id, req).await?))
}

/// DELETE /api/v1/releases/{id} - Delete a release
#[utoipa::path(
    delete,
    path = "/api/v1/releases/{id}",
    tag = "Releases",
    params(("id" = uuid::Uuid, Path, description = "Release ID")),
    responses(
        (status = 200, description = "Release deleted", body = DeleteResponse),
        (status = 404, description = "Release not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_release(
    State(svc): State<ReleaseService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ReleaseId>,
) -> ApiResult<Json<DeleteResponse>> {
    Ok(Json(svc.delete(auth.tenant_id, id).await?))
}

/// Create the release router.
pub fn create_router() -> Router<AppState> {
    Router::new().route(
        "/:id",
        get(get_release).patch(update_release).delete(delete_release),
    )
}
