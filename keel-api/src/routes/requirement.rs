//! Requirement REST API Routes

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use keel_core::{Requirement, RequirementId};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::RequirementService,
    state::AppState,
    types::{DeleteResponse, UpdateRequirementRequest},
};

/// GET /api/v1/requirements/{id} - Get a requirement
#[utoipa::path(
    get,
    path = "/api/v1/requirements/{id}",
    tag = "Requirements",
    params(("id" = uuid::Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Requirement details", body = Requirement),
        (status = 404, description = "Requirement not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_requirement(
    State(svc): State<RequirementService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<RequirementId>,
) -> ApiResult<Json<Requirement>> {
    Ok(Json(svc.get(auth.tenant_id, id).await?))
}

/// PATCH /api/v1/requirements/{id} - Update a requirement
///
/// `null` for `owner` or `cuj` clears the field.
#[utoipa::path(
    patch,
    path = "/api/v1/requirements/{id}",
    tag = "Requirements",
    params(("id" = uuid::Uuid, Path, description = "Requirement ID")),
    request_body = UpdateRequirementRequest,
    responses(
        (status = 200, description = "Requirement updated", body = Requirement),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Requirement not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_requirement(
    State(svc): State<RequirementService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<RequirementId>,
    Json(req): Json<UpdateRequirementRequest>,
) -> ApiResult<Json<Requirement>> {
    Ok(Json(svc.update(auth.tenant_id, id, req).await?))
}

/// DELETE /api/v1/requirements/{id} - Delete a requirement
#[utoipa::path(
    delete,
    path = "/api/v1/requirements/{id}",
    tag = "Requirements",
    params(("id" = uuid::Uuid, Path, description = "Requirement ID")),
    responses(
        (status = 200, description = "Requirement deleted", body = DeleteResponse),
        (status = 404, description = "Requirement not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_requirement(
    State(svc): State<RequirementService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<RequirementId>,
) -> ApiResult<Json<DeleteResponse>> {
    Ok(Json(svc.delete(auth.tenant_id, id).await?))
}

/// Create the requirement router.
pub fn create_router() -> Router<AppState> {
    Router::new().route(
        "/:id",
        get(get_requirement).patch(update_requirement).delete(delete_requirement),
    )
}
