//! Interface REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use keel_core::{Feature, Interface, InterfaceId};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::{FeatureService, InterfaceService},
    state::AppState,
    types::{
        CreateFeatureRequest, DeleteResponse, ListParams, ListResponse, UpdateInterfaceRequest,
    },
};

/// GET /api/v1/interfaces/{id} - Get an interface
#[utoipa::path(
    get,
    path = "/api/v1/interfaces/{id}",
    tag = "Interfaces",
    params(("id" = uuid::Uuid, Path, description = "Interface ID")),
    responses(
        (status = 200, description = "Interface details", body = Interface),
        (status = 404, description = "Interface not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_interface(
    State(svc): State<InterfaceService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<InterfaceId>,
) -> ApiResult<Json<Interface>> {
    Ok(Json(svc.get(auth.tenant_id, id).await?))
}

/// PATCH /api/v1/interfaces/{id} - Update an interface
#[utoipa::path(
    patch,
    path = "/api/v1/interfaces/{id}",
    tag = "Interfaces",
    params(("id" = uuid::Uuid, Path, description = "Interface ID")),
    request_body = UpdateInterfaceRequest,
    responses(
        (status = 200, description = "Interface updated", body = Interface),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Interface not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_interface(
    State(svc): State<InterfaceService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<InterfaceId>,
    Json(req): Json<UpdateInterfaceRequest>,
) -> ApiResult<Json<Interface>> {
    Ok(Json(svc.update(auth.tenant_id, id, req).await?))
}

/// DELETE /api/v1/interfaces/{id} - Delete an interface and its features
#[utoipa::path(
    delete,
    path = "/api/v1/interfaces/{id}",
    tag = "Interfaces",
    params(("id" = uuid::Uuid, Path, description = "Interface ID")),
    responses(
        (status = 200, description = "Interface deleted", body = DeleteResponse),
        (status = 404, description = "Interface not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_interface(
    State(svc): State<InterfaceService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<InterfaceId>,
) -> ApiResult<Json<DeleteResponse>> {
    Ok(Json(svc.delete(auth.tenant_id, id).await?))
}

/// GET /api/v1/interfaces/{id}/features - List an interface's features
#[utoipa::path(
    get,
    path = "/api/v1/interfaces/{id}/features",
    tag = "Features",
    params(
        ("id" = uuid::Uuid, Path, description = "Interface ID"),
        ("limit" = Option<usize>, Query, description = "Page size"),
        ("offset" = Option<usize>, Query, description = "Rows to skip"),
    ),
    responses(
        (status = 200, description = "Page of features", body = ListResponse<Feature>),
        (status = 404, description = "Interface not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_interface_features(
    State(svc): State<FeatureService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<InterfaceId>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse<Feature>>> {
    Ok(Json(svc.list_by_interface(auth.tenant_id, id, params).await?))
}

/// POST /api/v1/interfaces/{id}/features - Create a feature under an interface
#[utoipa::path(
    post,
    path = "/api/v1/interfaces/{id}/features",
    tag = "Features",
    params(("id" = uuid::Uuid, Path, description = "Interface ID")),
    request_body = CreateFeatureRequest,
    responses(
        (status = 201, description = "Feature created", body = Feature),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Interface not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_interface_feature(
    State(svc): State<FeatureService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<InterfaceId>,
    Json(req): Json<CreateFeatureRequest>,
) -> ApiResult<impl IntoResponse> {
    let feature = svc.create(auth.tenant_id, id, req).await?;
    Ok((StatusCode::CREATED, Json(feature)))
}

/// Create the interface router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            "/:id",
            get(get_interface)
                .patch(update_interface)
                .delete(delete_interface),
        )
        .route(
            "/:id/features",
            get(list_interface_features).post(create_interface_feature),
        )
}
