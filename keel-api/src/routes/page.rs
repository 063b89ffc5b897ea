//! Page REST API Routes
//!
//! Pages form a per-tenant forest. Reads return siblings in `position`
//! order; structural changes go through `/move` so cycles and nesting rules
//! are checked in one place.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use keel_core::{tree::TreeView, Page, PageId};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::PageService,
    state::AppState,
    types::{CreatePageRequest, DeleteResponse, MovePageRequest, UpdatePageRequest},
};

/// `?parent_id=` for the page listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPagesQuery {
    #[serde(default)]
    pub parent_id: Option<PageId>,
}

/// `?root_id=` for the tree view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageTreeQuery {
    #[serde(default)]
    pub root_id: Option<PageId>,
}

/// POST /api/v1/pages - Create a page
#[utoipa::path(
    post,
    path = "/api/v1/pages",
    tag = "Pages",
    request_body = CreatePageRequest,
    responses(
        (status = 201, description = "Page created", body = Page),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Parent page not found", body = ApiError),
        (status = 409, description = "Nesting rule violated", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_page(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreatePageRequest>,
) -> ApiResult<impl IntoResponse> {
    let page = svc.create(auth.tenant_id, req).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

/// GET /api/v1/pages - List top-level pages, or the children of `parent_id`
#[utoipa::path(
    get,
    path = "/api/v1/pages",
    tag = "Pages",
    params(("parent_id" = Option<uuid::Uuid>, Query, description = "Parent page; omit for top level")),
    responses(
        (status = 200, description = "Pages in sibling order", body = Vec<Page>),
        (status = 404, description = "Parent page not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_pages(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Query(query): Query<ListPagesQuery>,
) -> ApiResult<Json<Vec<Page>>> {
    Ok(Json(svc.list_children(auth.tenant_id, query.parent_id).await?))
}

/// GET /api/v1/pages/tree - Nested page tree
#[utoipa::path(
    get,
    path = "/api/v1/pages/tree",
    tag = "Pages",
    params(("root_id" = Option<uuid::Uuid>, Query, description = "Subtree root; omit for the whole forest")),
    responses(
        (status = 200, description = "Nested `{node, children}` objects"),
        (status = 404, description = "Root page not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn page_tree(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Query(query): Query<PageTreeQuery>,
) -> ApiResult<Json<Vec<TreeView<Page>>>> {
    Ok(Json(svc.tree(auth.tenant_id, query.root_id).await?))
}

/// GET /api/v1/pages/{id} - Get a page
#[utoipa::path(
    get,
    path = "/api/v1/pages/{id}",
    tag = "Pages",
    params(("id" = uuid::Uuid, Path, description = "Page ID")),
    responses(
        (status = 200, description = "Page details", body = Page),
        (status = 404, description = "Page not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_page(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<PageId>,
) -> ApiResult<Json<Page>> {
    Ok(Json(svc.get(auth.tenant_id, id).await?))
}

/// PATCH /api/v1/pages/{id} - Update title, properties or blocks
#[utoipa::path(
    patch,
    path = "/api/v1/pages/{id}",
    tag = "Pages",
    params(("id" = uuid::Uuid, Path, description = "Page ID")),
    request_body = UpdatePageRequest,
    responses(
        (status = 200, description = "Page updated", body = Page),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Page not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_page(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<PageId>,
    Json(req): Json<UpdatePageRequest>,
) -> ApiResult<Json<Page>> {
    Ok(Json(svc.update(auth.tenant_id, id, req).await?))
}

/// DELETE /api/v1/pages/{id} - Delete a page and its subtree
#[utoipa::path(
    delete,
    path = "/api/v1/pages/{id}",
    tag = "Pages",
    params(("id" = uuid::Uuid, Path, description = "Page ID")),
    responses(
        (status = 200, description = "Page deleted", body = DeleteResponse),
        (status = 404, description = "Page not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_page(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<PageId>,
) -> ApiResult<Json<DeleteResponse>> {
    Ok(Json(svc.delete(auth.tenant_id, id).await?))
}

/// GET /api/v1/pages/{id}/children - Direct children of a page
#[utoipa::path(
    get,
    path = "/api/v1/pages/{id}/children",
    tag = "Pages",
    params(("id" = uuid::Uuid, Path, description = "Page ID")),
    responses(
        (status = 200, description = "Children in sibling order", body = Vec<Page>),
        (status = 404, description = "Page not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_page_children(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<PageId>,
) -> ApiResult<Json<Vec<Page>>> {
    Ok(Json(svc.list_children(auth.tenant_id, Some(id)).await?))
}

/// GET /api/v1/pages/{id}/ancestors - Breadcrumb from the top level down
#[utoipa::path(
    get,
    path = "/api/v1/pages/{id}/ancestors",
    tag = "Pages",
    params(("id" = uuid::Uuid, Path, description = "Page ID")),
    responses(
        (status = 200, description = "Ancestors, root first", body = Vec<Page>),
        (status = 404, description = "Page not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_page_ancestors(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<PageId>,
) -> ApiResult<Json<Vec<Page>>> {
    Ok(Json(svc.ancestors(auth.tenant_id, id).await?))
}

/// POST /api/v1/pages/{id}/move - Re-parent and/or reposition a page
#[utoipa::path(
    post,
    path = "/api/v1/pages/{id}/move",
    tag = "Pages",
    params(("id" = uuid::Uuid, Path, description = "Page ID")),
    request_body = MovePageRequest,
    responses(
        (status = 200, description = "Page moved", body = Page),
        (status = 404, description = "Page or parent not found", body = ApiError),
        (status = 409, description = "Move would create a cycle or break nesting rules", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn move_page(
    State(svc): State<PageService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<PageId>,
    Json(req): Json<MovePageRequest>,
) -> ApiResult<Json<Page>> {
    Ok(Json(svc.move_page(auth.tenant_id, id, req).await?))
}

/// Create the page router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pages).post(create_page))
        .route("/tree", get(page_tree))
        .route(
            "/:id",
            get(get_page).patch(update_page).delete(delete_page),
        )
        .route("/:id/children", get(list_page_children))
        .route("/:id/ancestors", get(list_page_ancestors))
        .route("/:id/move", post(move_page))
}
