//! Product REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use keel_core::{Interface, Product, ProductId};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::{InterfaceService, ProductService},
    state::AppState,
    types::{
        CreateInterfaceRequest, CreateProductRequest, DeleteResponse, ListParams, ListResponse,
        UpdateProductRequest,
    },
};

/// POST /api/v1/products - Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    tag = "Products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_product(
    State(svc): State<ProductService>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<impl IntoResponse> {
    let product = svc.create(auth.tenant_id, req).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/v1/products - List products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "Products",
    params(
        ("limit" = Option<usize>, Query, description = "Page size (default 100, max 1000)"),
        ("offset" = Option<usize>, Query, description = "Rows to skip"),
    ),
    responses(
        (status = 200, description = "Page of products", body = ListResponse<Product>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_products(
    State(svc): State<ProductService>,
    AuthExtractor(auth): AuthExtractor,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse<Product>>> {
    Ok(Json(svc.list(auth.tenant_id, params).await?))
}

/// GET /api/v1/products/{id} - Get a product
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    tag = "Products",
    params(("id" = uuid::Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product details", body = Product),
        (status = 404, description = "Product not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn get_product(
    State(svc): State<ProductService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<Product>> {
    Ok(Json(svc.get(auth.tenant_id, id).await?))
}

/// PATCH /api/v1/products/{id} - Update a product
#[utoipa::path(
    patch,
    path = "/api/v1/products/{id}",
    tag = "Products",
    params(("id" = uuid::Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Product not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn update_product(
    State(svc): State<ProductService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ProductId>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    Ok(Json(svc.update(auth.tenant_id, id, req).await?))
}

/// DELETE /api/v1/products/{id} - Delete a product and everything under it
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    tag = "Products",
    params(("id" = uuid::Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted", body = DeleteResponse),
        (status = 404, description = "Product not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn delete_product(
    State(svc): State<ProductService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<DeleteResponse>> {
    Ok(Json(svc.delete(auth.tenant_id, id).await?))
}

/// GET /api/v1/products/{id}/interfaces - List a product's interfaces
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/interfaces",
    tag = "Interfaces",
    params(
        ("id" = uuid::Uuid, Path, description = "Product ID"),
        ("limit" = Option<usize>, Query, description = "Page size"),
        ("offset" = Option<usize>, Query, description = "Rows to skip"),
    ),
    responses(
        (status = 200, description = "Page of interfaces", body = ListResponse<Interface>),
        (status = 404, description = "Product not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn list_product_interfaces(
    State(svc): State<InterfaceService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ProductId>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse<Interface>>> {
    Ok(Json(svc.list_by_product(auth.tenant_id, id, params).await?))
}

/// POST /api/v1/products/{id}/interfaces - Create an interface under a product
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/interfaces",
    tag = "Interfaces",
    params(("id" = uuid::Uuid, Path, description = "Product ID")),
    request_body = CreateInterfaceRequest,
    responses(
        (status = 201, description = "Interface created", body = Interface),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Product not found", body = ApiError),
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
pub async fn create_product_interface(
    State(svc): State<InterfaceService>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ProductId>,
    Json(req): Json<CreateInterfaceRequest>,
) -> ApiResult<impl IntoResponse> {
    let interface = svc.create(auth.tenant_id, id, req).await?;
    Ok((StatusCode::CREATED, Json(interface)))
}

/// Create the product router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route(
            "/:id/interfaces",
            get(list_product_interfaces).post(create_product_interface),
        )
}
