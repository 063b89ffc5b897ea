//! REST API Routes Module
//!
//! Route handlers organized by entity type, plus:
//! - Health checks (Kubernetes-compatible, public)
//! - Prometheus metrics (public)
//! - OpenAPI document and optional Swagger UI
//! - The assistant endpoints under `/api/v1/agent`

pub mod agent;
pub mod feature;
pub mod health;
pub mod interface;
pub mod page;
pub mod product;
pub mod release;
pub mod requirement;
pub mod roadmap;

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    BoxError, Json, Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthMiddlewareState};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Entity and assistant routes mounted under `/api/v1`.
fn entity_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product::create_router())
        .nest("/interfaces", interface::create_router())
        .nest("/features", feature::create_router())
        .nest("/requirements", requirement::create_router())
        .nest("/releases", release::create_router())
        .nest("/roadmaps", roadmap::create_router())
        .nest("/pages", page::create_router())
        .nest("/agent", agent::create_router())
}

/// Create the complete API router.
///
/// - All `/api/v1/*` routes require authentication (API key or JWT) and a tenant
/// - `/health/*`, `/metrics` and `/openapi.json` are public
/// - Swagger UI at `/swagger-ui` when the `swagger-ui` feature is enabled
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. Trace - one span per request
/// 3. Observability - request metrics and the `http_request` span
/// 4. Timeout - `request_timeout` from [`ApiConfig`], answered with 504
/// 5. Auth (only on /api/v1/*)
pub fn create_api_router(
    state: AppState,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    // Restricted CORS marks a production deployment.
    auth_config.validate_for_environment(api_config.is_production())?;

    let auth_state = AuthMiddlewareState::new(auth_config);
    let api_routes = entity_routes().layer(from_fn_with_state(auth_state, auth_middleware));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()));
    }

    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_timeout_error))
        .timeout(api_config.request_timeout);

    Ok(router
        .with_state(state)
        .layer(timeout)
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config)))
}

async fn handle_timeout_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::timeout("request")
    } else {
        ApiError::internal_error(format!("Unhandled middleware error: {}", err))
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// With no configured origins every origin is allowed (development).
/// Otherwise origins are matched by [`ApiConfig::is_origin_allowed`], which
/// also accepts `*.domain` entries for https subdomains.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-tenant-id"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricted origins");
        let allowed = config.clone();
        let cors = cors.allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &axum::http::request::Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| allowed.is_origin_allowed(origin))
            },
        ));

        if config.cors_allow_credentials {
            cors.allow_credentials(true)
        } else {
            cors
        }
    }
}
