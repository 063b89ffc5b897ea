//! Axum Middleware for Authentication
//!
//! `auth_middleware` authenticates every request under `/api/v1`, resolves the
//! tenant and injects an [`AuthContext`] into the request extensions. Handlers
//! read it back through [`AuthExtractor`].

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Authenticate the request and inject its [`AuthContext`].
///
/// Fails with 401 for missing or bad credentials, 403 when the token's
/// tenant disagrees with `X-Tenant-ID`, and 400 for a malformed tenant header.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth_context = authenticate(
        &state.auth_config,
        header(&request, "x-api-key"),
        header(&request, "authorization"),
        header(&request, "x-tenant-id"),
    )
    .map_err(AuthMiddlewareError)?;

    tracing::Span::current().record("tenant_id", tracing::field::display(auth_context.tenant_id));
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|h| h.to_str().ok())
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware rejections.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed extractor for the authenticated context.
///
/// Requires `auth_middleware` on the route; without it extraction fails with 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext not found in request extensions",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
