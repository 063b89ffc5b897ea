//! Request authentication.
//!
//! A request carries either an `X-API-Key` header or an HS256 bearer token.
//! The tenant comes from the X-Tenant-ID header or the JWT `tenant_id` claim.
//! When both are present they must agree.

use crate::error::{ApiError, ApiResult};
use keel_core::{ConfigError, KeelError, TenantId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for JWT time checks.
///
/// `jsonwebtoken`'s own exp/nbf validation is disabled; times are checked
/// against this clock so tests can pin "now".
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Pinned clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

// ============================================================================
// JWT SECRET
// ============================================================================

/// JWT signing secret. `Debug` never prints the value.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Returns an error if the secret is empty.
    pub fn new(secret: String) -> Result<Self, KeelError> {
        if secret.is_empty() {
            return Err(KeelError::Config(ConfigError::MissingRequired {
                field: "jwt_secret".to_string(),
            }));
        }
        Ok(Self(SecretString::from(secret)))
    }

    /// Expose the secret value (only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

fn build_jwt_secret(secret_str: Option<String>) -> JwtSecret {
    let normalized = secret_str
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| INSECURE_DEFAULT_SECRET.to_string());
    JwtSecret(SecretString::from(normalized))
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Accepted API keys and JWT settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// Valid API keys.
    pub api_keys: HashSet<String>,

    pub jwt_secret: JwtSecret,

    /// JWT algorithm (HS256).
    pub jwt_algorithm: Algorithm,

    /// Lifetime of issued tokens in seconds (default: 1 hour).
    pub jwt_expiration_secs: i64,

    /// Clock skew tolerance in seconds (default: 60).
    pub jwt_clock_skew_secs: i64,

    /// Whether a tenant must be supplied. When false the nil tenant is used.
    pub require_tenant_header: bool,

    /// Clock for JWT time validation.
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format!("[{} keys]", self.api_keys.len()))
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("require_tenant_header", &self.require_tenant_header)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: HashSet::new(),
            jwt_secret: build_jwt_secret(None),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            require_tenant_header: true,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Load from the environment.
    ///
    /// # Environment Variables
    /// - `KEEL_API_KEYS`: Comma-separated list of valid API keys
    /// - `KEEL_JWT_SECRET`: JWT signing secret
    /// - `KEEL_JWT_EXPIRATION_SECS`: JWT token expiration (default: 3600)
    /// - `KEEL_JWT_CLOCK_SKEW_SECS`: JWT clock skew tolerance (default: 60)
    /// - `KEEL_REQUIRE_TENANT_HEADER`: Whether a tenant is required (default: true)
    pub fn from_env() -> Self {
        let api_keys = std::env::var("KEEL_API_KEYS")
            .map(|keys| {
                keys.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            api_keys,
            jwt_secret: build_jwt_secret(std::env::var("KEEL_JWT_SECRET").ok()),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: std::env::var("KEEL_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            jwt_clock_skew_secs: std::env::var("KEEL_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            require_tenant_header: std::env::var("KEEL_REQUIRE_TENANT_HEADER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            clock: Arc::new(SystemClock),
        }
    }

    /// Refuse insecure secrets in production; warn otherwise.
    pub fn validate_for_environment(&self, is_production: bool) -> ApiResult<()> {
        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(
                    "Cannot start in production with the default JWT secret; set KEEL_JWT_SECRET",
                ));
            }
            tracing::warn!("Using the default JWT secret; set KEEL_JWT_SECRET before deploying");
        } else if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars, need 32)",
                    self.jwt_secret.len()
                )));
            }
            tracing::warn!(
                chars = self.jwt_secret.len(),
                "JWT secret is shorter than 32 characters"
            );
        }
        Ok(())
    }

    pub fn add_api_key(&mut self, key: String) {
        self.api_keys.insert(key);
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.api_keys.contains(key)
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at, epoch seconds
    pub iat: i64,

    /// Expires at, epoch seconds
    pub exp: i64,

    /// Tenant the user belongs to
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    pub fn new(
        user_id: String,
        tenant_id: Option<TenantId>,
        expiration_secs: i64,
        clock: &dyn JwtClock,
    ) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: user_id,
            iat: now,
            exp: now + expiration_secs,
            tenant_id: tenant_id.map(|id| id.to_string()),
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles.extend(roles);
        self
    }

    /// Get the tenant ID claim, if present and well-formed.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
            .as_ref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(TenantId::new)
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// How the caller proved who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Jwt,
}

/// Authentication context injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (JWT sub claim or API key identifier)
    pub user_id: String,

    pub tenant_id: TenantId,

    pub roles: Vec<String>,

    pub auth_method: AuthMethod,
}

impl AuthContext {
    pub fn new(
        user_id: String,
        tenant_id: TenantId,
        roles: Vec<String>,
        auth_method: AuthMethod,
    ) -> Self {
        Self {
            user_id,
            tenant_id,
            roles,
            auth_method,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

pub fn validate_api_key(config: &AuthConfig, api_key: &str) -> ApiResult<()> {
    if config.is_valid_api_key(api_key) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Invalid API key"))
    }
}

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Validate a JWT signature, then its expiry against the configured clock.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();
    if now < 0 {
        tracing::error!(timestamp = now, "System clock returned pre-epoch time");
        return Err(ApiError::internal_error("Server time configuration error"));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;
    Ok(claims)
}

/// Issue a signed token for a user.
pub fn generate_jwt_token(
    config: &AuthConfig,
    user_id: String,
    tenant_id: Option<TenantId>,
    roles: Vec<String>,
) -> ApiResult<String> {
    let claims = Claims::new(user_id, tenant_id, config.jwt_expiration_secs, &*config.clock)
        .with_roles(roles);

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    encode(&Header::new(config.jwt_algorithm), &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Parse the X-Tenant-ID header.
pub fn extract_tenant_id(header_value: &str) -> ApiResult<TenantId> {
    header_value
        .trim()
        .parse::<TenantId>()
        .map_err(|_| ApiError::invalid_format("X-Tenant-ID", "valid UUID"))
}

fn fallback_tenant(config: &AuthConfig, missing: &str) -> ApiResult<TenantId> {
    if config.require_tenant_header {
        Err(ApiError::missing_field(missing))
    } else {
        Ok(TenantId::nil())
    }
}

pub fn authenticate_api_key(
    config: &AuthConfig,
    api_key: &str,
    tenant_id_header: Option<&str>,
) -> ApiResult<AuthContext> {
    validate_api_key(config, api_key)?;

    let tenant_id = match tenant_id_header {
        Some(header) => extract_tenant_id(header)?,
        None => fallback_tenant(config, "X-Tenant-ID")?,
    };

    let prefix: String = api_key.chars().take(8).collect();
    Ok(AuthContext::new(
        format!("api_key_{}", prefix),
        tenant_id,
        vec!["api_user".to_string()],
        AuthMethod::ApiKey,
    ))
}

pub fn authenticate_jwt(
    config: &AuthConfig,
    token: &str,
    tenant_id_header: Option<&str>,
) -> ApiResult<AuthContext> {
    let claims = validate_jwt_token(config, token)?;

    let header_tenant = tenant_id_header.map(extract_tenant_id).transpose()?;
    let tenant_id = match (header_tenant, claims.tenant_id()) {
        (Some(header), Some(claim)) if header != claim => {
            return Err(ApiError::forbidden(format!(
                "Access denied to tenant {}",
                header
            )));
        }
        (Some(header), _) => header,
        (None, Some(claim)) => claim,
        (None, None) => fallback_tenant(config, "X-Tenant-ID or JWT tenant_id claim")?,
    };

    Ok(AuthContext::new(
        claims.sub,
        tenant_id,
        claims.roles,
        AuthMethod::Jwt,
    ))
}

/// Authenticate with the API key if present, otherwise with the bearer token.
pub fn authenticate(
    config: &AuthConfig,
    api_key_header: Option<&str>,
    auth_header: Option<&str>,
    tenant_id_header: Option<&str>,
) -> ApiResult<AuthContext> {
    if let Some(api_key) = api_key_header {
        return authenticate_api_key(config, api_key, tenant_id_header);
    }

    if let Some(auth_value) = auth_header {
        return match auth_value.strip_prefix("Bearer ") {
            Some(token) => authenticate_jwt(config, token.trim(), tenant_id_header),
            None => Err(ApiError::invalid_token(
                "Authorization header must use Bearer scheme",
            )),
        };
    }

    Err(ApiError::unauthorized(
        "Authentication required: provide X-API-Key or Authorization header",
    ))
}

// ============================================================================
// TESTS
// ============================================================================
