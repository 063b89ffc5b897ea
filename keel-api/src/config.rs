//! API Configuration Module
//!
//! Server, agent and LLM settings loaded from `KEEL_*` environment variables
//! with development-friendly defaults. Database and auth settings live next to
//! the code that uses them (`db.rs`, `auth.rs`).

use crate::agent::AccessLevel;
use keel_core::{ConfigError, KeelResult};
use keel_llm::{OpenAiChatProvider, OpenAiClient, ProviderRegistry};
use secrecy::SecretString;
use std::time::Duration;

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Which record store backs the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => Err(ConfigError::InvalidValue {
                field: "KEEL_STORAGE".to_string(),
                value: other.to_string(),
                reason: "expected 'memory' or 'postgres'".to_string(),
            }),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen address, e.g. "0.0.0.0:3000".
    pub bind_addr: String,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Upper bound on request handling time. Chat turns may call the LLM
    /// several times, so this is generous.
    pub request_timeout: Duration,

    pub storage: StorageBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            request_timeout: Duration::from_secs(120),
            storage: StorageBackend::Memory,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `KEEL_BIND_ADDR` (or `KEEL_API_PORT` for the port only)
    /// - `KEEL_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `KEEL_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `KEEL_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `KEEL_REQUEST_TIMEOUT_SECS`: default 120
    /// - `KEEL_STORAGE`: "memory" (default) or "postgres"
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match (get("KEEL_BIND_ADDR"), get("KEEL_API_PORT")) {
            (Some(addr), _) if !addr.trim().is_empty() => addr.trim().to_string(),
            (_, Some(port)) => {
                let port: u16 = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: "KEEL_API_PORT".to_string(),
                    value: port.clone(),
                    reason: "expected a port number".to_string(),
                })?;
                format!("0.0.0.0:{}", port)
            }
            _ => defaults.bind_addr,
        };

        let cors_origins = get("KEEL_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = get("KEEL_CORS_ALLOW_CREDENTIALS")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let storage = match get("KEEL_STORAGE") {
            Some(value) => value.parse()?,
            None => StorageBackend::Memory,
        };

        Ok(Self {
            bind_addr,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs: parse_or(get("KEEL_CORS_MAX_AGE_SECS"), defaults.cors_max_age_secs),
            request_timeout: Duration::from_secs(parse_or(get("KEEL_REQUEST_TIMEOUT_SECS"), 120)),
            storage,
        })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.keel.dev matches any https subdomain
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are the Keel product-management assistant. \
Use the provided tools to read and change the workspace's products, features, requirements, \
releases, roadmaps and pages. Never invent ids: look them up first. \
Before calling a delete tool, confirm with the user and pass \"confirm\": true.";

/// Settings for the function-calling assistant.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Highest tool access level the assistant may use.
    pub access: AccessLevel,

    /// Tool-call rounds per chat turn before the reply is cut off.
    pub max_tool_rounds: usize,

    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            access: AccessLevel::Write,
            max_tool_rounds: 8,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AgentConfig {
    /// Environment variables:
    /// - `KEEL_AGENT_ACCESS`: "read", "write" (default) or "destructive"
    /// - `KEEL_AGENT_MAX_ROUNDS`: default 8, must be at least 1
    /// - `KEEL_AGENT_SYSTEM_PROMPT`: replaces the built-in prompt
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let access = match get("KEEL_AGENT_ACCESS") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                field: "KEEL_AGENT_ACCESS".to_string(),
                value: value.clone(),
                reason: "expected 'read', 'write' or 'destructive'".to_string(),
            })?,
            None => defaults.access,
        };

        let max_tool_rounds = parse_or(get("KEEL_AGENT_MAX_ROUNDS"), defaults.max_tool_rounds);
        if max_tool_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "KEEL_AGENT_MAX_ROUNDS".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let system_prompt = get("KEEL_AGENT_SYSTEM_PROMPT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.system_prompt);

        Ok(Self {
            access,
            max_tool_rounds,
            system_prompt,
        })
    }
}

// ============================================================================
// LLM CONFIGURATION
// ============================================================================

/// Chat provider settings. Without an API key no provider is registered and
/// the chat endpoint answers 503.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: keel_llm::providers::openai::client::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_concurrent: 4,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

impl LlmConfig {
    /// Environment variables:
    /// - `KEEL_OPENAI_API_KEY`
    /// - `KEEL_OPENAI_MODEL` (default: gpt-4o-mini)
    /// - `KEEL_OPENAI_BASE_URL` (default: https://api.openai.com/v1)
    /// - `KEEL_LLM_TIMEOUT_SECS` (default: 60)
    /// - `KEEL_LLM_MAX_CONCURRENT` (default: 4)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_key: get("KEEL_OPENAI_API_KEY")
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            model: get("KEEL_OPENAI_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.model),
            base_url: get("KEEL_OPENAI_BASE_URL")
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.base_url),
            timeout: Duration::from_secs(parse_or(get("KEEL_LLM_TIMEOUT_SECS"), 60)),
            max_concurrent: parse_or(get("KEEL_LLM_MAX_CONCURRENT"), defaults.max_concurrent),
        }
    }

    /// Register the OpenAI provider when a key is configured.
    pub fn build_registry(&self) -> KeelResult<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        if let Some(key) = &self.api_key {
            let client = OpenAiClient::new(
                key.clone(),
                self.base_url.clone(),
                self.timeout,
                self.max_concurrent,
            )?;
            registry.register_chat(Box::new(OpenAiChatProvider::new(client, self.model.clone())));
            tracing::info!(model = %self.model, "OpenAI chat provider registered");
        } else {
            tracing::info!("KEEL_OPENAI_API_KEY not set; chat assistant disabled");
        }
        Ok(registry)
    }
}
