//! OpenAI HTTP client with request limiting

use super::types::ApiError;
use crate::providers::{invalid_response, rate_limited, request_failed, transport};
use keel_core::KeelResult;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const PROVIDER: &str = "openai";

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client. At most `max_concurrent` requests are in flight at once.
pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    limiter: Arc<Semaphore>,
}

impl OpenAiClient {
    /// Create a client.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `base_url` - API root, e.g. [`DEFAULT_BASE_URL`] or a compatible proxy
    /// * `timeout` - Per-request timeout
    /// * `max_concurrent` - Upper bound on in-flight requests
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
        max_concurrent: usize,
    ) -> KeelResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| transport(PROVIDER, format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body to `endpoint` and decode the JSON response.
    pub async fn request<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> KeelResult<Res> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| transport(PROVIDER, format!("Request limiter closed: {}", e)))?;

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| transport(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)));
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(error_for_status(status, retry_after_ms, &error_text))
    }
}

pub(crate) fn error_for_status(
    status: StatusCode,
    retry_after_ms: i64,
    body: &str,
) -> keel_core::KeelError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    match status {
        StatusCode::TOO_MANY_REQUESTS => rate_limited(PROVIDER, retry_after_ms),
        _ => request_failed(PROVIDER, status.as_u16(), message),
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as i64)
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
