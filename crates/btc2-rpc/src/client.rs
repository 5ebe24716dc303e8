//! Base HTTP client for the wallet backend.
//!
//! Every endpoint answers with a JSON envelope `{success, error?, ...}`.
//! `get()` retries transient failures with exponential backoff; `post()`
//! never retries because wallet creation and sends are not idempotent.
//! Supports Basic auth (for deployments behind an authenticating proxy),
//! a configurable timeout, and a cookie store carrying the login session.

use crate::error::RpcError;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Response envelope shared by all endpoints.
#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

/// Configuration for an RPC client.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Base URL (e.g., `http://localhost:5000`).
    pub url: String,
    /// Optional username for Basic auth.
    pub username: Option<String>,
    /// Optional password for Basic auth.
    pub password: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Number of retry attempts on transient failure (GET only).
    pub retries: u32,
    /// Initial delay between retries (doubles each attempt).
    pub retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: format!("http://127.0.0.1:{}", crate::DEFAULT_PORT),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Async client for the wallet backend's JSON endpoints.
pub struct RpcClient {
    client: reqwest::Client,
    config: RpcConfig,
}

impl RpcClient {
    /// Create a new client with the given URL.
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Self::with_config(RpcConfig {
            url: url.to_string(),
            ..Default::default()
        })
    }

    /// Create a new client with full configuration.
    pub fn with_config(mut config: RpcConfig) -> Result<Self, RpcError> {
        config.url = config.url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .cookie_store(true)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(RpcError::Client)?;

        Ok(Self { client, config })
    }

    /// Get the configured base URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn auth_header(&self) -> Option<HeaderValue> {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => {
                let creds = format!("{}:{}", user, pass);
                let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
                HeaderValue::from_str(&format!("Basic {}", encoded)).ok()
            }
            _ => None,
        }
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(auth) = self.auth_header() {
            headers.insert(AUTHORIZATION, auth);
        }
        headers
    }

    /// GET an endpoint and return the envelope payload.
    pub async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Map<String, Value>, RpcError> {
        let url = format!("{}{}", self.config.url, endpoint);
        let attempts = self.config.retries + 1;

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.config.retry_delay * 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            match self.do_get(&url, endpoint, query).await {
                Ok(val) => return Ok(val),
                Err(e) => {
                    if !(e.is_transient() && attempt + 1 < attempts) {
                        return Err(e);
                    }
                    log::debug!("GET {} failed (attempt {}): {}; retrying", endpoint, attempt + 1, e);
                }
            }
            attempt += 1;
        }
    }

    async fn do_get(
        &self,
        url: &str,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Map<String, Value>, RpcError> {
        log::debug!("GET {}", endpoint);
        let resp = self
            .client
            .get(url)
            .headers(self.build_headers())
            .query(query)
            .send()
            .await
            .map_err(|e| RpcError::Http {
                endpoint: endpoint.to_string(),
                url: url.to_string(),
                source: e,
            })?;

        self.read_envelope(resp, url, endpoint).await
    }

    /// POST JSON (or an empty body) to an endpoint and return the envelope
    /// payload. Never retried.
    pub async fn post(
        &self,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Map<String, Value>, RpcError> {
        let url = format!("{}{}", self.config.url, endpoint);
        log::debug!("POST {}", endpoint);

        let mut req = self.client.post(&url).headers(self.build_headers());
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| RpcError::Http {
            endpoint: endpoint.to_string(),
            url: url.clone(),
            source: e,
        })?;

        self.read_envelope(resp, &url, endpoint).await
    }

    async fn read_envelope(
        &self,
        resp: reqwest::Response,
        url: &str,
        endpoint: &str,
    ) -> Result<Map<String, Value>, RpcError> {
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| RpcError::Http {
            endpoint: endpoint.to_string(),
            url: url.to_string(),
            source: e,
        })?;

        parse_envelope(endpoint, url, status, &text)
    }
}

/// Interpret a response body. The backend sends an envelope even on 4xx/5xx,
/// so the body is inspected before the status code.
pub(crate) fn parse_envelope(
    endpoint: &str,
    url: &str,
    status: u16,
    text: &str,
) -> Result<Map<String, Value>, RpcError> {
    match serde_json::from_str::<Envelope>(text) {
        Ok(env) if env.success => Ok(env.payload),
        Ok(env) => Err(RpcError::Rejected {
            endpoint: endpoint.to_string(),
            status,
            message: env.error.filter(|m| !m.trim().is_empty()),
        }),
        Err(_) if status >= 400 => Err(RpcError::HttpStatus {
            endpoint: endpoint.to_string(),
            url: url.to_string(),
            status,
            body: text.chars().take(500).collect(),
        }),
        Err(e) => Err(RpcError::Json {
            endpoint: endpoint.to_string(),
            source: e,
        }),
    }
}
