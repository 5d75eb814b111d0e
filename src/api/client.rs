//! ClearSky Vision HTTP client with secure API key handling and safe logging.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::api::envelope::ServiceResult;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::streaming::{ProgressSink, StreamingDownloader};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Accept header value: JSON envelopes and raw raster bodies.
const ACCEPT_VALUE: &str = "application/json, application/octet-stream";

/// Query parameter keys (case-insensitive) that should have their values redacted.
const SENSITIVE_QUERY_PARAMS: &[&str] = &[
    "apikey",
    "api_key",
    "x-api-key",
    "key",
    "token",
    "access_token",
    "signature",
];

// ─────────────────────────────────────────────────────────────────────────────
// LoggingMode
// ─────────────────────────────────────────────────────────────────────────────

/// Controls how URLs are sanitized for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingMode {
    /// Log only the path component. Strips scheme, host, query, and fragment.
    /// Example: `/api/satelliteimages/process/composite`
    #[default]
    PathOnly,

    /// Log path and query parameters, but redact sensitive values.
    /// Example: `/api/tasking/orders?recurringOnly=true&apiKey=***`
    PathAndQueryRedacted,
}

// ─────────────────────────────────────────────────────────────────────────────
// ApiKey
// ─────────────────────────────────────────────────────────────────────────────

/// The credential sent with every request.
///
/// Wrapped in `SecretString` so it never shows up through `Debug` or logs.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    fn header_value(&self) -> Result<HeaderValue, ClientError> {
        let mut value = HeaderValue::from_str(self.0.expose_secret())
            .map_err(|_| ClientError::Config("API key contains invalid header characters".into()))?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn is_empty(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// URL Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Determines if a query parameter key is sensitive and should be redacted.
fn is_sensitive_param(key: &str) -> bool {
    let key_lower = key.to_ascii_lowercase();
    SENSITIVE_QUERY_PARAMS
        .iter()
        .any(|&sensitive| key_lower == sensitive)
}

/// Sanitizes a URL for safe logging based on the specified mode.
///
/// The result never contains the scheme, host, or fragment.
pub fn sanitize_url_for_logs(url: &Url, mode: LoggingMode) -> String {
    let path = url.path();

    match mode {
        LoggingMode::PathOnly => path.to_string(),
        LoggingMode::PathAndQueryRedacted => {
            let query_pairs: Vec<_> = url.query_pairs().collect();
            if query_pairs.is_empty() {
                return path.to_string();
            }

            let redacted_pairs: Vec<String> = query_pairs
                .into_iter()
                .map(|(key, value)| {
                    if is_sensitive_param(&key) {
                        format!("{}=***", key)
                    } else {
                        format!("{}={}", key, value)
                    }
                })
                .collect();

            format!("{}?{}", path, redacted_pairs.join("&"))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ClearSkyClient
// ─────────────────────────────────────────────────────────────────────────────

/// Thread-safe HTTP client for the ClearSky Vision API.
///
/// Cloning is cheap: the connection pool, key and configuration are shared.
/// The client holds no mutable state, so clones can be moved into concurrently
/// dispatched jobs freely.
#[derive(Clone)]
pub struct ClearSkyClient {
    /// The underlying HTTP client.
    http: reqwest::Client,
    /// Parsed endpoint all paths are joined onto.
    base_url: Url,
    /// Credential attached to every call.
    api_key: ApiKey,
    /// Validated configuration.
    config: Arc<ClientConfig>,
}

impl fmt::Debug for ClearSkyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClearSkyClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key)
            .finish()
    }
}

impl ClearSkyClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// - `ClientError::Config` if the configuration is invalid or the key is empty
    /// - `ClientError::Internal` if the HTTP client fails to initialize
    pub fn new(api_key: ApiKey, config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        if api_key.is_empty() {
            return Err(ClientError::Config("API key must not be empty".into()));
        }
        // Fail at construction rather than on the first request.
        api_key.header_value()?;

        let http = build_http_client(&config)?;
        let base_url = config.parsed_base_url()?;

        Ok(Self {
            http,
            base_url,
            api_key,
            config: Arc::new(config),
        })
    }

    /// Creates a client against the production endpoint with default settings.
    pub fn with_defaults(api_key: ApiKey) -> Result<Self, ClientError> {
        Self::new(api_key, ClientConfig::default())
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds a streaming downloader from the download configuration.
    pub fn downloader(&self) -> StreamingDownloader {
        StreamingDownloader::from_config(&self.config.download)
    }

    /// Builds a progress sink honouring `download.show_progress`.
    pub(crate) fn progress_sink(&self) -> Box<dyn ProgressSink> {
        crate::streaming::progress::sink_for(self.config.download.show_progress)
    }

    /// Builds a full URL by joining the path onto the base URL and appending
    /// query parameters.
    ///
    /// `path` is resolved below the base path, so a base URL such as
    /// `https://proxy/clearsky` keeps its `/clearsky` prefix.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Internal` if the path cannot be joined.
    pub fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ClientError::Internal(format!("Invalid path: {}", path)))?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Performs one authenticated call and normalizes the outcome.
    ///
    /// Every status is returned as a response except 401.
    ///
    /// # Errors
    ///
    /// - `ClientError::Unauthorized` - HTTP 401
    /// - `ClientError::ConnectionFailed` - Network error before a response arrived
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.build_url(path, query)?;
        let response = self.execute_with_logging(method, url, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("[API] API key rejected (401)");
            return Err(ClientError::Unauthorized);
        }

        Ok(response)
    }

    /// Serializes `body` as JSON and performs [`call`](Self::call).
    pub async fn call_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<reqwest::Response, ClientError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ClientError::Internal(format!("Failed to serialize request: {}", e)))?;
        self.call(method, path, query, Some(bytes)).await
    }

    /// Performs a call and decodes the service result envelope.
    pub async fn call_envelope<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<ServiceResult<T>, ClientError> {
        let response = self.call(method, path, query, body).await?;
        ServiceResult::from_response(response).await
    }

    /// JSON-body variant of [`call_envelope`](Self::call_envelope).
    pub async fn call_json_envelope<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<ServiceResult<T>, ClientError> {
        let response = self.call_json(method, path, query, body).await?;
        ServiceResult::from_response(response).await
    }

    /// Executes a request with timing, logging, and error handling.
    ///
    /// # Security
    ///
    /// - Never logs the API key header
    /// - Never logs request/response bodies
    /// - Sanitizes URLs before logging
    /// - Error messages never contain raw URLs
    async fn execute_with_logging(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, ClientError> {
        let start = Instant::now();
        let sanitized_url = sanitize_url_for_logs(&url, self.config.logging_mode);

        let mut request = self
            .http
            .request(method.clone(), url.as_str())
            .header(API_KEY_HEADER, self.api_key.header_value()?);

        if let Some(body_bytes) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body_bytes);
        }

        let result = request.send().await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                info!(
                    "[API] {} {} {} {}ms",
                    method,
                    sanitized_url,
                    response.status().as_u16(),
                    duration_ms
                );
                Ok(response)
            }
            Err(e) => {
                // The reqwest error embeds the full URL, so only its kind is reported.
                let kind = if e.is_timeout() {
                    "request timed out"
                } else if e.is_connect() {
                    "could not connect"
                } else {
                    "request failed"
                };
                info!("[API] {} {} FAILED {}ms ({})", method, sanitized_url, duration_ms, kind);
                Err(ClientError::ConnectionFailed(format!(
                    "{} {}: {}",
                    method, sanitized_url, kind
                )))
            }
        }
    }
}

/// Builds the configured HTTP client.
fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ClientError> {
    let user_agent = HeaderValue::from_str(&config.user_agent)
        .map_err(|_| ClientError::Config("user_agent contains invalid characters".into()))?;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, user_agent);
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .build()
        .map_err(|e| ClientError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
