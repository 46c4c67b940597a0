use crate::config::BackendConfig;
use crate::dto::*;
use crate::error::{ApiError, Failure, Result};
use crate::retry::RetryPolicy;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub const DEFAULT_SEARCH_RESULTS: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_reqwest(), f)
    }
}

/// One logical request. Reused unchanged for every attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Put, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            ApiError::from(Failure::Decode {
                message: format!("failed to serialize request body: {e}"),
            })
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// HTTP client for the assistant backend.
///
/// Every call is bounded by a per-attempt timeout and retried according to the
/// configured [`RetryPolicy`]. Holds nothing but configuration, so clones are
/// cheap and independent calls never interfere.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Arc<BackendConfig>,
    retry_policy: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: BackendConfig) -> Self {
        let retry_policy = RetryPolicy::new(config.retry_config());
        Self {
            client: Client::new(),
            config: Arc::new(config),
            retry_policy,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Performs one logical exchange and returns the parsed JSON body.
    pub async fn execute(&self, request: ApiRequest) -> Result<Value> {
        let url = self.url_for(&request.endpoint);
        let request = &request;
        let url = url.as_str();

        self.retry_policy
            .retry(|attempt| async move {
                debug!("{} {} (attempt {})", request.method, url, attempt);
                self.attempt(request, url).await.map_err(ApiError::from)
            })
            .await
    }

    /// [`ApiClient::execute`] followed by deserialization into `T`.
    pub async fn execute_as<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let value = self.execute(request).await?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::from(Failure::Decode {
                message: format!("unexpected response shape: {e}"),
            })
        })
    }

    async fn attempt(&self, request: &ApiRequest, url: &str) -> std::result::Result<Value, Failure> {
        let per_attempt = self.config.request_timeout();

        let mut builder = self
            .client
            .request(request.method.as_reqwest(), url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            if request.method != Method::Get {
                builder = builder.json(body);
            }
        }

        // Dropping the future on expiry cancels the in-flight exchange.
        let exchange = async move {
            let response = builder
                .send()
                .await
                .map_err(|e| Failure::from_reqwest(&e, per_attempt))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| Failure::from_reqwest(&e, per_attempt))?;
            Ok::<_, Failure>((status, text))
        };

        let (status, text) = match timeout(per_attempt, exchange).await {
            Ok(result) => result?,
            Err(_) => return Err(Failure::Timeout { after: per_attempt }),
        };

        debug!("API response status: {}", status);
        debug!("API response: {}", text);

        if !status.is_success() {
            return Err(Failure::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| Failure::Decode {
            message: format!("invalid JSON in response: {e}"),
        })
    }

    // ========================================================================
    // Health
    // ========================================================================

    pub async fn health_check(&self) -> Result<HealthResponse> {
        self.execute_as(ApiRequest::get("/api/health")).await
    }

    // ========================================================================
    // Chat
    // ========================================================================

    pub async fn send_message(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatResponse> {
        let request = ApiRequest::post("/api/chat/message").json(&ChatRequest {
            message: message.to_string(),
            session_id: session_id.map(str::to_string),
        })?;
        self.execute_as(request).await
    }

    pub async fn list_sessions(&self) -> Result<SessionsResponse> {
        self.execute_as(ApiRequest::get("/api/chat/sessions")).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<MessageResponse> {
        let endpoint = format!("/api/chat/session/{}", encode_path_segment(session_id));
        self.execute_as(ApiRequest::delete(endpoint)).await
    }

    // ========================================================================
    // Emails
    // ========================================================================

    /// Starts background ingestion. A `processing` status is a success.
    pub async fn load_emails(&self) -> Result<LoadEmailsResponse> {
        self.execute_as(ApiRequest::post("/api/emails/load")).await
    }

    pub async fn email_status(&self) -> Result<EmailStatusResponse> {
        self.execute_as(ApiRequest::get("/api/emails/status")).await
    }

    pub async fn search_emails(&self, query: &str, k: u32) -> Result<SearchResponse> {
        let request = ApiRequest::post("/api/emails/search").json(&SearchRequest {
            query: query.to_string(),
            k,
        })?;
        self.execute_as(request).await
    }

    // ========================================================================
    // System and configuration
    // ========================================================================

    pub async fn system_status(&self) -> Result<SystemStatusResponse> {
        self.execute_as(ApiRequest::get("/api/system/status")).await
    }

    pub async fn get_config(&self) -> Result<ConfigResponse> {
        self.execute_as(ApiRequest::get("/api/config")).await
    }

    pub async fn update_config(&self, update: &ConfigUpdate) -> Result<MessageResponse> {
        let request = ApiRequest::post("/api/config").json(update)?;
        self.execute_as(request).await
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
