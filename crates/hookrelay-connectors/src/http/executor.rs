use super::compiler::CompiledRequest;
use super::config::Method;
use super::timeout_manager::TimeoutManager;
use crate::error::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde_json::Value as JsonValue;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of one outbound call. Any HTTP status counts as a result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub status_code: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    pub raw_body: String,
    /// Present when the body parsed as JSON.
    pub parsed_body: Option<JsonValue>,
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    /// Build a result from an already read response.
    pub fn from_parts(
        status_code: u16,
        status_text: impl Into<String>,
        headers: IndexMap<String, String>,
        raw_body: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        let raw_body = raw_body.into();
        let parsed_body = if raw_body.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&raw_body).ok()
        };
        Self {
            status_code,
            status_text: status_text.into(),
            headers,
            raw_body,
            parsed_body,
            elapsed_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Performs compiled requests. Fails only on transport problems and
/// deadline expiry.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: &CompiledRequest) -> ConnectorResult<ExecutionResult>;
}

/// reqwest-backed executor sharing one connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    pub fn new() -> ConnectorResult<Self> {
        let client = TimeoutManager::apply_to_client_builder(Client::builder())
            .user_agent(concat!("hookrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConnectorError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn header_map(request: &CompiledRequest) -> ConnectorResult<HeaderMap> {
        let mut map = HeaderMap::with_capacity(request.headers.len());
        for (key, value) in request.headers.iter() {
            let name = HeaderName::from_bytes(key.trim().as_bytes()).map_err(|_| {
                ConnectorError::Validation(format!("Invalid header name '{}'", key))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ConnectorError::Validation(format!("Invalid value for header '{}'", key))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// JSON-typed string bodies are decoded and re-serialized; a body that
    /// does not decode goes out verbatim.
    fn wire_body(request: &CompiledRequest) -> Option<String> {
        let body = request.body.as_ref()?;
        if !request.method.allows_body() {
            return None;
        }
        let is_json = request
            .headers
            .content_type()
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false);
        if is_json {
            if let Ok(value) = serde_json::from_str::<JsonValue>(body) {
                return Some(value.to_string());
            }
        }
        Some(body.clone())
    }

    async fn read_response(response: Response, started: Instant) -> Result<ExecutionResult, reqwest::Error> {
        let status = response.status();

        let mut headers: IndexMap<String, String> = IndexMap::new();
        for (name, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers
                    .entry(name.to_string())
                    .and_modify(|existing| {
                        existing.push_str(", ");
                        existing.push_str(value_str);
                    })
                    .or_insert_with(|| value_str.to_string());
            }
        }

        let body_text = response.text().await?;

        Ok(ExecutionResult::from_parts(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            headers,
            body_text,
            started.elapsed().as_millis() as u64,
        ))
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: &CompiledRequest) -> ConnectorResult<ExecutionResult> {
        let started = Instant::now();
        let timeout_manager = TimeoutManager::new(request.timeout_ms);

        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(Self::header_map(request)?);
        if let Some(body) = Self::wire_body(request) {
            builder = builder.body(body);
        }

        debug!(method = %request.method, url = %request.url, timeout_ms = request.timeout_ms, "sending request");
        // The deadline covers the body read as well as the headers.
        let exchange = async move {
            let response = builder.send().await?;
            Self::read_response(response, started).await
        };
        let result = timeout_manager
            .execute_with_timeout(&request.url, exchange)
            .await?;

        info!(
            method = %request.method,
            url = %request.url,
            status = result.status_code,
            elapsed_ms = result.elapsed_ms,
            "request completed"
        );
        Ok(result)
    }
}
