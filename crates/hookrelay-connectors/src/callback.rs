//! Delivery of results back to the workflow engine (`bizproc.event.send`).

use crate::error::{ConnectorError, ConnectorResult};
use crate::http::ReturnValues;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;
use tracing::{error, info};

pub const BIZPROC_EVENT_SEND: &str = "bizproc.event.send";

/// Where and as whom to call back.
#[derive(Clone, PartialEq)]
pub struct CallbackTarget {
    /// REST base URL ending with `/`.
    pub endpoint: String,
    pub access_token: String,
}

impl fmt::Debug for CallbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTarget")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackRequest {
    pub event_token: String,
    pub return_values: ReturnValues,
    pub log_message: String,
}

#[derive(Serialize)]
struct Payload<'a> {
    auth: &'a str,
    event_token: &'a str,
    return_values: &'a ReturnValues,
    log_message: &'a str,
}

#[async_trait]
pub trait CallbackSender: Send + Sync {
    /// Deliver once. Errors are reported, never retried here.
    async fn send(&self, target: &CallbackTarget, request: &CallbackRequest) -> ConnectorResult<JsonValue>;
}

#[derive(Debug, Clone)]
pub struct BizprocCallbackSender {
    client: Client,
    timeout: Duration,
}

impl BizprocCallbackSender {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CallbackSender for BizprocCallbackSender {
    async fn send(&self, target: &CallbackTarget, request: &CallbackRequest) -> ConnectorResult<JsonValue> {
        let url = format!("{}{}", target.endpoint, BIZPROC_EVENT_SEND);
        let log_message = if request.log_message.is_empty() {
            "Request completed"
        } else {
            request.log_message.as_str()
        };
        let payload = Payload {
            auth: &target.access_token,
            event_token: &request.event_token,
            return_values: &request.return_values,
            log_message,
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(event_token = %request.event_token, error = %e, "callback transport failure");
                ConnectorError::Callback(format!("No response received from {}: {}", url, e))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ConnectorError::Callback(format!("Failed to read callback response: {}", e)))?;
        let body: JsonValue = serde_json::from_str(&text).unwrap_or(JsonValue::Null);

        if let Some(err) = body.get("error") {
            let message = body
                .get("error_description")
                .and_then(JsonValue::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| match err {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                });
            error!(event_token = %request.event_token, %message, "callback rejected");
            return Err(ConnectorError::Callback(message));
        }
        if !status.is_success() {
            error!(event_token = %request.event_token, status = status.as_u16(), "callback non-2xx");
            return Err(ConnectorError::Callback(format!("HTTP {}", status.as_u16())));
        }

        info!(event_token = %request.event_token, "callback delivered");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> CallbackRequest {
        CallbackRequest {
            event_token: "evt-1".into(),
            return_values: ReturnValues::failure("boom"),
            log_message: String::new(),
        }
    }

    #[tokio::test]
    async fn posts_payload_to_event_send() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/rest/bizproc.event.send").json_body(json!({
                "auth": "tok",
                "event_token": "evt-1",
                "return_values": {"responseBody": "", "statusCode": 0, "responseHeaders": "{}", "error": "boom"},
                "log_message": "Request completed"
            }));
            then.status(200).json_body(json!({"result": true}));
        });

        let sender = BizprocCallbackSender::new(Client::new());
        let target = CallbackTarget {
            endpoint: server.url("/rest/"),
            access_token: "tok".into(),
        };
        let ack = sender.send(&target, &request()).await.unwrap();
        mock.assert();
        assert_eq!(ack["result"], json!(true));
    }

    #[tokio::test]
    async fn error_field_is_failure_even_on_200() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/bizproc.event.send");
            then.status(200)
                .json_body(json!({"error": "WRONG_AUTH", "error_description": "Wrong auth type"}));
        });

        let sender = BizprocCallbackSender::new(Client::new());
        let target = CallbackTarget {
            endpoint: server.url("/rest/"),
            access_token: "tok".into(),
        };
        let err = sender.send(&target, &request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Callback failed: Wrong auth type");
    }

    #[tokio::test]
    async fn non_2xx_is_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/bizproc.event.send");
            then.status(502).body("bad gateway");
        });

        let sender = BizprocCallbackSender::new(Client::new());
        let target = CallbackTarget {
            endpoint: server.url("/rest/"),
            access_token: "tok".into(),
        };
        let err = sender.send(&target, &request()).await.unwrap_err();
        assert!(matches!(err, ConnectorError::Callback(ref m) if m == "HTTP 502"));
    }
}
