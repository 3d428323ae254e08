//! Per-request deadline for outbound calls

use crate::error::{ConnectorError, ConnectorResult};
use reqwest::ClientBuilder;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Connect budget applied once to the shared client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounds one outbound call. The deadline is its own and does not depend on
/// whatever limit the inbound handler runs under.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutManager {
    request_timeout: Duration,
}

impl TimeoutManager {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            request_timeout: Duration::from_millis(timeout_ms.max(1)),
        }
    }

    /// Connection-level timeout for the shared client. No total timeout is
    /// set there since the client serves requests with different deadlines.
    pub fn apply_to_client_builder(builder: ClientBuilder) -> ClientBuilder {
        builder.connect_timeout(CONNECT_TIMEOUT)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Run `operation` under the deadline, classifying reqwest failures.
    pub async fn execute_with_timeout<F, T>(&self, target: &str, operation: F) -> ConnectorResult<T>
    where
        F: Future<Output = Result<T, reqwest::Error>>,
    {
        match timeout(self.request_timeout, operation).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) if e.is_timeout() => Err(self.timed_out(target)),
            Ok(Err(e)) => Err(ConnectorError::Transport(format!(
                "No response received from {}: {}",
                target, e
            ))),
            Err(_) => Err(self.timed_out(target)),
        }
    }

    fn timed_out(&self, target: &str) -> ConnectorError {
        ConnectorError::Timeout(format!(
            "No response received from {}: timeout of {}ms exceeded",
            target,
            self.request_timeout.as_millis()
        ))
    }
}
