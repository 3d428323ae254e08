//! One invocation from receipt to callback.

use super::SharedTokenManager;
use crate::dto::Invocation;
use crate::services::{quota_exceeded_message, QuotaService};
use hookrelay_connectors::{
    CallbackRequest, CallbackSender, CallbackTarget, ConnectorError, ConnectorResult,
    ExecutionResult, HttpExecutor, PortalAuth, RequestCompiler, RequestConfig, ReturnValues,
};
use hookrelay_core::{sanitize_json_value, Clock, RequestLogEntry, RequestLogStore};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Progress of an invocation. `Failed` can follow any stage before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Validated,
    Compiling,
    Executing,
    Mapping,
    Callback,
    Done,
    Failed,
}

/// Why the synchronous reply is unsuccessful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing event token or auth, or a config that did not validate.
    Input,
    /// The callback to the workflow engine was rejected or never arrived.
    Callback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackStatus {
    Delivered,
    /// Nothing to call back with: no event token, auth or credential.
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// Last stage reached.
    pub stage: Stage,
    /// What was handed to the callback, if anything was built.
    pub return_values: Option<ReturnValues>,
    pub callback: CallbackStatus,
}

impl InvocationOutcome {
    fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            message: None,
            error: Some(message.clone()),
            failure: Some(FailureKind::Input),
            stage: Stage::Failed,
            return_values: None,
            callback: CallbackStatus::Skipped(message),
        }
    }

    fn finished(return_values: ReturnValues, callback: CallbackStatus, stage: Stage) -> Self {
        let (success, message, error, failure, stage) = match &callback {
            CallbackStatus::Failed(message) => (
                false,
                None,
                Some(message.clone()),
                Some(FailureKind::Callback),
                Stage::Failed,
            ),
            CallbackStatus::Skipped(reason) => (
                true,
                Some(format!("Request processed, callback skipped: {}", reason)),
                None,
                None,
                stage,
            ),
            CallbackStatus::Delivered => (
                true,
                Some("Request processed successfully".to_string()),
                None,
                None,
                stage,
            ),
        };
        Self {
            success,
            message,
            error,
            failure,
            stage,
            return_values: Some(return_values),
            callback,
        }
    }
}

pub struct Orchestrator {
    executor: Arc<dyn HttpExecutor>,
    callback: Arc<dyn CallbackSender>,
    tokens: Arc<SharedTokenManager>,
    quota: Arc<QuotaService>,
    request_logs: Arc<dyn RequestLogStore>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn HttpExecutor>,
        callback: Arc<dyn CallbackSender>,
        tokens: Arc<SharedTokenManager>,
        quota: Arc<QuotaService>,
        request_logs: Arc<dyn RequestLogStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            executor,
            callback,
            tokens,
            quota,
            request_logs,
            clock,
        }
    }

    pub async fn handle(&self, invocation: Invocation) -> InvocationOutcome {
        let started = Instant::now();
        debug!(stage = ?Stage::Received, "invocation received");

        let Some(event_token) = invocation.event_token() else {
            warn!("invocation without event_token rejected");
            return InvocationOutcome::rejected("event_token is required");
        };
        let Some(raw_auth) = invocation.auth() else {
            warn!(%event_token, "invocation without auth rejected");
            return InvocationOutcome::rejected("auth is required");
        };
        let auth = match PortalAuth::from_value(raw_auth) {
            Ok(auth) => auth,
            Err(e) => {
                warn!(%event_token, error = %e, "invocation auth unusable");
                return InvocationOutcome::rejected(e.to_string());
            }
        };

        let properties = invocation.properties.clone().unwrap_or(JsonValue::Null);
        info!(
            %event_token,
            tenant = ?auth.member_id,
            domain = %auth.domain,
            document_id = ?invocation.document_id,
            "received invocation"
        );
        debug!(%event_token, properties = %sanitize_json_value(&properties), "invocation properties");

        let config = match RequestConfig::from_properties(&properties) {
            Ok(config) => config,
            Err(e) => return self.fail(&event_token, &auth, e).await,
        };
        debug!(%event_token, stage = ?Stage::Validated, "config validated");

        let decision = match &auth.member_id {
            Some(member_id) => Some(self.quota.check(member_id, &auth.domain).await),
            None => None,
        };
        if let Some(decision) = decision.as_ref().filter(|d| !d.allowed) {
            let message = quota_exceeded_message(decision);
            warn!(%event_token, tenant = ?auth.member_id, usage = decision.usage, "quota exceeded");
            let return_values = ReturnValues::failure(message.clone());
            let callback = self
                .deliver(&event_token, &auth, &return_values, format!("Error: {}", message))
                .await;
            return InvocationOutcome::finished(return_values, callback, Stage::Done);
        }

        debug!(%event_token, stage = ?Stage::Compiling, "compiling request");
        let compiled = match RequestCompiler::compile(&config) {
            Ok(compiled) => compiled,
            Err(e) => return self.fail(&event_token, &auth, e).await,
        };

        debug!(%event_token, stage = ?Stage::Executing, method = %compiled.method, url = %compiled.url, "executing request");
        let execution = self.executor.execute(&compiled).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if let Some(account_id) = decision.as_ref().and_then(|d| d.account_id) {
            self.record(account_id, &compiled.url, compiled.method.as_str(), &execution, elapsed_ms);
        }

        let (return_values, log_message) = match &execution {
            Ok(result) => {
                debug!(%event_token, stage = ?Stage::Mapping, status = result.status_code, "mapping response");
                (
                    ReturnValues::from_execution(result, &config.output_mappings),
                    format!(
                        "HTTP {} request to {} completed with status {} in {}ms",
                        compiled.method, config.url, result.status_code, elapsed_ms
                    ),
                )
            }
            Err(e) => {
                warn!(%event_token, error = %e, elapsed_ms, "outbound request failed");
                (ReturnValues::failure(e.to_string()), format!("Error: {}", e))
            }
        };

        let callback = self
            .deliver(&event_token, &auth, &return_values, log_message)
            .await;
        info!(
            %event_token,
            status = return_values.status_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            callback = ?callback,
            "invocation finished"
        );
        InvocationOutcome::finished(return_values, callback, Stage::Done)
    }

    /// Error path: the error goes back through the callback when possible
    /// and the reply reports it.
    async fn fail(&self, event_token: &str, auth: &PortalAuth, err: ConnectorError) -> InvocationOutcome {
        let message = err.to_string();
        warn!(%event_token, error = %message, "invocation failed");
        let return_values = ReturnValues::failure(message.clone());
        let callback = self
            .deliver(event_token, auth, &return_values, format!("Error: {}", message))
            .await;
        InvocationOutcome {
            success: false,
            message: None,
            error: Some(message),
            failure: Some(FailureKind::Input),
            stage: Stage::Failed,
            return_values: Some(return_values),
            callback,
        }
    }

    async fn deliver(
        &self,
        event_token: &str,
        auth: &PortalAuth,
        return_values: &ReturnValues,
        log_message: String,
    ) -> CallbackStatus {
        let target = match self.callback_target(auth).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                error!(%event_token, tenant = ?auth.member_id, "no credential for callback, skipped");
                return CallbackStatus::Skipped("no credential".to_string());
            }
            Err(e) => {
                error!(%event_token, tenant = ?auth.member_id, error = %e, "credential unavailable, callback skipped");
                return CallbackStatus::Skipped(e.to_string());
            }
        };

        debug!(%event_token, stage = ?Stage::Callback, endpoint = %target.endpoint, "sending callback");
        let request = CallbackRequest {
            event_token: event_token.to_string(),
            return_values: return_values.clone(),
            log_message,
        };
        match self.callback.send(&target, &request).await {
            Ok(_) => CallbackStatus::Delivered,
            Err(e) => {
                error!(%event_token, error = %e, "callback delivery failed");
                CallbackStatus::Failed(e.to_string())
            }
        }
    }

    /// Direct flow uses the access token the invocation carries; otherwise
    /// the stored credential of `member_id` is used.
    async fn callback_target(&self, auth: &PortalAuth) -> ConnectorResult<Option<CallbackTarget>> {
        if let Some(access_token) = &auth.access_token {
            return Ok(Some(CallbackTarget {
                endpoint: auth.rest_endpoint(),
                access_token: access_token.clone(),
            }));
        }
        match &auth.member_id {
            Some(member_id) => self.tokens.credential_for_callback(member_id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Append to the request log without holding up the invocation.
    fn record(
        &self,
        account_id: i64,
        url: &str,
        method: &str,
        execution: &ConnectorResult<ExecutionResult>,
        elapsed_ms: u64,
    ) {
        let entry = RequestLogEntry {
            account_id,
            url: url.to_string(),
            method: method.to_string(),
            status_code: execution.as_ref().ok().map(|r| r.status_code),
            success: execution.as_ref().map(ExecutionResult::is_success).unwrap_or(false),
            execution_time_ms: Some(elapsed_ms),
            error_message: execution.as_ref().err().map(ToString::to_string),
            created_at: self.clock.now(),
        };
        let logs = self.request_logs.clone();
        tokio::spawn(async move {
            if let Err(e) = logs.append(&entry).await {
                error!(account_id = entry.account_id, error = %e, "failed to log request");
            }
        });
    }
}
