#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use hookrelay_connectors::{
    CallbackRequest, CallbackSender, CallbackTarget, CompiledRequest, ConnectorError,
    ConnectorResult, ExecutionResult, HttpExecutor, PortalVerifier, RefreshedToken,
    ReqwestExecutor, TokenRefresher,
};
use hookrelay_core::ManualClock;
use hookrelay_server::{create_router, AppState, RelaySettings, Services};
use hookrelay_store::{MemoryAccountStore, MemoryCredentialStore, MemoryRequestLogStore};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// Real reqwest executor that counts calls.
pub struct CountingExecutor {
    inner: ReqwestExecutor,
    pub calls: AtomicUsize,
}

#[async_trait]
impl HttpExecutor for CountingExecutor {
    async fn execute(&self, request: &CompiledRequest) -> ConnectorResult<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(request).await
    }
}

#[derive(Default)]
pub struct RecordingCallback {
    pub sent: Mutex<Vec<(CallbackTarget, CallbackRequest)>>,
    pub fail: AtomicBool,
}

impl RecordingCallback {
    pub fn sent(&self) -> Vec<(CallbackTarget, CallbackRequest)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallbackSender for RecordingCallback {
    async fn send(&self, target: &CallbackTarget, request: &CallbackRequest) -> ConnectorResult<Value> {
        self.sent.lock().unwrap().push((target.clone(), request.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConnectorError::Callback("HTTP 401 Unauthorized".into()));
        }
        Ok(json!({"result": true}))
    }
}

/// Accepts exactly one auth id.
pub struct CountingVerifier {
    pub accepted_auth_id: String,
    pub calls: AtomicUsize,
}

#[async_trait]
impl PortalVerifier for CountingVerifier {
    async fn verify(&self, _domain: &str, auth_id: &str) -> ConnectorResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if auth_id == self.accepted_auth_id {
            Ok(())
        } else {
            Err(ConnectorError::Credential("expired_token".into()))
        }
    }
}

pub struct FailingRefresher;

#[async_trait]
impl TokenRefresher for FailingRefresher {
    async fn refresh(&self, _refresh_token: &str) -> ConnectorResult<RefreshedToken> {
        Err(ConnectorError::Credential("Failed to refresh token".into()))
    }
}

pub struct Harness {
    pub router: Router,
    pub state: AppState,
    pub credentials: Arc<MemoryCredentialStore>,
    pub accounts: Arc<MemoryAccountStore>,
    pub logs: Arc<MemoryRequestLogStore>,
    pub executor: Arc<CountingExecutor>,
    pub callbacks: Arc<RecordingCallback>,
    pub verifier: Arc<CountingVerifier>,
    pub clock: Arc<ManualClock>,
}

pub const GOOD_AUTH_ID: &str = "auth-ok";

impl Harness {
    pub fn new() -> Self {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let accounts = Arc::new(MemoryAccountStore::new());
        let logs = Arc::new(MemoryRequestLogStore::new());
        let executor = Arc::new(CountingExecutor {
            inner: ReqwestExecutor::new().unwrap(),
            calls: AtomicUsize::new(0),
        });
        let callbacks = Arc::new(RecordingCallback::default());
        let verifier = Arc::new(CountingVerifier {
            accepted_auth_id: GOOD_AUTH_ID.to_string(),
            calls: AtomicUsize::new(0),
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let services = Services {
            credentials: credentials.clone(),
            accounts: accounts.clone(),
            request_logs: logs.clone(),
            executor: executor.clone(),
            callback: callbacks.clone(),
            refresher: Arc::new(FailingRefresher),
            verifier: verifier.clone(),
            clock: clock.clone(),
        };
        let state = AppState::new(services, &RelaySettings::default());
        Self {
            router: create_router(state.clone()),
            state,
            credentials,
            accounts,
            logs,
            executor,
            callbacks,
            verifier,
            clock,
        }
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub fn executor_calls(&self) -> usize {
        self.executor.calls.load(Ordering::SeqCst)
    }

    /// Request log appends are spawned; wait until `n` rows exist.
    pub async fn wait_for_logs(&self, n: usize) -> Vec<hookrelay_core::RequestLogRecord> {
        for _ in 0..100 {
            let rows = self.logs.all().await;
            if rows.len() >= n {
                return rows;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.logs.all().await
    }
}

/// Direct-flow auth block carrying its own access token.
pub fn direct_auth(member_id: &str) -> Value {
    json!({
        "domain": "portal.example",
        "access_token": "portal-token",
        "member_id": member_id,
        "client_endpoint": "https://portal.example/rest/"
    })
}
