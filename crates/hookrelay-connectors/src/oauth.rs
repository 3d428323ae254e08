//! OAuth credential lifecycle: refresh ahead of expiry, one refresh per
//! tenant at a time, persistence of every refreshed token.

use crate::callback::CallbackTarget;
use crate::error::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use chrono::Duration;
use hookrelay_core::{
    token_expiry, Clock, CredentialStore, NewCredential, OAuthCredential, SystemClock, TenantId,
};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth.bitrix.info/oauth/token/";
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

/// What the provider returned for a refresh grant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub client_endpoint: Option<String>,
    pub server_endpoint: Option<String>,
    pub scope: Option<String>,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> ConnectorResult<RefreshedToken>;
}

#[async_trait]
impl<T: TokenRefresher + ?Sized> TokenRefresher for Arc<T> {
    async fn refresh(&self, refresh_token: &str) -> ConnectorResult<RefreshedToken> {
        (**self).refresh(refresh_token).await
    }
}

/// `grant_type=refresh_token` against the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpTokenRefresher {
    pub const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

fn json_text(body: &JsonValue, key: &str) -> Option<String> {
    match body.get(key) {
        Some(JsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> ConnectorResult<RefreshedToken> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(ConnectorError::InvalidConfig(
                "BITRIX_CLIENT_ID and BITRIX_CLIENT_SECRET must be set".to_string(),
            ));
        }

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .timeout(Self::TIMEOUT)
            .send()
            .await
            .map_err(|e| ConnectorError::Credential(format!("OAuth refresh request failed: {}", e)))?;

        let status = response.status();
        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| ConnectorError::Credential(format!("OAuth refresh returned non-JSON body: {}", e)))?;

        if let Some(err) = json_text(&body, "error") {
            return Err(ConnectorError::Credential(format!(
                "OAuth refresh failed: {} - {}",
                err,
                json_text(&body, "error_description").unwrap_or_default()
            )));
        }
        let access_token = json_text(&body, "access_token").ok_or_else(|| {
            ConnectorError::Credential(format!(
                "OAuth refresh failed: no access_token in response (HTTP {})",
                status.as_u16()
            ))
        })?;

        Ok(RefreshedToken {
            access_token,
            refresh_token: json_text(&body, "refresh_token"),
            expires_in: json_text(&body, "expires_in").and_then(|v| v.parse().ok()),
            client_endpoint: json_text(&body, "client_endpoint"),
            server_endpoint: json_text(&body, "server_endpoint"),
            scope: json_text(&body, "scope"),
        })
    }
}

type RefreshResult = Result<OAuthCredential, String>;
type Waiters = HashMap<TenantId, Vec<oneshot::Sender<RefreshResult>>>;

/// Per-tenant credential lifecycle.
///
/// The in-flight map is owned by the manager, so every manager instance
/// has its own single-flight scope.
pub struct TokenManager<S, R, C = SystemClock> {
    store: S,
    refresher: R,
    clock: C,
    buffer: Duration,
    inflight: Mutex<Waiters>,
}

impl<S, R, C> TokenManager<S, R, C>
where
    S: CredentialStore,
    R: TokenRefresher,
    C: Clock,
{
    pub fn new(store: S, refresher: R, clock: C) -> Self {
        Self {
            store,
            refresher,
            clock,
            buffer: Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored credential as-is, no refresh.
    pub async fn get_credential(&self, tenant: &TenantId) -> ConnectorResult<Option<OAuthCredential>> {
        Ok(self.store.get(tenant).await?)
    }

    /// Access token good for at least the refresh buffer. `Ok(None)` when
    /// the tenant has no credential at all.
    pub async fn get_valid_token(&self, tenant: &TenantId) -> ConnectorResult<Option<String>> {
        Ok(self
            .get_valid_credential(tenant)
            .await?
            .map(|c| c.access_token))
    }

    pub async fn get_valid_credential(
        &self,
        tenant: &TenantId,
    ) -> ConnectorResult<Option<OAuthCredential>> {
        let Some(stored) = self.store.get(tenant).await? else {
            return Ok(None);
        };
        if !stored.needs_refresh(self.clock.now(), self.buffer) {
            return Ok(Some(stored));
        }
        self.refresh_single_flight(tenant).await.map(Some)
    }

    /// Endpoint and token for calling the tenant's portal back.
    pub async fn credential_for_callback(&self, tenant: &TenantId) -> ConnectorResult<CallbackTarget> {
        let credential = self
            .get_valid_credential(tenant)
            .await?
            .ok_or_else(|| ConnectorError::Credential(format!("No valid token for member {}", tenant)))?;
        Ok(CallbackTarget {
            endpoint: credential.rest_endpoint(),
            access_token: credential.access_token,
        })
    }

    /// Persist the credential delivered by an install event.
    pub async fn save_from_install(&self, new: NewCredential) -> ConnectorResult<OAuthCredential> {
        let credential = new.into_credential(self.clock.now());
        self.store.upsert(&credential).await?;
        info!(tenant = %credential.tenant_id, domain = %credential.domain, "stored install credential");
        Ok(credential)
    }

    /// Remove the tenant's credential. Later lookups see no credential.
    pub async fn delete(&self, tenant: &TenantId) -> ConnectorResult<bool> {
        let removed = self.store.delete(tenant).await?;
        info!(tenant = %tenant, removed, "deleted credential");
        Ok(removed)
    }

    async fn refresh_single_flight(&self, tenant: &TenantId) -> ConnectorResult<OAuthCredential> {
        if let Some(rx) = self.register_inflight(tenant) {
            debug!(tenant = %tenant, "joined in-flight refresh");
            return match rx.await {
                Ok(Ok(credential)) => Ok(credential),
                Ok(Err(message)) => Err(ConnectorError::Credential(message)),
                Err(_) => Err(ConnectorError::Credential(
                    "token refresh was abandoned".to_string(),
                )),
            };
        }

        let guard = InflightGuard {
            map: &self.inflight,
            tenant,
            finished: false,
        };
        let result = self.refresh_now(tenant).await;
        guard.finish(
            result
                .as_ref()
                .map(OAuthCredential::clone)
                .map_err(credential_message),
        );
        result
    }

    /// `None` makes the caller the leader; otherwise it waits on the receiver.
    fn register_inflight(&self, tenant: &TenantId) -> Option<oneshot::Receiver<RefreshResult>> {
        let mut guard = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(waiters) = guard.get_mut(tenant) {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            Some(rx)
        } else {
            guard.insert(tenant.clone(), Vec::new());
            None
        }
    }

    async fn refresh_now(&self, tenant: &TenantId) -> ConnectorResult<OAuthCredential> {
        // Re-read: a flight that finished just before we registered may
        // already have stored a fresh token.
        let stored = self
            .store
            .get(tenant)
            .await?
            .ok_or_else(|| ConnectorError::Credential(format!("No stored tokens for member {}", tenant)))?;
        let now = self.clock.now();
        if !stored.needs_refresh(now, self.buffer) {
            return Ok(stored);
        }

        info!(tenant = %tenant, "refreshing OAuth token");
        let fresh = self.refresher.refresh(&stored.refresh_token).await.map_err(|e| {
            error!(tenant = %tenant, error = %e, "token refresh failed");
            match e {
                ConnectorError::Credential(_) => e,
                other => ConnectorError::Credential(other.to_string()),
            }
        })?;

        let updated = OAuthCredential {
            tenant_id: stored.tenant_id.clone(),
            domain: stored.domain.clone(),
            access_token: fresh.access_token,
            refresh_token: fresh.refresh_token.unwrap_or(stored.refresh_token),
            expires_at: std::cmp::max(stored.expires_at, token_expiry(now, fresh.expires_in)),
            client_endpoint: fresh.client_endpoint.or(stored.client_endpoint),
            server_endpoint: fresh.server_endpoint.or(stored.server_endpoint),
            scope: fresh.scope.or(stored.scope),
        };

        if let Err(e) = self.store.upsert(&updated).await {
            error!(
                tenant = %tenant,
                error = %e,
                "refreshed token could not be persisted; in-memory token not committed"
            );
            return Err(ConnectorError::Credential(format!(
                "Failed to persist refreshed token: {}",
                e
            )));
        }

        info!(tenant = %tenant, expires_at = %updated.expires_at, "OAuth token refreshed");
        Ok(updated)
    }
}

fn credential_message(err: &ConnectorError) -> String {
    match err {
        ConnectorError::Credential(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Owns the leader's slot in the in-flight map. If the leader's future is
/// dropped mid-refresh the slot is cleared, which wakes waiters with an
/// error instead of leaving them parked.
struct InflightGuard<'a> {
    map: &'a Mutex<Waiters>,
    tenant: &'a TenantId,
    finished: bool,
}

impl InflightGuard<'_> {
    fn finish(mut self, result: RefreshResult) {
        let waiters = self
            .map
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.tenant)
            .unwrap_or_default();
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
        self.finished = true;
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.map
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(self.tenant);
        }
    }
}
