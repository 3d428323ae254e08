//! Portal authentication as it arrives from Bitrix24.
//!
//! Events carry the auth block in two spellings (`access_token` vs
//! `AUTH_ID`, `domain` vs `DOMAIN`, ...). [`PortalAuth`] is the one typed
//! form the rest of the crate sees.

use crate::error::{ConnectorError, ConnectorResult};
use async_trait::async_trait;
use hookrelay_core::{rest_endpoint, NewCredential, TenantId};
use reqwest::Client;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Default, PartialEq)]
pub struct PortalAuth {
    pub domain: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub member_id: Option<TenantId>,
    pub client_endpoint: Option<String>,
    pub server_endpoint: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

impl fmt::Debug for PortalAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalAuth")
            .field("domain", &self.domain)
            .field("member_id", &self.member_id)
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("client_endpoint", &self.client_endpoint)
            .finish()
    }
}

impl PortalAuth {
    /// Normalize an auth block. Accepts both spellings of every field.
    pub fn from_value(value: &JsonValue) -> ConnectorResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ConnectorError::Validation("auth must be an object".to_string()))?;

        Ok(Self {
            domain: pick(map, &["domain", "DOMAIN"]).unwrap_or_default(),
            access_token: pick(map, &["access_token", "AUTH_ID"]),
            refresh_token: pick(map, &["refresh_token", "REFRESH_ID"]),
            member_id: pick(map, &["member_id", "MEMBER_ID"]).map(TenantId::from),
            client_endpoint: pick(map, &["client_endpoint", "CLIENT_ENDPOINT"]),
            server_endpoint: pick(map, &["server_endpoint", "SERVER_ENDPOINT"]),
            expires_in: pick(map, &["expires_in", "AUTH_EXPIRES"])
                .and_then(|v| v.trim().parse::<i64>().ok()),
            scope: pick(map, &["scope", "SCOPE"]),
        })
    }

    pub fn rest_endpoint(&self) -> String {
        rest_endpoint(self.client_endpoint.as_deref(), &self.domain)
    }

    /// Credential to persist on install. Needs a member id and both tokens.
    pub fn to_new_credential(&self) -> ConnectorResult<NewCredential> {
        let tenant_id = self
            .member_id
            .clone()
            .ok_or_else(|| ConnectorError::Validation("member_id is required".to_string()))?;
        let (access_token, refresh_token) = match (&self.access_token, &self.refresh_token) {
            (Some(a), Some(r)) => (a.clone(), r.clone()),
            _ => {
                return Err(ConnectorError::Validation(
                    "access_token and refresh_token are required".to_string(),
                ))
            }
        };
        Ok(NewCredential {
            tenant_id,
            domain: self.domain.clone(),
            access_token,
            refresh_token,
            expires_in: self.expires_in,
            client_endpoint: self.client_endpoint.clone(),
            server_endpoint: self.server_endpoint.clone(),
            scope: self.scope.clone(),
        })
    }
}

/// First non-empty value among `keys`, numbers rendered as text.
fn pick(map: &Map<String, JsonValue>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match map.get(*k) {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Confirms that an auth id really belongs to a portal.
#[async_trait]
pub trait PortalVerifier: Send + Sync {
    async fn verify(&self, domain: &str, auth_id: &str) -> ConnectorResult<()>;
}

/// Verifies by calling the portal's `app.info` method with the auth id.
#[derive(Debug, Clone)]
pub struct AppInfoVerifier {
    client: Client,
    /// Overrides `https://{domain}/rest/` for tests and proxies.
    base_url: Option<String>,
}

impl AppInfoVerifier {
    pub const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: Some(base_url.into()),
        }
    }
}

#[async_trait]
impl PortalVerifier for AppInfoVerifier {
    async fn verify(&self, domain: &str, auth_id: &str) -> ConnectorResult<()> {
        let base = rest_endpoint(self.base_url.as_deref(), domain);
        let response = self
            .client
            .get(format!("{}app.info", base))
            .query(&[("auth", auth_id)])
            .timeout(Self::TIMEOUT)
            .send()
            .await
            .map_err(|e| ConnectorError::Transport(format!("app.info request failed: {}", e)))?;

        let status = response.status();
        let body: JsonValue = response.json().await.unwrap_or(JsonValue::Null);
        if let Some(error) = body.get("error").and_then(JsonValue::as_str) {
            warn!(%domain, %error, "portal rejected auth id");
            return Err(ConnectorError::Credential(format!(
                "Auth verification failed: {}",
                error
            )));
        }
        if !status.is_success() {
            return Err(ConnectorError::Credential(format!(
                "Auth verification failed: HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
