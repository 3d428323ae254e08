use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Lifetime applied when the provider omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Longest lifetime taken from a provider; anything outside `1..=` this
/// falls back to the default.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = i32::MAX as i64;

/// Expiry instant for a token issued at `now` with the reported lifetime.
pub fn token_expiry(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let lifetime = expires_in
        .filter(|secs| (1..=MAX_TOKEN_LIFETIME_SECS).contains(secs))
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    now.checked_add_signed(Duration::seconds(lifetime))
        .unwrap_or(now)
}

/// Stable identifier of one installed portal (the Bitrix24 `member_id`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Persisted OAuth credential of a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthCredential {
    pub tenant_id: TenantId,
    pub domain: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub client_endpoint: Option<String>,
    pub server_endpoint: Option<String>,
    pub scope: Option<String>,
}

impl OAuthCredential {
    /// True once `now` has entered the refresh window in front of `expires_at`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now >= self.expires_at - buffer
    }

    /// Base REST endpoint, always ending with a slash.
    pub fn rest_endpoint(&self) -> String {
        rest_endpoint(self.client_endpoint.as_deref(), &self.domain)
    }
}

/// Resolve the portal REST base URL from an explicit endpoint or the domain.
pub fn rest_endpoint(client_endpoint: Option<&str>, domain: &str) -> String {
    match client_endpoint.map(str::trim).filter(|s| !s.is_empty()) {
        Some(ep) if ep.ends_with('/') => ep.to_string(),
        Some(ep) => format!("{}/", ep),
        None => format!("https://{}/rest/", domain),
    }
}

/// Credential data handed over by an install event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCredential {
    pub tenant_id: TenantId,
    pub domain: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub client_endpoint: Option<String>,
    pub server_endpoint: Option<String>,
    pub scope: Option<String>,
}

impl NewCredential {
    pub fn into_credential(self, now: DateTime<Utc>) -> OAuthCredential {
        let expires_at = token_expiry(now, self.expires_in);
        OAuthCredential {
            tenant_id: self.tenant_id,
            domain: self.domain,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            client_endpoint: self.client_endpoint,
            server_endpoint: self.server_endpoint,
            scope: self.scope,
        }
    }
}

/// Subscription plan of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Pro,
    Enterprise,
}

impl Plan {
    /// Monthly request limit, `None` means unlimited.
    pub fn monthly_limit(&self) -> Option<u64> {
        match self {
            Plan::Free => Some(100),
            Plan::Basic => Some(1_000),
            Plan::Pro => Some(10_000),
            Plan::Enterprise => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "basic" => Ok(Plan::Basic),
            "pro" => Ok(Plan::Pro),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(CoreError::Invalid(format!("unknown plan '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub member_id: TenantId,
    pub domain: String,
    pub plan: Plan,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a monthly quota check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub usage: u64,
    /// `None` for unlimited plans.
    pub quota: Option<u64>,
    pub plan: Option<Plan>,
    pub account_id: Option<i64>,
}

impl QuotaDecision {
    /// Decision used when the quota lookup itself failed.
    pub fn fail_open() -> Self {
        Self {
            allowed: true,
            usage: 0,
            quota: None,
            plan: None,
            account_id: None,
        }
    }
}

/// One row of the request log, as written by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub account_id: i64,
    pub url: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub success: bool,
    pub execution_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stored request log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogRecord {
    pub id: i64,
    #[serde(flatten)]
    pub entry: RequestLogEntry,
}

/// Filter for listing request log rows.
#[derive(Debug, Clone, Default)]
pub struct RequestLogFilter {
    pub success: Option<bool>,
    pub method: Option<String>,
    pub page: u64,
    pub limit: u64,
}

impl RequestLogFilter {
    pub const DEFAULT_LIMIT: u64 = 20;
    pub const MAX_LIMIT: u64 = 100;

    /// 1-based page, zero treated as the first page.
    pub fn effective_page(&self) -> u64 {
        self.page.max(1)
    }

    pub fn effective_limit(&self) -> u64 {
        match self.limit {
            0 => Self::DEFAULT_LIMIT,
            n => n.min(Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.effective_page() - 1) * self.effective_limit()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestLogPage {
    pub data: Vec<RequestLogRecord>,
    pub total: u64,
    pub page: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl RequestLogPage {
    pub fn new(data: Vec<RequestLogRecord>, total: u64, filter: &RequestLogFilter) -> Self {
        let limit = filter.effective_limit();
        Self {
            data,
            total,
            page: filter.effective_page(),
            total_pages: total.div_ceil(limit),
        }
    }
}
