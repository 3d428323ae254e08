//! REST API DTOs

use hookrelay_core::{Account, Plan, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound robot invocation as posted by the workflow engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Invocation {
    #[serde(default)]
    pub event_token: Option<Value>,
    #[serde(default)]
    pub properties: Option<Value>,
    #[serde(default)]
    pub auth: Option<Value>,
    #[serde(default)]
    pub document_id: Option<Value>,
    #[serde(default)]
    pub document_type: Option<Value>,
}

impl Invocation {
    /// Non-blank event token, numbers rendered as text.
    pub fn event_token(&self) -> Option<String> {
        match self.event_token.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Auth block unless absent or null.
    pub fn auth(&self) -> Option<&Value> {
        self.auth.as_ref().filter(|v| !v.is_null())
    }
}

/// Synchronous acknowledgement of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Install / uninstall event body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifecycleEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub auth: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LifecycleReply {
    pub success: bool,
    pub message: String,
}

/// Preview request: `config` as an object or a JSON string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewMapping {
    pub output: String,
    pub path: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body_parsed: Option<Value>,
    pub output_mappings: Vec<PreviewMapping>,
    pub execution_time: u64,
    pub has_variables: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub member_id: TenantId,
    pub domain: String,
    pub plan: Plan,
    pub installed_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            member_id: account.member_id.clone(),
            domain: account.domain.clone(),
            plan: account.plan,
            installed_at: account.installed_at,
        }
    }
}

/// Query of `GET /api/admin/requests`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestLogQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub method: Option<String>,
    /// `success` or `failed`.
    #[serde(default)]
    pub status: Option<String>,
}

fn default_page() -> u64 {
    1
}
