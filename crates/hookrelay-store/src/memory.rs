use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hookrelay_core::{
    store::{AccountStore, CredentialStore, RequestLogStore},
    Account, CoreResult, OAuthCredential, Plan, RequestLogEntry, RequestLogFilter,
    RequestLogPage, RequestLogRecord, TenantId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of CredentialStore for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    data: Arc<RwLock<HashMap<TenantId, OAuthCredential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, tenant: &TenantId) -> CoreResult<Option<OAuthCredential>> {
        let data = self.data.read().await;
        Ok(data.get(tenant).cloned())
    }

    async fn upsert(&self, credential: &OAuthCredential) -> CoreResult<()> {
        let mut data = self.data.write().await;
        let mut next = credential.clone();
        if let Some(existing) = data.get(&credential.tenant_id) {
            next.client_endpoint = next.client_endpoint.or_else(|| existing.client_endpoint.clone());
            next.server_endpoint = next.server_endpoint.or_else(|| existing.server_endpoint.clone());
            next.scope = next.scope.or_else(|| existing.scope.clone());
        }
        data.insert(credential.tenant_id.clone(), next);
        Ok(())
    }

    async fn delete(&self, tenant: &TenantId) -> CoreResult<bool> {
        let mut data = self.data.write().await;
        Ok(data.remove(tenant).is_some())
    }
}

#[derive(Debug, Default)]
struct AccountTable {
    next_id: i64,
    rows: HashMap<TenantId, Account>,
}

/// In-memory implementation of AccountStore for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    data: Arc<RwLock<AccountTable>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn upsert(&self, member_id: &TenantId, domain: &str) -> CoreResult<Account> {
        let mut table = self.data.write().await;
        let now = Utc::now();
        if let Some(account) = table.rows.get_mut(member_id) {
            account.domain = domain.to_string();
            account.updated_at = now;
            return Ok(account.clone());
        }
        table.next_id += 1;
        let account = Account {
            id: table.next_id,
            member_id: member_id.clone(),
            domain: domain.to_string(),
            plan: Plan::default(),
            installed_at: now,
            updated_at: now,
        };
        table.rows.insert(member_id.clone(), account.clone());
        Ok(account)
    }

    async fn get_or_create(&self, member_id: &TenantId, domain: &str) -> CoreResult<Account> {
        let mut table = self.data.write().await;
        if let Some(account) = table.rows.get(member_id) {
            return Ok(account.clone());
        }
        let now = Utc::now();
        table.next_id += 1;
        let account = Account {
            id: table.next_id,
            member_id: member_id.clone(),
            domain: domain.to_string(),
            plan: Plan::default(),
            installed_at: now,
            updated_at: now,
        };
        table.rows.insert(member_id.clone(), account.clone());
        Ok(account)
    }

    async fn get_by_member(&self, member_id: &TenantId) -> CoreResult<Option<Account>> {
        let table = self.data.read().await;
        Ok(table.rows.get(member_id).cloned())
    }

    async fn update_plan(&self, member_id: &TenantId, plan: Plan) -> CoreResult<Option<Account>> {
        let mut table = self.data.write().await;
        Ok(table.rows.get_mut(member_id).map(|account| {
            account.plan = plan;
            account.updated_at = Utc::now();
            account.clone()
        }))
    }
}

/// In-memory implementation of RequestLogStore for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryRequestLogStore {
    data: Arc<RwLock<Vec<RequestLogRecord>>>,
}

impl MemoryRequestLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row, oldest first.
    pub async fn all(&self) -> Vec<RequestLogRecord> {
        self.data.read().await.clone()
    }
}

#[async_trait]
impl RequestLogStore for MemoryRequestLogStore {
    async fn append(&self, entry: &RequestLogEntry) -> CoreResult<()> {
        let mut data = self.data.write().await;
        let id = data.len() as i64 + 1;
        data.push(RequestLogRecord {
            id,
            entry: entry.clone(),
        });
        Ok(())
    }

    async fn count_since(&self, account_id: i64, since: DateTime<Utc>) -> CoreResult<u64> {
        let data = self.data.read().await;
        let count = data
            .iter()
            .filter(|r| r.entry.account_id == account_id && r.entry.created_at >= since)
            .count();
        Ok(count as u64)
    }

    async fn list(&self, account_id: i64, filter: &RequestLogFilter) -> CoreResult<RequestLogPage> {
        let data = self.data.read().await;
        let mut matching: Vec<&RequestLogRecord> = data
            .iter()
            .filter(|r| r.entry.account_id == account_id)
            .filter(|r| filter.success.map_or(true, |s| r.entry.success == s))
            .filter(|r| {
                filter
                    .method
                    .as_deref()
                    .map_or(true, |m| r.entry.method.eq_ignore_ascii_case(m))
            })
            .collect();
        // Newest first
        matching.sort_by(|a, b| b.entry.created_at.cmp(&a.entry.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let rows = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.effective_limit() as usize)
            .cloned()
            .collect();
        Ok(RequestLogPage::new(rows, total, filter))
    }
}
