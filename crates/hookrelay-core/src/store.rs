use crate::error::CoreResult;
use crate::types::{
    Account, OAuthCredential, Plan, RequestLogEntry, RequestLogFilter, RequestLogPage, TenantId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistence of per-tenant OAuth credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, tenant: &TenantId) -> CoreResult<Option<OAuthCredential>>;
    /// Insert or replace the tenant's row. `None` endpoints and scope keep
    /// the stored values.
    async fn upsert(&self, credential: &OAuthCredential) -> CoreResult<()>;
    async fn delete(&self, tenant: &TenantId) -> CoreResult<bool>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create the account or refresh its domain. The plan of an existing
    /// account is left untouched.
    async fn upsert(&self, member_id: &TenantId, domain: &str) -> CoreResult<Account>;
    /// Existing account unchanged, or a new free account with `domain`.
    async fn get_or_create(&self, member_id: &TenantId, domain: &str) -> CoreResult<Account>;
    async fn get_by_member(&self, member_id: &TenantId) -> CoreResult<Option<Account>>;
    async fn update_plan(&self, member_id: &TenantId, plan: Plan) -> CoreResult<Option<Account>>;
}

#[async_trait]
pub trait RequestLogStore: Send + Sync {
    async fn append(&self, entry: &RequestLogEntry) -> CoreResult<()>;
    /// Number of rows for `account_id` created at or after `since`.
    async fn count_since(&self, account_id: i64, since: DateTime<Utc>) -> CoreResult<u64>;
    async fn list(&self, account_id: i64, filter: &RequestLogFilter) -> CoreResult<RequestLogPage>;
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn get(&self, tenant: &TenantId) -> CoreResult<Option<OAuthCredential>> {
        (**self).get(tenant).await
    }
    async fn upsert(&self, credential: &OAuthCredential) -> CoreResult<()> {
        (**self).upsert(credential).await
    }
    async fn delete(&self, tenant: &TenantId) -> CoreResult<bool> {
        (**self).delete(tenant).await
    }
}

#[async_trait]
impl<T: AccountStore + ?Sized> AccountStore for Arc<T> {
    async fn upsert(&self, member_id: &TenantId, domain: &str) -> CoreResult<Account> {
        (**self).upsert(member_id, domain).await
    }
    async fn get_or_create(&self, member_id: &TenantId, domain: &str) -> CoreResult<Account> {
        (**self).get_or_create(member_id, domain).await
    }
    async fn get_by_member(&self, member_id: &TenantId) -> CoreResult<Option<Account>> {
        (**self).get_by_member(member_id).await
    }
    async fn update_plan(&self, member_id: &TenantId, plan: Plan) -> CoreResult<Option<Account>> {
        (**self).update_plan(member_id, plan).await
    }
}

#[async_trait]
impl<T: RequestLogStore + ?Sized> RequestLogStore for Arc<T> {
    async fn append(&self, entry: &RequestLogEntry) -> CoreResult<()> {
        (**self).append(entry).await
    }
    async fn count_since(&self, account_id: i64, since: DateTime<Utc>) -> CoreResult<u64> {
        (**self).count_since(account_id, since).await
    }
    async fn list(&self, account_id: i64, filter: &RequestLogFilter) -> CoreResult<RequestLogPage> {
        (**self).list(account_id, filter).await
    }
}
