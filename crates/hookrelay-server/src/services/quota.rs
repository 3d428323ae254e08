//! Monthly request quota per account.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use hookrelay_core::{
    AccountStore, Clock, CoreResult, Plan, QuotaDecision, RequestLogStore, TenantId,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

/// Usage figures shown on the admin side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub plan: Plan,
    pub monthly_usage: u64,
    /// `null` for unlimited plans.
    pub quota: Option<u64>,
    pub installed_at: DateTime<Utc>,
}

pub struct QuotaService {
    accounts: Arc<dyn AccountStore>,
    request_logs: Arc<dyn RequestLogStore>,
    clock: Arc<dyn Clock>,
}

impl QuotaService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        request_logs: Arc<dyn RequestLogStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            request_logs,
            clock,
        }
    }

    /// Whether the tenant may run one more request this month.
    ///
    /// Any store failure allows the request.
    pub async fn check(&self, member_id: &TenantId, domain: &str) -> QuotaDecision {
        match self.try_check(member_id, domain).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(tenant = %member_id, error = %e, "quota check failed, allowing request");
                QuotaDecision::fail_open()
            }
        }
    }

    async fn try_check(&self, member_id: &TenantId, domain: &str) -> CoreResult<QuotaDecision> {
        let account = if domain.is_empty() {
            self.accounts.get_by_member(member_id).await?
        } else {
            Some(self.accounts.get_or_create(member_id, domain).await?)
        };
        let Some(account) = account else {
            warn!(tenant = %member_id, "no account and no domain to create one, allowing request");
            return Ok(QuotaDecision::fail_open());
        };

        let usage = self
            .request_logs
            .count_since(account.id, month_start(self.clock.now()))
            .await?;
        let quota = account.plan.monthly_limit();
        Ok(QuotaDecision {
            allowed: quota.map_or(true, |limit| usage < limit),
            usage,
            quota,
            plan: Some(account.plan),
            account_id: Some(account.id),
        })
    }

    /// `Ok(None)` when the tenant has no account.
    pub async fn usage(&self, member_id: &TenantId) -> CoreResult<Option<UsageReport>> {
        let Some(account) = self.accounts.get_by_member(member_id).await? else {
            return Ok(None);
        };
        let monthly_usage = self
            .request_logs
            .count_since(account.id, month_start(self.clock.now()))
            .await?;
        Ok(Some(UsageReport {
            plan: account.plan,
            monthly_usage,
            quota: account.plan.monthly_limit(),
            installed_at: account.installed_at,
        }))
    }
}

/// First instant of the UTC calendar month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Message placed in the callback when a tenant is over its monthly quota.
pub fn quota_exceeded_message(decision: &QuotaDecision) -> String {
    match decision.quota {
        Some(quota) => format!(
            "Monthly request quota exceeded ({}/{})",
            decision.usage, quota
        ),
        None => "Monthly request quota exceeded".to_string(),
    }
}
