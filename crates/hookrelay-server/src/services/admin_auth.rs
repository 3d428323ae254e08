//! Verification of admin callers against their portal.

use super::auth_cache::TtlCache;
use crate::error::ServerError;
use chrono::Duration;
use hookrelay_connectors::PortalVerifier;
use hookrelay_core::{Account, AccountStore, Clock, TenantId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A caller whose auth id the portal accepted.
#[derive(Clone)]
pub struct VerifiedPortal {
    pub member_id: TenantId,
    pub domain: String,
    /// `None` when the account lookup failed after verification.
    pub account: Option<Account>,
    auth_id: String,
}

impl fmt::Debug for VerifiedPortal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedPortal")
            .field("member_id", &self.member_id)
            .field("domain", &self.domain)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

pub struct AdminAuth {
    verifier: Arc<dyn PortalVerifier>,
    accounts: Arc<dyn AccountStore>,
    cache: TtlCache<TenantId, VerifiedPortal>,
}

impl AdminAuth {
    pub fn new(
        verifier: Arc<dyn PortalVerifier>,
        accounts: Arc<dyn AccountStore>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            accounts,
            cache: TtlCache::new(ttl, clock),
        }
    }

    /// Cached per member for the TTL. A cached entry only answers for the
    /// same auth id and domain it was verified with.
    pub async fn verify(
        &self,
        member_id: &TenantId,
        auth_id: &str,
        domain: &str,
    ) -> Result<VerifiedPortal, ServerError> {
        if let Some(hit) = self.cache.get(member_id) {
            if hit.auth_id == auth_id && hit.domain == domain {
                debug!(tenant = %member_id, "admin auth cache hit");
                return Ok(hit);
            }
        }

        if let Err(e) = self.verifier.verify(domain, auth_id).await {
            warn!(tenant = %member_id, %domain, error = %e, "admin auth verification failed");
            return Err(ServerError::Forbidden("Auth verification failed".to_string()));
        }

        let account = match self.accounts.get_or_create(member_id, domain).await {
            Ok(account) => Some(account),
            Err(e) => {
                error!(tenant = %member_id, error = %e, "failed to load account during auth");
                None
            }
        };

        let verified = VerifiedPortal {
            member_id: member_id.clone(),
            domain: domain.to_string(),
            account,
            auth_id: auth_id.to_string(),
        };
        self.cache.insert(member_id.clone(), verified.clone());
        Ok(verified)
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
