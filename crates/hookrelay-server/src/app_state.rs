//! Application state shared by every route

use crate::orchestration::{Orchestrator, SharedTokenManager};
use crate::services::{AdminAuth, QuotaService};
use crate::settings::RelaySettings;
use anyhow::Context;
use chrono::Duration;
use hookrelay_connectors::{
    AppInfoVerifier, BizprocCallbackSender, CallbackSender, HttpExecutor, HttpTokenRefresher,
    PortalVerifier, ReqwestExecutor, TokenManager, TokenRefresher,
};
use hookrelay_core::{AccountStore, Clock, CredentialStore, RequestLogStore, SystemClock};
use hookrelay_store::{MemoryAccountStore, MemoryCredentialStore, MemoryRequestLogStore, SqlStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Database URL value that selects the in-memory stores.
pub const MEMORY_DATABASE: &str = "memory";

/// Collaborators the app is assembled from. Tests swap in doubles.
#[derive(Clone)]
pub struct Services {
    pub credentials: Arc<dyn CredentialStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub request_logs: Arc<dyn RequestLogStore>,
    pub executor: Arc<dyn HttpExecutor>,
    pub callback: Arc<dyn CallbackSender>,
    pub refresher: Arc<dyn TokenRefresher>,
    pub verifier: Arc<dyn PortalVerifier>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Network-backed collaborators over the given stores.
    pub fn live(
        credentials: Arc<dyn CredentialStore>,
        accounts: Arc<dyn AccountStore>,
        request_logs: Arc<dyn RequestLogStore>,
        settings: &RelaySettings,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hookrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            credentials,
            accounts,
            request_logs,
            executor: Arc::new(ReqwestExecutor::new()?),
            callback: Arc::new(BizprocCallbackSender::new(client.clone())),
            refresher: Arc::new(HttpTokenRefresher::new(
                client.clone(),
                settings.token_url.clone(),
                settings.client_id.clone(),
                settings.client_secret.clone(),
            )),
            verifier: Arc::new(AppInfoVerifier::new(client)),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub tokens: Arc<SharedTokenManager>,
    pub accounts: Arc<dyn AccountStore>,
    pub request_logs: Arc<dyn RequestLogStore>,
    pub quota: Arc<QuotaService>,
    pub executor: Arc<dyn HttpExecutor>,
    pub admin_auth: Arc<AdminAuth>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(services: Services, settings: &RelaySettings) -> Self {
        let tokens = Arc::new(
            TokenManager::new(
                services.credentials.clone(),
                services.refresher.clone(),
                services.clock.clone(),
            )
            .with_refresh_buffer(Duration::seconds(settings.refresh_buffer_secs)),
        );
        let quota = Arc::new(QuotaService::new(
            services.accounts.clone(),
            services.request_logs.clone(),
            services.clock.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            services.executor.clone(),
            services.callback.clone(),
            tokens.clone(),
            quota.clone(),
            services.request_logs.clone(),
            services.clock.clone(),
        ));
        let admin_auth = Arc::new(AdminAuth::new(
            services.verifier.clone(),
            services.accounts.clone(),
            Duration::seconds(settings.auth_cache_ttl_secs),
            services.clock.clone(),
        ));

        Self {
            orchestrator,
            tokens,
            accounts: services.accounts,
            request_logs: services.request_logs,
            quota,
            executor: services.executor,
            admin_auth,
            started_at: Instant::now(),
        }
    }

    /// Build app state from a database URL. `memory` keeps everything in
    /// process; anything else is handed to SQLite.
    pub async fn from_database_url(database_url: &str, settings: &RelaySettings) -> anyhow::Result<Self> {
        let services = if database_url == MEMORY_DATABASE {
            info!("using in-memory stores");
            Services::live(
                Arc::new(MemoryCredentialStore::new()),
                Arc::new(MemoryAccountStore::new()),
                Arc::new(MemoryRequestLogStore::new()),
                settings,
            )?
        } else {
            let store = Arc::new(
                SqlStore::new_with_config(database_url, settings.db_max_connections)
                    .await
                    .with_context(|| format!("opening database {}", database_url))?,
            );
            info!(%database_url, "database ready");
            Services::live(store.clone(), store.clone(), store, settings)?
        };
        Ok(Self::new(services, settings))
    }
}
