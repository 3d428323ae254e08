//! Runtime knobs the server needs, independent of where they were loaded from.

use hookrelay_connectors::oauth::{DEFAULT_REFRESH_BUFFER_SECS, DEFAULT_TOKEN_URL};
use std::fmt;

/// Default lifetime of a successful admin auth verification.
pub const DEFAULT_AUTH_CACHE_TTL_SECS: i64 = 300;

#[derive(Clone)]
pub struct RelaySettings {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_buffer_secs: i64,
    pub auth_cache_ttl_secs: i64,
    pub db_max_connections: Option<u32>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            auth_cache_ttl_secs: DEFAULT_AUTH_CACHE_TTL_SECS,
            db_max_connections: None,
        }
    }
}

impl fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySettings")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("has_client_secret", &!self.client_secret.is_empty())
            .field("refresh_buffer_secs", &self.refresh_buffer_secs)
            .field("auth_cache_ttl_secs", &self.auth_cache_ttl_secs)
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}
