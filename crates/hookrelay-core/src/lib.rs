pub mod clock;
pub mod error;
pub mod sanitization;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use sanitization::{is_sensitive_field, sanitize_json_value};
pub use store::{AccountStore, CredentialStore, RequestLogStore};
pub use types::{
    rest_endpoint, token_expiry, Account, NewCredential, OAuthCredential, Plan, QuotaDecision, RequestLogEntry,
    RequestLogFilter, RequestLogPage, RequestLogRecord, TenantId, DEFAULT_TOKEN_LIFETIME_SECS,
    MAX_TOKEN_LIFETIME_SECS,
};
