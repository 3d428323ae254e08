pub mod admin_auth;
pub mod auth_cache;
pub mod quota;

pub use admin_auth::{AdminAuth, VerifiedPortal};
pub use auth_cache::TtlCache;
pub use quota::{month_start, quota_exceeded_message, QuotaService, UsageReport};
