//! Middleware modules

pub mod portal_auth;
pub mod request_id;

pub use portal_auth::PortalAuthLayer;
pub use request_id::{RequestId, RequestIdLayer};
