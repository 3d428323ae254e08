pub mod auth;
pub mod callback;
pub mod error;
pub mod http;
pub mod oauth;

// Re-export commonly used types
pub use auth::{AppInfoVerifier, PortalAuth, PortalVerifier};
pub use callback::{BizprocCallbackSender, CallbackRequest, CallbackSender, CallbackTarget};
pub use error::{ConnectorError, ConnectorResult};
pub use http::{
    CompiledRequest, ExecutionResult, HttpExecutor, OutputMapping, OutputSlot, RequestCompiler,
    RequestConfig, ReqwestExecutor, ReturnValues,
};
pub use oauth::{HttpTokenRefresher, RefreshedToken, TokenManager, TokenRefresher};
