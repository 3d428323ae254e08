//! HookRelay server
//!
//! REST surface of the relay: robot invocations from the workflow engine,
//! app install hand-off, the settings UI test endpoint and the admin API.

pub mod app_state;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod orchestration;
pub mod restapi;
pub mod services;
pub mod settings;

// Re-export key types
pub use app_state::{AppState, Services, MEMORY_DATABASE};
pub use error::{ServerError, ServerResult};
pub use orchestration::{InvocationOutcome, Orchestrator};
pub use restapi::create_router;
pub use settings::RelaySettings;

/// Serve the REST API on `addr`.
pub async fn serve_rest(app_state: AppState, addr: &str) -> ServerResult<()> {
    restapi::serve(app_state, addr).await
}
