//! Invocation orchestration

pub mod orchestrator;

pub use orchestrator::{CallbackStatus, FailureKind, InvocationOutcome, Orchestrator, Stage};

use hookrelay_connectors::{TokenManager, TokenRefresher};
use hookrelay_core::{Clock, CredentialStore};
use std::sync::Arc;

/// Token manager over type-erased collaborators, as shared by the app.
pub type SharedTokenManager =
    TokenManager<Arc<dyn CredentialStore>, Arc<dyn TokenRefresher>, Arc<dyn Clock>>;
