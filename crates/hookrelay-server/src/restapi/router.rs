//! REST API router

use super::handlers::{admin, bitrix, health, preview};
use crate::{
    middleware::{PortalAuthLayer, RequestIdLayer},
    AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Create REST API router
pub fn create_router(app_state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/admin/usage", get(admin::usage))
        .route("/api/admin/account", get(admin::account))
        .route("/api/admin/requests", get(admin::requests))
        .route_layer(PortalAuthLayer::new(app_state.admin_auth.clone()));

    Router::new()
        .route("/bitrix-handler/execute", post(bitrix::execute))
        .route("/bitrix-handler/install", post(bitrix::install))
        .route("/bitrix-handler/uninstall", post(bitrix::uninstall))
        .route("/bitrix-handler/test", post(preview::test_request))
        .route("/health", get(health::health_check))
        .route("/", get(health::service_info))
        .merge(admin)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // RequestIdLayer is outermost so the admin layer sees the id
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestIdLayer),
        )
        .with_state(app_state)
}
