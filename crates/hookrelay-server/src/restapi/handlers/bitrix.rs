//! Workflow engine facing handlers: robot invocation and app lifecycle.

use super::{decode_body, ApiError};
use crate::{
    dto::{InvocationReply, LifecycleEvent, LifecycleReply},
    error::ServerError,
    middleware::RequestId,
    orchestration::FailureKind,
    AppState,
};
use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use hookrelay_connectors::PortalAuth;
use tracing::{error, info, warn};

/// POST /bitrix-handler/execute
pub async fn execute(
    State(app_state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<InvocationReply>), ApiError> {
    let invocation = decode_body(&headers, &body, &request_id)?;
    let outcome = app_state.orchestrator.handle(invocation).await;

    let status = match outcome.failure {
        None => StatusCode::OK,
        Some(FailureKind::Input) => StatusCode::BAD_REQUEST,
        Some(FailureKind::Callback) => StatusCode::BAD_GATEWAY,
    };
    Ok((
        status,
        Json(InvocationReply {
            success: outcome.success,
            message: outcome.message,
            error: outcome.error,
        }),
    ))
}

/// POST /bitrix-handler/install
pub async fn install(
    State(app_state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LifecycleReply>, ApiError> {
    let req_id = request_id.0.clone();
    let event: LifecycleEvent = decode_body(&headers, &body, &request_id)?;
    let auth = lifecycle_auth(&event).map_err(|e| e.to_http_response(Some(req_id.clone())))?;
    info!(event = ?event.event, domain = %auth.domain, tenant = ?auth.member_id, "app installation event");

    let credential = auth
        .to_new_credential()
        .map_err(|e| ServerError::from(e).to_http_response(Some(req_id.clone())))?;
    let tenant = credential.tenant_id.clone();
    app_state.tokens.save_from_install(credential).await.map_err(|e| {
        error!(%tenant, error = %e, "failed to store installation credential");
        ServerError::Internal("Failed to store credential".to_string())
            .to_http_response(Some(req_id.clone()))
    })?;

    // Account upsert failures do not fail the install
    if let Err(e) = app_state.accounts.upsert(&tenant, &auth.domain).await {
        warn!(%tenant, error = %e, "failed to upsert account on install");
    }

    Ok(Json(LifecycleReply {
        success: true,
        message: "Installation successful".to_string(),
    }))
}

/// POST /bitrix-handler/uninstall
pub async fn uninstall(
    State(app_state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LifecycleReply>, ApiError> {
    let req_id = request_id.0.clone();
    let event: LifecycleEvent = decode_body(&headers, &body, &request_id)?;
    let auth = lifecycle_auth(&event).map_err(|e| e.to_http_response(Some(req_id.clone())))?;
    info!(event = ?event.event, domain = %auth.domain, tenant = ?auth.member_id, "app uninstallation event");

    match &auth.member_id {
        Some(tenant) => {
            let removed = app_state.tokens.delete(tenant).await.map_err(|e| {
                error!(%tenant, error = %e, "failed to delete credential on uninstall");
                ServerError::Internal("Failed to delete credential".to_string())
                    .to_http_response(Some(req_id.clone()))
            })?;
            info!(%tenant, removed, "credential removed");
        }
        None => warn!(domain = %auth.domain, "uninstall without member_id, nothing to remove"),
    }

    Ok(Json(LifecycleReply {
        success: true,
        message: "Uninstallation successful".to_string(),
    }))
}

fn lifecycle_auth(event: &LifecycleEvent) -> Result<PortalAuth, ServerError> {
    let raw = event
        .auth
        .as_ref()
        .filter(|v| !v.is_null())
        .ok_or_else(|| ServerError::InvalidInput("auth is required".to_string()))?;
    Ok(PortalAuth::from_value(raw)?)
}
