//! Admin API handlers. Every route runs behind the portal auth layer.

use super::ApiError;
use crate::{
    dto::{AccountView, RequestLogQuery},
    error::ServerError,
    middleware::RequestId,
    services::{UsageReport, VerifiedPortal},
    AppState,
};
use axum::{
    extract::{Extension, Query, State},
    response::Json,
};
use hookrelay_core::{Account, RequestLogFilter, RequestLogPage};
use tracing::error;

/// GET /api/admin/usage
pub async fn usage(
    State(app_state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(portal): Extension<VerifiedPortal>,
) -> Result<Json<UsageReport>, ApiError> {
    let report = app_state.quota.usage(&portal.member_id).await.map_err(|e| {
        error!(tenant = %portal.member_id, error = %e, "failed to load usage");
        ServerError::Internal("Failed to load usage data".to_string())
            .to_http_response(Some(request_id.0.clone()))
    })?;
    report.map(Json).ok_or_else(|| not_found(&request_id))
}

/// GET /api/admin/account
pub async fn account(
    Extension(request_id): Extension<RequestId>,
    Extension(portal): Extension<VerifiedPortal>,
) -> Result<Json<AccountView>, ApiError> {
    let account = require_account(&portal, &request_id)?;
    Ok(Json(AccountView::from(account)))
}

/// GET /api/admin/requests
pub async fn requests(
    State(app_state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(portal): Extension<VerifiedPortal>,
    Query(query): Query<RequestLogQuery>,
) -> Result<Json<RequestLogPage>, ApiError> {
    let account = require_account(&portal, &request_id)?;

    let success = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) if s.eq_ignore_ascii_case("success") => Some(true),
        Some(s) if s.eq_ignore_ascii_case("failed") => Some(false),
        Some(other) => {
            return Err(ServerError::InvalidInput(format!(
                "status must be 'success' or 'failed', got '{}'",
                other
            ))
            .to_http_response(Some(request_id.0.clone())))
        }
    };
    let filter = RequestLogFilter {
        success,
        method: query
            .method
            .map(|m| m.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty()),
        page: query.page,
        limit: query.limit.unwrap_or(RequestLogFilter::DEFAULT_LIMIT),
    };

    let page = app_state
        .request_logs
        .list(account.id, &filter)
        .await
        .map_err(|e| {
            error!(tenant = %portal.member_id, error = %e, "failed to load request log");
            ServerError::Internal("Failed to load request log".to_string())
                .to_http_response(Some(request_id.0.clone()))
        })?;
    Ok(Json(page))
}

fn require_account<'a>(
    portal: &'a VerifiedPortal,
    request_id: &RequestId,
) -> Result<&'a Account, ApiError> {
    portal.account.as_ref().ok_or_else(|| not_found(request_id))
}

fn not_found(request_id: &RequestId) -> ApiError {
    ServerError::NotFound("Account not found".to_string()).to_http_response(Some(request_id.0.clone()))
}
