//! Admin caller verification middleware

use super::request_id::RequestId;
use crate::error::ServerError;
use crate::services::AdminAuth;
use axum::{
    http::Request,
    response::{IntoResponse, Response},
};
use hookrelay_core::TenantId;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

pub const MEMBER_ID_HEADER: &str = "x-member-id";
pub const AUTH_ID_HEADER: &str = "x-auth-id";
pub const DOMAIN_HEADER: &str = "x-domain";

/// Layer that verifies the portal headers of admin requests
#[derive(Clone)]
pub struct PortalAuthLayer {
    auth: Arc<AdminAuth>,
}

impl PortalAuthLayer {
    pub fn new(auth: Arc<AdminAuth>) -> Self {
        Self { auth }
    }
}

impl<S> Layer<S> for PortalAuthLayer {
    type Service = PortalAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PortalAuthService {
            inner,
            auth: self.auth.clone(),
        }
    }
}

/// Service that rejects unverified admin requests
#[derive(Clone)]
pub struct PortalAuthService<S> {
    inner: S,
    auth: Arc<AdminAuth>,
}

impl<S, B> Service<Request<B>> for PortalAuthService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let member_id = header(MEMBER_ID_HEADER);
        let auth_id = header(AUTH_ID_HEADER);
        let domain = header(DOMAIN_HEADER);
        let request_id = req.extensions().get::<RequestId>().map(|r| r.0.clone());

        let auth = self.auth.clone();
        // Take the service that was driven to readiness, leave a fresh clone
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (Some(member_id), Some(auth_id), Some(domain)) = (member_id, auth_id, domain) else {
                let err = ServerError::Unauthorized(
                    "Missing auth headers (X-Member-Id, X-Auth-Id, X-Domain)".to_string(),
                );
                return Ok(err.to_http_response(request_id).into_response());
            };

            match auth.verify(&TenantId::from(member_id), &auth_id, &domain).await {
                Ok(verified) => {
                    req.extensions_mut().insert(verified);
                    inner.call(req).await
                }
                Err(err) => Ok(err.to_http_response(request_id).into_response()),
            }
        })
    }
}
