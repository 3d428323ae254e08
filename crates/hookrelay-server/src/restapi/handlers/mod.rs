//! REST API handlers

pub mod admin;
pub mod bitrix;
pub mod health;
pub mod preview;

use crate::error::{ErrorResponse, ServerError};
use crate::middleware::RequestId;
use axum::{
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Bracket nesting accepted in form bodies (`properties[a][b]`).
const FORM_MAX_DEPTH: usize = 5;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Decode a request body by hand so malformed input gets the uniform error
/// body. Form-urlencoded bodies with bracket keys (`auth[domain]=..`) decode
/// into the same nested shape as JSON; anything else is read as JSON.
pub(crate) fn decode_body<T: DeserializeOwned>(
    headers: &HeaderMap,
    body: &[u8],
    request_id: &RequestId,
) -> Result<T, ApiError> {
    let invalid = |message: String| {
        ServerError::InvalidInput(message).to_http_response(Some(request_id.0.clone()))
    };

    if is_form(headers) {
        let value: Value = serde_qs::Config::new(FORM_MAX_DEPTH, false)
            .deserialize_bytes(body)
            .map_err(|e| invalid(format!("Invalid form body: {}", e)))?;
        return serde_json::from_value(value).map_err(|e| invalid(format!("Invalid form body: {}", e)));
    }

    // An empty body reads as an empty object
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"{}" } else { body };
    serde_json::from_slice(body).map_err(|e| invalid(format!("Invalid JSON body: {}", e)))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}
