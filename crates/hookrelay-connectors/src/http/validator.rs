//! Structural checks on robot properties, run before any request is built.

use super::config::{text, Method, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS};
use crate::error::{ConnectorError, ConnectorResult};
use serde_json::{Map, Value as JsonValue};
use url::Url;

/// Collect every problem with the properties and report them together as
/// `Validation failed: a, b`.
pub fn validate_properties(props: &Map<String, JsonValue>) -> ConnectorResult<()> {
    let errors = collect_errors(props);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConnectorError::Validation(format!(
            "Validation failed: {}",
            errors.join(", ")
        )))
    }
}

fn collect_errors(props: &Map<String, JsonValue>) -> Vec<String> {
    let mut errors = Vec::new();

    let url = text(props, "url");
    if url.trim().is_empty() {
        errors.push("URL is required".to_string());
    } else if !is_valid_url(url.trim()) {
        errors.push("Invalid URL format. Must be http:// or https://".to_string());
    }

    let method = text(props, "method");
    if !method.trim().is_empty() && method.parse::<Method>().is_err() {
        errors.push(format!("Invalid HTTP method. Allowed: {}", Method::ALLOWED));
    }

    if parse_timeout(props.get("timeout")).is_err() {
        errors.push(format!(
            "Timeout must be between {} and {} milliseconds",
            MIN_TIMEOUT_MS, MAX_TIMEOUT_MS
        ));
    }

    errors
}

pub fn is_valid_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Timeout in milliseconds. `Ok(None)` when unset (absent, empty or a
/// numeric zero), `Err` when set but outside `1000..=300000`.
pub fn parse_timeout(raw: Option<&JsonValue>) -> Result<Option<u64>, String> {
    let value = match raw {
        None | Some(JsonValue::Null) => return Ok(None),
        Some(JsonValue::Number(n)) if n.as_f64() == Some(0.0) => return Ok(None),
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match value.map(f64::trunc) {
        Some(ms) if ms >= MIN_TIMEOUT_MS as f64 && ms <= MAX_TIMEOUT_MS as f64 => Ok(Some(ms as u64)),
        _ => Err(format!("invalid timeout {:?}", raw)),
    }
}
