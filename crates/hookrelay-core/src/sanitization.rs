//! Redaction of credentials before payloads reach the logs.

use serde_json::{Map, Value as JsonValue};

/// Field names whose values are always masked (compared case-insensitively).
const SENSITIVE_FIELDS: &[&str] = &[
    "auth_id",
    "refresh_id",
    "access_token",
    "refresh_token",
    "client_secret",
    "authorization",
    "password",
    "bearertoken",
    "basicpassword",
    "apikeyvalue",
    "application_token",
];

const SENSITIVE_SUFFIXES: &[&str] = &["_token", "_secret", "_password"];

pub const REDACTED: &str = "***REDACTED***";

pub fn is_sensitive_field(field_name: &str) -> bool {
    let lower = field_name.to_ascii_lowercase();
    SENSITIVE_FIELDS.contains(&lower.as_str())
        || SENSITIVE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Copy of `value` with every sensitive scalar replaced by [`REDACTED`].
///
/// Header lists in `{key, value}` form are handled too: the `value` of an
/// entry is masked when its `key` names a sensitive header.
pub fn sanitize_json_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let keyed_secret = map
                .get("key")
                .and_then(JsonValue::as_str)
                .map(is_sensitive_field)
                .unwrap_or(false);
            let out: Map<String, JsonValue> = map
                .iter()
                .map(|(k, v)| {
                    let masked = is_sensitive_field(k) || (keyed_secret && k == "value");
                    let v = match v {
                        JsonValue::Object(_) | JsonValue::Array(_) => sanitize_json_value(v),
                        JsonValue::Null => JsonValue::Null,
                        _ if masked => JsonValue::String(REDACTED.to_string()),
                        other => other.clone(),
                    };
                    (k.clone(), v)
                })
                .collect();
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sanitize_json_value).collect()),
        other => other.clone(),
    }
}
