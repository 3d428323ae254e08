//! Request body compilation.

use super::config::{BodyType, RequestConfig};
use super::headers::HeaderList;
use indexmap::IndexMap;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_JSON: &str = "application/json";

/// Which input produced the compiled body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySource {
    Raw,
    FormUrlEncoded,
    FormJson,
    Legacy,
}

/// Body builder picking exactly one source, first match wins:
/// a non-empty raw body, then non-empty form data, then the legacy body.
/// `bodyType = none` switches off the first two.
pub struct BodyBuilder;

impl BodyBuilder {
    /// Compile the body. Form data encoded as JSON adds
    /// `Content-Type: application/json` when no content type is present.
    pub fn build(config: &RequestConfig, headers: &mut HeaderList) -> Option<(String, BodySource)> {
        let structured = config.body_type != BodyType::None;

        if structured && !config.raw_body.is_empty() {
            return Some((config.raw_body.clone(), BodySource::Raw));
        }

        if structured && !config.form_data.is_empty() {
            let fields: IndexMap<&str, &str> = config
                .form_data
                .iter()
                .filter(|f| !f.key.is_empty())
                .map(|f| (f.key.as_str(), f.value.as_str()))
                .collect();

            let urlencoded = headers
                .content_type()
                .map(|ct| ct.to_ascii_lowercase().contains(FORM_URLENCODED))
                .unwrap_or(false);

            if urlencoded {
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                return Some((body, BodySource::FormUrlEncoded));
            }

            // IndexMap keeps field order in the JSON object
            let body = serde_json::to_string(&fields).unwrap_or_else(|_| "{}".to_string());
            if !headers.contains_ignore_case("content-type") {
                headers.insert("Content-Type", APPLICATION_JSON);
            }
            return Some((body, BodySource::FormJson));
        }

        if !config.legacy_body.is_empty() {
            return Some((config.legacy_body.clone(), BodySource::Legacy));
        }

        None
    }
}
