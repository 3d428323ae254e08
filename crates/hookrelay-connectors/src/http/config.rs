//! Canonical request configuration.
//!
//! Robot properties arrive loosely typed: headers as a list, a JSON string
//! or a map, the whole config possibly nested as a JSON string under
//! `config`, numbers as strings. [`RequestConfig::from_properties`] turns
//! that into one typed structure before anything else looks at it.

use super::headers::HeaderList;
use super::validator;
use crate::error::{ConnectorError, ConnectorResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub const ALLOWED: &'static str = "GET, POST, PUT, DELETE, PATCH";

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }

    /// GET never carries a payload.
    pub fn allows_body(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            _ => Err(ConnectorError::Validation(format!(
                "Invalid HTTP method: {}. Allowed: {}",
                s,
                Method::ALLOWED
            ))),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// The body tab selected in the robot settings. Only `none` changes
/// compilation; every other value leaves the raw > form > legacy order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    #[default]
    Unspecified,
    None,
    Raw,
    FormData,
}

impl BodyType {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => BodyType::None,
            "raw" => BodyType::Raw,
            "form-data" | "form_data" | "formdata" => BodyType::FormData,
            _ => BodyType::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormField {
    pub key: String,
    pub value: String,
    pub test_data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

#[derive(Clone, PartialEq, Eq, Default)]
pub enum AuthSpec {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        name: String,
        value: String,
        location: ApiKeyLocation,
    },
}

impl fmt::Debug for AuthSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthSpec::None => f.write_str("None"),
            AuthSpec::Bearer { .. } => f.write_str("Bearer(***)"),
            AuthSpec::Basic { username, .. } => write!(f, "Basic({}:***)", username),
            AuthSpec::ApiKey { name, location, .. } => {
                write!(f, "ApiKey({} in {:?})", name, location)
            }
        }
    }
}

impl AuthSpec {
    fn texts(&self) -> Vec<&str> {
        match self {
            AuthSpec::None => vec![],
            AuthSpec::Bearer { token } => vec![token.as_str()],
            AuthSpec::Basic { username, password } => vec![username.as_str(), password.as_str()],
            AuthSpec::ApiKey { name, value, .. } => vec![name.as_str(), value.as_str()],
        }
    }
}

/// Named return value a mapping can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutputSlot {
    #[serde(rename = "output_1")]
    Output1,
    #[serde(rename = "output_2")]
    Output2,
    #[serde(rename = "output_3")]
    Output3,
    #[serde(rename = "output_4")]
    Output4,
    #[serde(rename = "output_5")]
    Output5,
}

impl OutputSlot {
    pub const ALL: [OutputSlot; 5] = [
        OutputSlot::Output1,
        OutputSlot::Output2,
        OutputSlot::Output3,
        OutputSlot::Output4,
        OutputSlot::Output5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSlot::Output1 => "output_1",
            OutputSlot::Output2 => "output_2",
            OutputSlot::Output3 => "output_3",
            OutputSlot::Output4 => "output_4",
            OutputSlot::Output5 => "output_5",
        }
    }
}

impl fmt::Display for OutputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputSlot {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s.trim())
            .ok_or_else(|| {
                ConnectorError::Validation(format!(
                    "Invalid output slot '{}'. Allowed: output_1..output_5",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputMapping {
    pub path: String,
    pub output: OutputSlot,
    pub fallback: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestConfig {
    pub url: String,
    pub method: Method,
    pub headers: HeaderList,
    pub body_type: BodyType,
    pub raw_body: String,
    pub raw_body_test_data: String,
    pub form_data: Vec<FormField>,
    /// Flat `body` property of older robot versions.
    pub legacy_body: String,
    pub auth: AuthSpec,
    pub timeout_ms: u64,
    pub output_mappings: Vec<OutputMapping>,
}

impl RequestConfig {
    /// Normalize invocation `properties` into a validated config.
    pub fn from_properties(properties: &JsonValue) -> ConnectorResult<Self> {
        let props = unwrap_properties(properties)?;
        validator::validate_properties(&props)?;
        Self::from_map(&props)
    }

    /// Normalize a bare config object, as sent by the preview endpoint.
    pub fn from_config(config: &JsonValue) -> ConnectorResult<Self> {
        let props = config.as_object().cloned().unwrap_or_default();
        validator::validate_properties(&props)?;
        Self::from_map(&props)
    }

    fn from_map(props: &Map<String, JsonValue>) -> ConnectorResult<Self> {
        let method = match text(props, "method") {
            m if m.trim().is_empty() => Method::Get,
            m => m.parse()?,
        };

        Ok(Self {
            url: text(props, "url").trim().to_string(),
            method,
            headers: parse_headers(props.get("headers"))?,
            body_type: BodyType::parse(&text(props, "bodyType")),
            raw_body: text(props, "rawBody"),
            raw_body_test_data: text(props, "rawBodyTestData"),
            form_data: parse_form_data(props.get("formData"))?,
            legacy_body: text(props, "body"),
            auth: parse_auth(props)?,
            timeout_ms: validator::parse_timeout(props.get("timeout"))
                .ok()
                .flatten()
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            output_mappings: parse_output_mappings(props.get("outputMappings"))?,
        })
    }

    /// Swap in test values: each form field's `test_data` replaces its
    /// value when non-empty, `raw_body_test_data` replaces the raw body
    /// when non-blank.
    pub fn into_test_mode(mut self) -> Self {
        for field in &mut self.form_data {
            if !field.test_data.is_empty() {
                field.value = std::mem::take(&mut field.test_data);
            }
        }
        if !self.raw_body_test_data.trim().is_empty() {
            self.raw_body = std::mem::take(&mut self.raw_body_test_data);
        }
        self.raw_body_test_data.clear();
        self
    }

    /// Whether `{=Document:FIELD}` style workflow placeholders are still
    /// present anywhere a request would carry them.
    pub fn has_unresolved_placeholders(&self) -> bool {
        let re = placeholder_regex();
        let mut texts = vec![
            self.url.as_str(),
            self.raw_body.as_str(),
            self.legacy_body.as_str(),
        ];
        texts.extend(self.headers.iter().flat_map(|(k, v)| [k, v]));
        texts.extend(self.form_data.iter().flat_map(|f| [f.key.as_str(), f.value.as_str()]));
        texts.extend(self.auth.texts());
        texts.into_iter().any(|t| re.is_match(t))
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{=\w+:\w+\}").expect("static placeholder pattern"))
}

/// Resolve the nested `config` JSON string, if present.
fn unwrap_properties(properties: &JsonValue) -> ConnectorResult<Map<String, JsonValue>> {
    let props = match properties {
        JsonValue::Object(map) => map,
        JsonValue::Null => return Ok(Map::new()),
        _ => {
            return Err(ConnectorError::Validation(
                "properties must be an object".to_string(),
            ))
        }
    };

    match props.get("config") {
        Some(JsonValue::String(raw)) if !raw.trim().is_empty() => {
            match serde_json::from_str::<JsonValue>(raw) {
                Ok(JsonValue::Object(inner)) => Ok(inner),
                _ => Err(ConnectorError::Validation(
                    "Invalid config JSON format".to_string(),
                )),
            }
        }
        Some(JsonValue::Object(inner)) => Ok(inner.clone()),
        _ => Ok(props.clone()),
    }
}

/// Scalar property as text. Numbers and booleans are rendered, anything
/// else reads as empty.
pub(crate) fn text(props: &Map<String, JsonValue>, key: &str) -> String {
    props.get(key).map(scalar_text).unwrap_or_default()
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Accept a list of `{key, value}`, a JSON string or a plain map.
pub fn parse_headers(raw: Option<&JsonValue>) -> ConnectorResult<HeaderList> {
    let invalid = || ConnectorError::Validation("Invalid headers JSON format".to_string());
    match raw {
        None | Some(JsonValue::Null) => Ok(HeaderList::new()),
        Some(JsonValue::Array(items)) => Ok(pairs_from_list(items)),
        Some(JsonValue::Object(map)) => Ok(pairs_from_map(map)),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(HeaderList::new()),
        Some(JsonValue::String(s)) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Object(map)) => Ok(pairs_from_map(&map)),
            Ok(JsonValue::Array(items)) => Ok(pairs_from_list(&items)),
            _ => Err(invalid()),
        },
        Some(_) => Err(invalid()),
    }
}

fn pairs_from_list(items: &[JsonValue]) -> HeaderList {
    items
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|entry| (text(entry, "key"), text(entry, "value")))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn pairs_from_map(map: &Map<String, JsonValue>) -> HeaderList {
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                JsonValue::Object(_) | JsonValue::Array(_) => v.to_string(),
                other => scalar_text(other),
            };
            (k.clone(), value)
        })
        .collect()
}

/// Lists may arrive embedded as JSON strings.
fn list_items(raw: Option<&JsonValue>, what: &str) -> ConnectorResult<Vec<JsonValue>> {
    match raw {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => Ok(items.clone()),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(JsonValue::String(s)) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Array(items)) => Ok(items),
            _ => Err(ConnectorError::Validation(format!(
                "Invalid {} JSON format",
                what
            ))),
        },
        Some(_) => Err(ConnectorError::Validation(format!(
            "Invalid {} JSON format",
            what
        ))),
    }
}

fn parse_form_data(raw: Option<&JsonValue>) -> ConnectorResult<Vec<FormField>> {
    Ok(list_items(raw, "form data")?
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|entry| FormField {
            key: text(entry, "key"),
            value: text(entry, "value"),
            test_data: text(entry, "testData"),
        })
        .filter(|f| !f.key.is_empty())
        .collect())
}

fn parse_output_mappings(raw: Option<&JsonValue>) -> ConnectorResult<Vec<OutputMapping>> {
    let mut mappings: Vec<OutputMapping> = Vec::new();
    for entry in list_items(raw, "output mappings")?.iter().filter_map(JsonValue::as_object) {
        let path = text(entry, "path").trim().to_string();
        let output = text(entry, "output");
        if path.is_empty() || output.trim().is_empty() {
            continue;
        }
        let output: OutputSlot = output.parse()?;
        if mappings.iter().any(|m| m.output == output) {
            return Err(ConnectorError::Validation(format!(
                "Duplicate output slot '{}'",
                output
            )));
        }
        mappings.push(OutputMapping {
            path,
            output,
            fallback: text(entry, "fallback"),
        });
    }
    Ok(mappings)
}

/// Incomplete credentials (a bearer type without a token, say) yield no
/// auth at all.
fn parse_auth(props: &Map<String, JsonValue>) -> ConnectorResult<AuthSpec> {
    let filled = |key: &str| Some(text(props, key)).filter(|v| !v.is_empty());
    let auth = match text(props, "authType").trim().to_ascii_lowercase().as_str() {
        "" | "none" => AuthSpec::None,
        "bearer" => filled("bearerToken")
            .map(|token| AuthSpec::Bearer { token })
            .unwrap_or_default(),
        "basic" => match (filled("basicUsername"), filled("basicPassword")) {
            (Some(username), Some(password)) => AuthSpec::Basic { username, password },
            _ => AuthSpec::None,
        },
        "api-key" | "apikey" | "api_key" => match (filled("apiKeyName"), filled("apiKeyValue")) {
            (Some(name), Some(value)) => AuthSpec::ApiKey {
                name,
                value,
                location: match text(props, "apiKeyLocation").trim() {
                    l if l.eq_ignore_ascii_case("query") => ApiKeyLocation::Query,
                    _ => ApiKeyLocation::Header,
                },
            },
            _ => AuthSpec::None,
        },
        other => {
            return Err(ConnectorError::Validation(format!(
                "Invalid auth type '{}'. Allowed: none, bearer, basic, api-key",
                other
            )))
        }
    };
    Ok(auth)
}
