//! Turns a [`RequestConfig`] into a wire-ready request.

use super::body_builder::BodyBuilder;
use super::config::{ApiKeyLocation, AuthSpec, Method, RequestConfig};
use super::headers::HeaderList;
use super::url_builder::UrlBuilder;
use crate::error::ConnectorResult;
use base64::{engine::general_purpose, Engine as _};

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderList,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

pub struct RequestCompiler;

impl RequestCompiler {
    /// Body first, then auth on top of the resulting headers, so auth
    /// always has the final word on `Authorization`.
    pub fn compile(config: &RequestConfig) -> ConnectorResult<CompiledRequest> {
        let mut headers = config.headers.clone();
        let body = BodyBuilder::build(config, &mut headers).map(|(body, _)| body);
        let url = Self::apply_auth(&config.url, &config.auth, &mut headers)?;

        Ok(CompiledRequest {
            url,
            method: config.method,
            headers,
            body,
            timeout_ms: config.timeout_ms,
        })
    }

    fn apply_auth(url: &str, auth: &AuthSpec, headers: &mut HeaderList) -> ConnectorResult<String> {
        match auth {
            AuthSpec::None => {}
            AuthSpec::Bearer { token } => {
                headers.replace("Authorization", format!("Bearer {}", token));
            }
            AuthSpec::Basic { username, password } => {
                let encoded = general_purpose::STANDARD.encode(format!("{}:{}", username, password));
                headers.replace("Authorization", format!("Basic {}", encoded));
            }
            AuthSpec::ApiKey {
                name,
                value,
                location: ApiKeyLocation::Header,
            } => {
                headers.replace(name, value.clone());
            }
            AuthSpec::ApiKey {
                name,
                value,
                location: ApiKeyLocation::Query,
            } => {
                return UrlBuilder::append_query(url, name, value);
            }
        }
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::config::FormField;
    use serde_json::json;

    #[test]
    fn bearer_overwrites_any_authorization_case() {
        let config = RequestConfig::from_config(&json!({
            "url": "https://a.example",
            "headers": [{"key": "authorization", "value": "old"}, {"key": "Accept", "value": "*/*"}],
            "authType": "bearer",
            "bearerToken": "tok"
        }))
        .unwrap();
        let compiled = RequestCompiler::compile(&config).unwrap();
        let pairs: Vec<_> = compiled.headers.iter().collect();
        assert_eq!(pairs, vec![("Accept", "*/*"), ("Authorization", "Bearer tok")]);
    }

    #[test]
    fn basic_auth_is_base64() {
        let config = RequestConfig {
            url: "https://a.example".into(),
            auth: AuthSpec::Basic {
                username: "user".into(),
                password: "pass".into(),
            },
            ..Default::default()
        };
        let compiled = RequestCompiler::compile(&config).unwrap();
        assert_eq!(
            compiled.headers.get_ignore_case("authorization"),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn api_key_header_and_query() {
        let mut config = RequestConfig {
            url: "https://a.example/v1?x=1".into(),
            auth: AuthSpec::ApiKey {
                name: "X-Api-Key".into(),
                value: "secret".into(),
                location: ApiKeyLocation::Header,
            },
            ..Default::default()
        };
        let compiled = RequestCompiler::compile(&config).unwrap();
        assert_eq!(compiled.headers.get_ignore_case("x-api-key"), Some("secret"));
        assert_eq!(compiled.url, "https://a.example/v1?x=1");

        config.auth = AuthSpec::ApiKey {
            name: "api key".into(),
            value: "a&b".into(),
            location: ApiKeyLocation::Query,
        };
        let compiled = RequestCompiler::compile(&config).unwrap();
        assert_eq!(compiled.url, "https://a.example/v1?x=1&api%20key=a%26b");
        assert!(compiled.headers.is_empty());
    }

    #[test]
    fn form_body_with_bearer_keeps_json_content_type() {
        let config = RequestConfig {
            url: "https://a.example".into(),
            method: Method::Post,
            form_data: vec![FormField {
                key: "k".into(),
                value: "v".into(),
                test_data: String::new(),
            }],
            auth: AuthSpec::Bearer { token: "t".into() },
            timeout_ms: 1000,
            ..Default::default()
        };
        let compiled = RequestCompiler::compile(&config).unwrap();
        assert_eq!(compiled.body.as_deref(), Some(r#"{"k":"v"}"#));
        assert_eq!(compiled.headers.content_type(), Some("application/json"));
        assert_eq!(compiled.headers.get_ignore_case("Authorization"), Some("Bearer t"));
        assert_eq!(compiled.timeout_ms, 1000);
    }
}
