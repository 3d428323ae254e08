//! URL helpers for compiled requests

use crate::error::{ConnectorError, ConnectorResult};
use url::Url;

pub struct UrlBuilder;

impl UrlBuilder {
    /// Append one percent-encoded `name=value` pair, keeping the existing
    /// query string and fragment untouched.
    ///
    /// - `append_query("https://a.example/x", "key", "v 1")` -> `https://a.example/x?key=v%201`
    /// - `append_query("https://a.example/x?p=1#f", "k", "v")` -> `https://a.example/x?p=1&k=v#f`
    pub fn append_query(url: &str, name: &str, value: &str) -> ConnectorResult<String> {
        let mut parsed = Url::parse(url)
            .map_err(|e| ConnectorError::Validation(format!("Invalid URL '{}': {}", url, e)))?;

        let pair = format!(
            "{}={}",
            urlencoding::encode(name),
            urlencoding::encode(value)
        );
        let query = match parsed.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, pair),
            _ => pair,
        };
        parsed.set_query(Some(&query));
        Ok(parsed.to_string())
    }
}
