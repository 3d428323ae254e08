//! Response to return-value mapping.

use super::config::{OutputMapping, OutputSlot};
use super::executor::ExecutionResult;
use super::path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values handed back to the workflow engine.
///
/// Serializes flat: `responseBody`, `statusCode`, `responseHeaders`,
/// `error`, plus one `output_N` key per mapped slot. Unmapped slots are
/// absent rather than empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReturnValues {
    #[serde(rename = "responseBody")]
    pub response_body: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Response headers as a JSON object string.
    #[serde(rename = "responseHeaders")]
    pub response_headers: String,
    pub error: String,
    #[serde(flatten)]
    pub outputs: BTreeMap<OutputSlot, String>,
}

impl ReturnValues {
    pub fn from_execution(result: &ExecutionResult, mappings: &[OutputMapping]) -> Self {
        let mut values = Self {
            response_body: result
                .parsed_body
                .as_ref()
                .map(path::stringify)
                .unwrap_or_else(|| result.raw_body.clone()),
            status_code: result.status_code,
            response_headers: serde_json::to_string(&result.headers)
                .unwrap_or_else(|_| "{}".to_string()),
            error: String::new(),
            outputs: BTreeMap::new(),
        };

        // Non-JSON bodies make every mapping fall back
        let document = result.parsed_body.as_ref().filter(|v| !v.is_null());
        for mapping in mappings.iter().filter(|m| !m.path.is_empty()) {
            let value = document
                .and_then(|doc| path::extract(doc, &mapping.path))
                .map(path::stringify)
                .unwrap_or_else(|| mapping.fallback.clone());
            values.outputs.insert(mapping.output, value);
        }

        values
    }

    /// Error form: empty body, status 0, empty header object.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            response_body: String::new(),
            status_code: 0,
            response_headers: "{}".to_string(),
            error: message.into(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn output(&self, slot: OutputSlot) -> Option<&str> {
        self.outputs.get(&slot).map(String::as_str)
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}
