//! Test request endpoint used by the robot settings UI.

use super::{decode_body, ApiError};
use crate::{
    dto::{PreviewMapping, PreviewRequest, PreviewResponse},
    error::ServerError,
    middleware::RequestId,
    AppState,
};
use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::HeaderMap,
    response::Json,
};
use hookrelay_connectors::{
    ConnectorError, ConnectorResult, RequestCompiler, RequestConfig, ReturnValues,
};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

/// POST /bitrix-handler/test
///
/// Runs the configured request once with test data substituted and
/// reports the raw response plus evaluated output mappings. Nothing is
/// called back and nothing counts against the quota. Failures of the
/// request itself are reported in the body with `success: false`.
pub async fn test_request(
    State(app_state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PreviewResponse>, ApiError> {
    let req: PreviewRequest = decode_body(&headers, &body, &request_id)?;
    let Some(raw) = req.config.filter(|v| !v.is_null()) else {
        return Err(ServerError::InvalidInput("config is required".to_string())
            .to_http_response(Some(request_id.0.clone())));
    };

    let config = match parse_config(&raw) {
        Ok(config) => config.into_test_mode(),
        Err(e) => {
            debug!(error = %e, "preview config rejected");
            return Ok(Json(PreviewResponse {
                success: false,
                error: Some(e.to_string()),
                ..Default::default()
            }));
        }
    };
    let has_variables = config.has_unresolved_placeholders();

    let started = Instant::now();
    let compiled = match RequestCompiler::compile(&config) {
        Ok(compiled) => compiled,
        Err(e) => {
            return Ok(Json(PreviewResponse {
                success: false,
                has_variables,
                error: Some(e.to_string()),
                ..Default::default()
            }))
        }
    };

    let execution = app_state.executor.execute(&compiled).await;
    let execution_time = started.elapsed().as_millis() as u64;

    let response = match execution {
        Ok(result) => {
            info!(method = %compiled.method, url = %compiled.url, status = result.status_code, elapsed_ms = execution_time, "test request completed");
            let values = ReturnValues::from_execution(&result, &config.output_mappings);
            let output_mappings = config
                .output_mappings
                .iter()
                .filter(|m| !m.path.is_empty())
                .map(|m| PreviewMapping {
                    output: m.output.to_string(),
                    path: m.path.clone(),
                    value: values.output(m.output).unwrap_or_default().to_string(),
                })
                .collect();
            PreviewResponse {
                success: true,
                status_code: Some(result.status_code),
                status_text: Some(result.status_text.clone()),
                response_headers: serde_json::to_value(&result.headers).ok(),
                response_body: Some(result.raw_body.clone()),
                response_body_parsed: result.parsed_body.clone(),
                output_mappings,
                execution_time,
                has_variables,
                error: None,
            }
        }
        Err(e) => {
            info!(method = %compiled.method, url = %compiled.url, error = %e, elapsed_ms = execution_time, "test request failed");
            PreviewResponse {
                success: false,
                execution_time,
                has_variables,
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
    };
    Ok(Json(response))
}

/// `config` arrives as an object or as its JSON text.
fn parse_config(raw: &Value) -> ConnectorResult<RequestConfig> {
    match raw {
        Value::String(text) => {
            let parsed: Value = serde_json::from_str(text).map_err(|e| {
                ConnectorError::Validation(format!("config is not valid JSON: {}", e))
            })?;
            RequestConfig::from_config(&parsed)
        }
        Value::Object(_) => RequestConfig::from_config(raw),
        _ => Err(ConnectorError::Validation(
            "config must be an object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_as_text_or_object() {
        let obj = json!({"url": "https://api.example/items", "method": "GET"});
        let from_obj = parse_config(&obj).unwrap();
        let from_text = parse_config(&Value::String(obj.to_string())).unwrap();
        assert_eq!(from_obj, from_text);

        let err = parse_config(&Value::String("{not json".into())).unwrap_err();
        assert!(err.to_string().starts_with("config is not valid JSON"));
        assert!(parse_config(&json!([1, 2])).is_err());
    }
}
