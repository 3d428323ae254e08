mod common;

use axum::http::StatusCode;
use common::Harness;
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn preview_reports_response_and_mappings() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path("/search")
                .query_param("key", "k-123")
                .json_body(json!({"q": "real"}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"items": [{"name": "first"}], "count": 1}));
        })
        .await;

    let h = Harness::new();
    let (status, body) = h
        .post(
            "/bitrix-handler/test",
            json!({"config": {
                "url": upstream.url("/search"),
                "method": "POST",
                "bodyType": "raw",
                "rawBody": "{\"q\": \"{=Document:TITLE}\"}",
                "rawBodyTestData": "{\"q\": \"real\"}",
                "authType": "api-key",
                "apiKeyName": "key",
                "apiKeyValue": "k-123",
                "apiKeyLocation": "query",
                "outputMappings": [
                    {"path": "items[0].name", "output": "output_1"},
                    {"path": "missing", "output": "output_2", "fallback": "-"}
                ]
            }}),
        )
        .await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["statusText"], "OK");
    assert_eq!(body["responseBodyParsed"], json!({"items": [{"name": "first"}], "count": 1}));
    assert_eq!(body["hasVariables"], false);
    assert!(body["executionTime"].is_u64());
    assert_eq!(
        body["outputMappings"],
        json!([
            {"output": "output_1", "path": "items[0].name", "value": "first"},
            {"output": "output_2", "path": "missing", "value": "-"}
        ])
    );
    assert!(h.callbacks.sent().is_empty());
}

#[tokio::test]
async fn preview_flags_unresolved_placeholders() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/deal");
            then.status(200).body("plain text");
        })
        .await;

    let h = Harness::new();
    let config = json!({
        "url": upstream.url("/deal"),
        "headers": [{"key": "X-Deal", "value": "{=Document:ID}"}]
    });
    let (status, body) = h
        .post("/bitrix-handler/test", json!({"config": config.to_string()}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["hasVariables"], true);
    assert_eq!(body["responseBody"], "plain text");
    assert!(body.get("responseBodyParsed").is_none());
}

#[tokio::test]
async fn preview_errors() {
    let h = Harness::new();

    let (status, body) = h.post("/bitrix-handler/test", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "config is required");

    let (status, body) = h
        .post("/bitrix-handler/test", json!({"config": {"url": "not a url"}}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Invalid URL format"));
    assert_eq!(h.executor_calls(), 0);
}
