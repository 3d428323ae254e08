mod common;

use axum::http::StatusCode;
use common::{direct_auth, Harness};
use hookrelay_connectors::OutputSlot;
use hookrelay_core::{AccountStore, Clock, CredentialStore, Plan, RequestLogEntry, RequestLogStore, TenantId};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn missing_event_token_is_rejected_without_side_effects() {
    let h = Harness::new();
    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({"properties": {"url": "https://api.example/"}, "auth": direct_auth("m1")}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "error": "event_token is required"}));
    assert_eq!(h.executor_calls(), 0);
    assert!(h.callbacks.sent().is_empty());
}

#[tokio::test]
async fn missing_auth_is_rejected() {
    let h = Harness::new();
    let (status, body) = h
        .post("/bitrix-handler/execute", json!({"event_token": "evt-1", "properties": {}}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "auth is required");
    assert_eq!(h.executor_calls(), 0);
}

#[tokio::test]
async fn malformed_json_body_gets_error_envelope() {
    let h = Harness::new();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/bitrix-handler/execute")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = h.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn executes_maps_and_calls_back() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|when, then| {
            when.method(POST)
                .path("/orders")
                .header("authorization", "Bearer up-token")
                .json_body(json!({"qty": 2}));
            then.status(201)
                .header("content-type", "application/json")
                .json_body(json!({"data": {"id": 42, "tags": ["a", "b"]}, "ok": true}));
        })
        .await;

    let h = Harness::new();
    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({
                "event_token": "evt-42",
                "document_id": ["crm", "CCrmDocumentDeal", "DEAL_1"],
                "auth": direct_auth("m1"),
                "properties": {
                    "url": upstream.url("/orders"),
                    "method": "POST",
                    "bodyType": "raw",
                    "rawBody": "{\"qty\": 2}",
                    "authType": "bearer",
                    "bearerToken": "up-token",
                    "outputMappings": [
                        {"path": "data.id", "output": "output_1"},
                        {"path": "data.tags", "output": "output_2"},
                        {"path": "data.missing", "output": "output_3", "fallback": "n/a"}
                    ]
                }
            }),
        )
        .await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "Request processed successfully"}));

    let sent = h.callbacks.sent();
    assert_eq!(sent.len(), 1);
    let (target, request) = &sent[0];
    assert_eq!(target.endpoint, "https://portal.example/rest/");
    assert_eq!(target.access_token, "portal-token");
    assert_eq!(request.event_token, "evt-42");
    assert_eq!(request.return_values.status_code, 201);
    assert_eq!(request.return_values.error, "");
    assert_eq!(request.return_values.output(OutputSlot::Output1), Some("42"));
    assert_eq!(request.return_values.output(OutputSlot::Output2), Some(r#"["a","b"]"#));
    assert_eq!(request.return_values.output(OutputSlot::Output3), Some("n/a"));
    assert_eq!(request.return_values.output(OutputSlot::Output4), None);
    assert!(request.log_message.starts_with("HTTP POST request to "));
    assert!(request.log_message.contains("completed with status 201"));

    let rows = h.wait_for_logs(1).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].entry.method, "POST");
    assert_eq!(rows[0].entry.status_code, Some(201));
    assert!(rows[0].entry.success);
}

#[tokio::test]
async fn non_2xx_upstream_is_still_processed() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/gone");
            then.status(404).body("not here");
        })
        .await;

    let h = Harness::new();
    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({
                "event_token": "evt-404",
                "auth": direct_auth("m1"),
                "properties": {
                    "url": upstream.url("/gone"),
                    "outputMappings": [{"path": "id", "output": "output_1", "fallback": "none"}]
                }
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let (_, request) = &h.callbacks.sent()[0];
    assert_eq!(request.return_values.status_code, 404);
    assert_eq!(request.return_values.response_body, "not here");
    assert_eq!(request.return_values.output(OutputSlot::Output1), Some("none"));

    let rows = h.wait_for_logs(1).await;
    assert!(!rows[0].entry.success);
}

#[tokio::test]
async fn validation_failure_goes_back_through_callback() {
    let h = Harness::new();
    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({
                "event_token": "evt-bad",
                "auth": direct_auth("m1"),
                "properties": {"url": "ftp://files.example/x", "method": "FETCH"}
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Validation failed: "));
    assert!(error.contains("Invalid URL format"));
    assert!(error.contains("Invalid HTTP method"));
    assert_eq!(h.executor_calls(), 0);

    let sent = h.callbacks.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.return_values.error, error);
    assert_eq!(sent[0].1.return_values.status_code, 0);
    assert_eq!(sent[0].1.log_message, format!("Error: {}", error));
    assert!(h.logs.all().await.is_empty());
}

#[tokio::test]
async fn transport_error_is_reported_in_return_values() {
    // Bind then drop a listener so the port refuses connections
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let h = Harness::new();
    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({
                "event_token": "evt-down",
                "auth": direct_auth("m1"),
                "properties": {"url": format!("http://127.0.0.1:{}/x", port), "timeout": 2000}
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let (_, request) = &h.callbacks.sent()[0];
    assert_eq!(request.return_values.status_code, 0);
    assert!(!request.return_values.error.is_empty());
    assert!(request.log_message.starts_with("Error: "));

    let rows = h.wait_for_logs(1).await;
    assert_eq!(rows[0].entry.status_code, None);
    assert!(rows[0].entry.error_message.is_some());
}

#[tokio::test]
async fn over_quota_tenant_is_not_executed() {
    let h = Harness::new();
    let member = TenantId::from("m-quota");
    let account = h.accounts.upsert(&member, "portal.example").await.unwrap();
    assert_eq!(account.plan, Plan::Free);
    for _ in 0..100 {
        h.logs
            .append(&RequestLogEntry {
                account_id: account.id,
                url: "https://api.example/".into(),
                method: "GET".into(),
                status_code: Some(200),
                success: true,
                execution_time_ms: Some(3),
                error_message: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
    }

    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({
                "event_token": "evt-q",
                "auth": direct_auth("m-quota"),
                "properties": {"url": "https://api.example/never"}
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(h.executor_calls(), 0);
    let (_, request) = &h.callbacks.sent()[0];
    assert_eq!(request.return_values.error, "Monthly request quota exceeded (100/100)");
    assert_eq!(h.logs.all().await.len(), 100);
}

#[tokio::test]
async fn marketplace_flow_uses_stored_credential() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(200).json_body(json!({"pong": true}));
        })
        .await;

    let h = Harness::new();
    let (status, _) = h
        .post(
            "/bitrix-handler/install",
            json!({
                "event": "ONAPPINSTALL",
                "auth": {
                    "DOMAIN": "shop.example",
                    "AUTH_ID": "stored-token",
                    "REFRESH_ID": "stored-refresh",
                    "AUTH_EXPIRES": 3600,
                    "MEMBER_ID": "m-market",
                    "CLIENT_ENDPOINT": "https://shop.example/rest"
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({
                "event_token": "evt-m",
                "auth": {"member_id": "m-market", "domain": "shop.example"},
                "properties": {"url": upstream.url("/ping")}
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Request processed successfully");
    let (target, _) = &h.callbacks.sent()[0];
    assert_eq!(target.endpoint, "https://shop.example/rest/");
    assert_eq!(target.access_token, "stored-token");
}

#[tokio::test]
async fn marketplace_flow_without_credential_skips_callback() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(200).body("ok");
        })
        .await;

    let h = Harness::new();
    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({
                "event_token": "evt-nocred",
                "auth": {"member_id": "m-unknown", "domain": "shop.example"},
                "properties": {"url": upstream.url("/ping")}
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().starts_with("Request processed, callback skipped"));
    assert_eq!(h.executor_calls(), 1);
    assert!(h.callbacks.sent().is_empty());
}

#[tokio::test]
async fn rejected_callback_fails_the_reply() {
    let upstream = MockServer::start_async().await;
    upstream
        .mock_async(|when, then| {
            when.method(GET).path("/ping");
            then.status(200).body("ok");
        })
        .await;

    let h = Harness::new();
    h.callbacks.fail.store(true, Ordering::SeqCst);
    let (status, body) = h
        .post(
            "/bitrix-handler/execute",
            json!({
                "event_token": "evt-cb",
                "auth": direct_auth("m1"),
                "properties": {"url": upstream.url("/ping")}
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Callback failed: HTTP 401 Unauthorized");
}

#[tokio::test]
async fn install_and_uninstall_manage_credentials() {
    let h = Harness::new();
    let member = TenantId::from("m-life");

    let (status, body) = h.post("/bitrix-handler/install", json!({"event": "ONAPPINSTALL"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "auth is required");

    let (status, body) = h
        .post(
            "/bitrix-handler/install",
            json!({"auth": {"domain": "life.example", "member_id": "m-life", "access_token": "a"}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "access_token and refresh_token are required");

    let (status, body) = h
        .post(
            "/bitrix-handler/install",
            json!({
                "event": "ONAPPINSTALL",
                "auth": {
                    "domain": "life.example",
                    "member_id": "m-life",
                    "access_token": "a1",
                    "refresh_token": "r1",
                    "expires_in": 3600
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "Installation successful"}));
    let stored = h.credentials.get(&member).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "a1");
    assert_eq!(stored.refresh_token, "r1");
    assert!(h.accounts.get_by_member(&member).await.unwrap().is_some());

    let (status, body) = h
        .post(
            "/bitrix-handler/uninstall",
            json!({"event": "ONAPPUNINSTALL", "auth": {"domain": "life.example", "member_id": "m-life"}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Uninstallation successful");
    assert!(h.credentials.get(&member).await.unwrap().is_none());
    assert_eq!(h.state.tokens.get_valid_token(&member).await.unwrap(), None);
}

#[tokio::test]
async fn install_with_oversized_lifetime_keeps_default_expiry() {
    let h = Harness::new();
    let member = TenantId::new("m-huge");
    let (status, _) = h
        .post(
            "/bitrix-handler/install",
            json!({
                "auth": {
                    "domain": "huge.example",
                    "member_id": "m-huge",
                    "access_token": "a1",
                    "refresh_token": "r1",
                    "expires_in": i64::MAX
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let stored = h.credentials.get(&member).await.unwrap().unwrap();
    assert_eq!(stored.expires_at, h.clock.now() + chrono::Duration::seconds(3600));
}

#[tokio::test]
async fn form_encoded_install_is_accepted() {
    let h = Harness::new();
    let form = "event=ONAPPINSTALL&auth%5Bdomain%5D=form.example&auth%5Bmember_id%5D=m-form\
                &auth%5Baccess_token%5D=a1&auth%5Brefresh_token%5D=r1&auth%5Bexpires_in%5D=3600";
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/bitrix-handler/install")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(axum::body::Body::from(form))
        .unwrap();
    let (status, body) = h.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Installation successful");
    let stored = h.credentials.get(&TenantId::new("m-form")).await.unwrap().unwrap();
    assert_eq!(stored.domain, "form.example");
    assert_eq!(stored.refresh_token, "r1");
}

#[tokio::test]
async fn health_and_service_info() {
    let h = Harness::new();
    let (status, body) = h.get("/health", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
    assert!(body["uptime_secs"].is_u64());

    let (status, body) = h.get("/", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "hookrelay");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let h = Harness::new();
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(h.router.clone(), request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(h.router.clone(), request).await.unwrap();
    assert!(!response.headers()["x-request-id"].is_empty());
}
