mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::{Harness, GOOD_AUTH_ID};
use hookrelay_core::{AccountStore, Plan, RequestLogEntry, RequestLogStore, TenantId};
use serde_json::json;
use std::sync::atomic::Ordering;

const PORTAL: [(&str, &str); 3] = [
    ("x-member-id", "m-admin"),
    ("x-auth-id", GOOD_AUTH_ID),
    ("x-domain", "admin.example"),
];

fn log_entry(account_id: i64, method: &str, success: bool) -> RequestLogEntry {
    RequestLogEntry {
        account_id,
        url: "https://api.example/items".into(),
        method: method.into(),
        status_code: Some(if success { 200 } else { 500 }),
        success,
        execution_time_ms: Some(12),
        error_message: None,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn missing_headers_are_unauthorized() {
    let h = Harness::new();
    let (status, body) = h
        .get("/api/admin/usage", &[("x-member-id", "m-admin"), ("x-domain", "admin.example")])
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing auth headers (X-Member-Id, X-Auth-Id, X-Domain)");
    assert!(body["requestId"].is_string());
    assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_auth_id_is_forbidden() {
    let h = Harness::new();
    let (status, body) = h
        .get(
            "/api/admin/account",
            &[("x-member-id", "m-admin"), ("x-auth-id", "stolen"), ("x-domain", "admin.example")],
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Auth verification failed");
    assert!(h.accounts.get_by_member(&TenantId::from("m-admin")).await.unwrap().is_none());
}

#[tokio::test]
async fn verification_is_cached_for_the_ttl() {
    let h = Harness::new();

    for _ in 0..3 {
        let (status, _) = h.get("/api/admin/account", &PORTAL).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 1);

    // A different auth id for the same member is verified again
    let (status, _) = h
        .get(
            "/api/admin/account",
            &[("x-member-id", "m-admin"), ("x-auth-id", "other"), ("x-domain", "admin.example")],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 2);

    h.clock.advance(Duration::minutes(5));
    let (status, _) = h.get("/api/admin/account", &PORTAL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn account_view() {
    let h = Harness::new();
    let (status, body) = h.get("/api/admin/account", &PORTAL).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["memberId"], "m-admin");
    assert_eq!(body["domain"], "admin.example");
    assert_eq!(body["plan"], "free");
    assert!(body["installedAt"].is_string());
}

#[tokio::test]
async fn verification_keeps_stored_domain() {
    let h = Harness::new();
    let member = TenantId::from("m-admin");
    h.accounts.upsert(&member, "installed.example").await.unwrap();

    let (status, body) = h.get("/api/admin/account", &PORTAL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domain"], "installed.example");
    let stored = h.accounts.get_by_member(&member).await.unwrap().unwrap();
    assert_eq!(stored.domain, "installed.example");
}

#[tokio::test]
async fn usage_counts_this_month() {
    let h = Harness::new();
    let member = TenantId::from("m-admin");
    let account = h.accounts.upsert(&member, "admin.example").await.unwrap();
    h.accounts.update_plan(&member, Plan::Basic).await.unwrap();
    for _ in 0..3 {
        h.logs.append(&log_entry(account.id, "GET", true)).await.unwrap();
    }

    let (status, body) = h.get("/api/admin/usage", &PORTAL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "basic");
    assert_eq!(body["monthlyUsage"], 3);
    assert_eq!(body["quota"], 1000);

    h.accounts.update_plan(&member, Plan::Enterprise).await.unwrap();
    let (_, body) = h.get("/api/admin/usage", &PORTAL).await;
    assert_eq!(body["quota"], json!(null));
}

#[tokio::test]
async fn request_log_is_filtered_and_paged() {
    let h = Harness::new();
    let member = TenantId::from("m-admin");
    let account = h.accounts.upsert(&member, "admin.example").await.unwrap();
    for i in 0..25 {
        let method = if i % 5 == 0 { "POST" } else { "GET" };
        h.logs.append(&log_entry(account.id, method, i % 2 == 0)).await.unwrap();
    }

    let (status, body) = h.get("/api/admin/requests", &PORTAL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 25);
    assert_eq!(body["page"], 1);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 20);

    let (_, body) = h.get("/api/admin/requests?page=2&limit=20", &PORTAL).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 5);

    let (_, body) = h.get("/api/admin/requests?method=post", &PORTAL).await;
    assert_eq!(body["total"], 5);
    assert!(body["data"].as_array().unwrap().iter().all(|r| r["method"] == "POST"));

    let (_, body) = h.get("/api/admin/requests?status=failed&limit=500", &PORTAL).await;
    assert_eq!(body["total"], 12);
    assert_eq!(body["data"].as_array().unwrap().len(), 12);

    let (status, body) = h.get("/api/admin/requests?status=maybe", &PORTAL).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
