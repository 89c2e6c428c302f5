//! Contract Test: /api/errors

use crate::support::{build_app, get_json, send, send_json};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;

fn report(code: &str, endpoint: &str) -> serde_json::Value {
    json!({
        "code": code,
        "message": "upstream timed out",
        "status": 504,
        "endpoint": endpoint,
        "details": { "attempt": 2 },
        "user_id": "u-1"
    })
}

/// 報告したエラーはIDで取得でき、統計に現れる
#[tokio::test]
async fn test_report_then_fetch_and_stats() {
    let t = build_app("http://127.0.0.1:1", vec![]).await;

    let (status, created) =
        send_json(&t.app, "POST", "/api/errors", &report("TIMEOUT", "/api/deals")).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!created["request_id"].as_str().unwrap().is_empty());

    send_json(&t.app, "POST", "/api/errors", &report("TIMEOUT", "/api/deals")).await;
    send_json(&t.app, "POST", "/api/errors", &report("DB_DOWN", "/api/users")).await;

    let (status, fetched) = get_json(&t.app, &format!("/api/errors/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["code"], "TIMEOUT");
    assert_eq!(fetched["details"], json!({ "attempt": 2 }));
    assert_eq!(fetched["user_id"], "u-1");

    let (status, stats) = get_json(&t.app, "/api/errors/stats?timeframe=24h&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["timeframe"], "24h");
    assert_eq!(stats["total_count"], 3);
    assert_eq!(stats["endpoint_stats"][0]["endpoint"], "/api/deals");
    assert_eq!(stats["endpoint_stats"][0]["count"], 2);
    assert_eq!(stats["code_stats"][0], json!({ "code": "TIMEOUT", "count": 2 }));
    assert_eq!(stats["recent_errors"].as_array().unwrap().len(), 1);
}

/// 存在しない・不正なIDは404
#[tokio::test]
async fn test_get_unknown_error_is_not_found() {
    let t = build_app("http://127.0.0.1:1", vec![]).await;

    let (status, _) = get_json(
        &t.app,
        "/api/errors/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get_json(&t.app, "/api/errors/garbage").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// 必須項目が空なら400
#[tokio::test]
async fn test_report_validates_payload() {
    let t = build_app("http://127.0.0.1:1", vec![]).await;

    let (status, _) = send_json(&t.app, "POST", "/api/errors", &report("", "/api/deals")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_status = report("TIMEOUT", "/api/deals");
    bad_status["status"] = json!(42);
    let (status, _) = send_json(&t.app, "POST", "/api/errors", &bad_status).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// ハンドラーの5xxはエラーログに記録される
#[tokio::test]
async fn test_server_errors_are_captured() {
    let t = build_app("http://127.0.0.1:1", vec![]).await;
    sqlx::query("DROP TABLE health_checks")
        .execute(&t.pool)
        .await
        .unwrap();

    let response = send(
        &t.app,
        Request::get("/api/health/summary")
            .header("x-request-id", "req-broken")
            .header("x-user-id", "operator-7")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let (status, stats) = get_json(&t.app, "/api/errors/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_count"], 1);
    let captured = &stats["recent_errors"][0];
    assert_eq!(captured["code"], "DATABASE_ERROR");
    assert_eq!(captured["status"], 500);
    assert_eq!(captured["endpoint"], "/api/health/summary");
    assert_eq!(captured["request_id"], "req-broken");
    assert_eq!(captured["user_id"], "operator-7");
    assert_eq!(captured["details"]["method"], "GET");
}
