//! Contract Test: /api/settings/retention

use crate::support::{build_app, get_json, send_json};
use axum::http::StatusCode;
use serde_json::json;

/// 初期値は設定のデフォルト、更新後は上書き値を返す
#[tokio::test]
async fn test_retention_get_and_update() {
    let t = build_app("http://127.0.0.1:1", vec![]).await;

    let (status, body) = get_json(&t.app, "/api/settings/retention").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "health_check_retention_days": 7, "error_log_retention_days": 30 })
    );

    let update = json!({ "health_check_retention_days": 14, "error_log_retention_days": 60 });
    let (status, body) = send_json(&t.app, "PUT", "/api/settings/retention", &update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, update);

    let (_, body) = get_json(&t.app, "/api/settings/retention").await;
    assert_eq!(body, update);
}

/// 1未満の日数は400で、既存値は変わらない
#[tokio::test]
async fn test_retention_rejects_non_positive_days() {
    let t = build_app("http://127.0.0.1:1", vec![]).await;

    let update = json!({ "health_check_retention_days": 14, "error_log_retention_days": 0 });
    let (status, _) = send_json(&t.app, "PUT", "/api/settings/retention", &update).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = get_json(&t.app, "/api/settings/retention").await;
    assert_eq!(body["health_check_retention_days"], 7);
}

/// 日付の範囲を超える日数は400で、エラーログには残らない
#[tokio::test]
async fn test_retention_rejects_oversized_days() {
    let t = build_app("http://127.0.0.1:1", vec![]).await;

    let update =
        json!({ "health_check_retention_days": 200_000_000, "error_log_retention_days": 30 });
    let (status, body) = send_json(&t.app, "PUT", "/api/settings/retention", &update).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");

    let (_, body) = get_json(&t.app, "/api/settings/retention").await;
    assert_eq!(body["health_check_retention_days"], 7);

    let (_, stats) = get_json(&t.app, "/api/errors/stats").await;
    assert_eq!(stats["total_count"], 0);
}
