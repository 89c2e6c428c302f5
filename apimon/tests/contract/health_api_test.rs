//! Contract Test: /api/health/*

use crate::support::{body_json, build_app, get_json, send, send_json};
use apimon::registry::EndpointDescriptor;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_target() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/deals"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "error": "maintenance window" })),
        )
        .mount(&server)
        .await;
    server
}

fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::get("/api/health", "system", false),
        EndpointDescriptor::get("/api/deals", "deals", false),
    ]
}

/// 空のDBではゼロ埋めのサマリーを返す
#[tokio::test]
async fn test_summary_on_empty_store() {
    let t = build_app("http://127.0.0.1:1", endpoints()).await;

    let (status, body) = get_json(&t.app, "/api/health/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timeframe"], "24h");
    assert_eq!(body["overall"]["total_checks"], 0);
    assert_eq!(body["overall"]["avg_response_time_ms"], 0.0);
    assert_eq!(body["per_category"], json!([]));
    assert_eq!(body["recent_failures"], json!([]));
}

/// 不正なtimeframeは400
#[tokio::test]
async fn test_summary_rejects_invalid_timeframe() {
    let t = build_app("http://127.0.0.1:1", endpoints()).await;

    let (status, body) = get_json(&t.app, "/api/health/summary?timeframe=24x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

/// 手動実行の結果がサマリー・履歴・一覧に反映される
#[tokio::test]
async fn test_run_checks_then_read_back() {
    let server = mock_target().await;
    let t = build_app(&server.uri(), endpoints()).await;

    let (status, batch) = send_json(&t.app, "POST", "/api/health/checks/run", &Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["total"], 2);
    assert_eq!(batch["pass"], 1);
    assert_eq!(batch["fail"], 1);

    let (status, summary) = get_json(&t.app, "/api/health/summary?timeframe=1h").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["timeframe"], "1h");
    assert_eq!(summary["overall"]["total_checks"], 2);
    assert_eq!(summary["overall"]["passed_checks"], 1);
    let failures = summary["recent_failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["endpoint"], "/api/deals");
    assert_eq!(failures[0]["status"], "FAIL");
    assert_eq!(failures[0]["status_code"], 503);
    assert_eq!(failures[0]["error_message"], "maintenance window");

    let (status, history) =
        get_json(&t.app, "/api/health/history?endpoint=/api/health&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "PASS");
    assert!(history[0]["error_message"].is_null());

    let (status, page) = get_json(&t.app, "/api/health/checks?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
}

/// 単一削除は204、2回目は404
#[tokio::test]
async fn test_delete_single_check() {
    let server = mock_target().await;
    let t = build_app(&server.uri(), endpoints()).await;
    let (_, batch) = send_json(&t.app, "POST", "/api/health/checks/run", &Value::Null).await;
    let id = batch["results"][0]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/health/checks/{id}");

    let response = send(&t.app, Request::delete(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&t.app, Request::delete(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &t.app,
        Request::delete("/api/health/checks/not-a-uuid")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// 全削除は削除件数を返す
#[tokio::test]
async fn test_delete_all_checks() {
    let server = mock_target().await;
    let t = build_app(&server.uri(), endpoints()).await;
    send_json(&t.app, "POST", "/api/health/checks/run", &Value::Null).await;

    let response = send(
        &t.app,
        Request::delete("/api/health/checks").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "deleted": 2 }));

    let (_, page) = get_json(&t.app, "/api/health/checks").await;
    assert_eq!(page["total"], 0);
}

/// ステータスは定期タスクと直近サイクルを返す
#[tokio::test]
async fn test_status_reports_tasks_and_last_cycle() {
    let server = mock_target().await;
    let t = build_app(&server.uri(), endpoints()).await;

    let (status, before) = get_json(&t.app, "/api/health/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["probe_running"], false);
    assert!(before["last_cycle"].is_null());
    assert_eq!(before["registered_endpoints"], 2);
    assert_eq!(before["probed_endpoints"], 2);
    let names: Vec<&str> = before["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["probe", "retention", "error_report"]);

    send_json(&t.app, "POST", "/api/health/checks/run", &Value::Null).await;

    let (_, after) = get_json(&t.app, "/api/health/status").await;
    assert_eq!(after["last_cycle"]["total"], 2);
    assert_eq!(after["last_cycle"]["fail"], 1);
}

/// リクエストIDは受け取った値をそのまま返す
#[tokio::test]
async fn test_request_id_is_echoed() {
    let t = build_app("http://127.0.0.1:1", endpoints()).await;

    let response = send(
        &t.app,
        Request::get("/api/health/summary")
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let response = send(
        &t.app,
        Request::get("/api/health/summary").body(Body::empty()).unwrap(),
    )
    .await;
    assert!(response.headers().contains_key("x-request-id"));
}

/// サイクル実行中の手動実行は202 already_running、実行中のほうは200で完了する
#[tokio::test]
async fn test_run_checks_while_cycle_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;
    let t = build_app(
        &server.uri(),
        vec![EndpointDescriptor::get("/api/health", "system", false)],
    )
    .await;

    let app = t.app.clone();
    let first = tokio::spawn(async move {
        send_json(&app, "POST", "/api/health/checks/run", &Value::Null).await
    });
    for _ in 0..100 {
        if t.state.monitor.probe_cycle.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(t.state.monitor.probe_cycle.is_running());

    let (status, body) = send_json(&t.app, "POST", "/api/health/checks/run", &Value::Null).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "status": "already_running" }));

    let (status, batch) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["total"], 1);

    let (_, page) = get_json(&t.app, "/api/health/checks").await;
    assert_eq!(page["total"], 1);
}

/// 定期タスクは名前で起動でき、未知の名前は404
#[tokio::test]
async fn test_run_task_by_name() {
    let t = build_app("http://127.0.0.1:1", endpoints()).await;

    let (status, body) =
        send_json(&t.app, "POST", "/api/health/tasks/retention/run", &Value::Null).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "status": "started" }));

    let (status, _) =
        send_json(&t.app, "POST", "/api/health/tasks/no-such-task/run", &Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
