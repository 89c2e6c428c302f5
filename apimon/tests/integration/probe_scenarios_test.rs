//! Integration Test: プローブから集計までの一連の流れ

use crate::support::{build_app, build_app_with, get_json, test_config};
use apimon::auth::NoCredentialProvider;
use apimon::health::probe::CycleOutcome;
use apimon::registry::EndpointDescriptor;
use apimon::types::{CheckResult, CheckStatus};
use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run_cycle(t: &crate::support::TestApp) -> apimon::types::BatchSummary {
    match t.state.monitor.probe_cycle.run_if_idle().await {
        CycleOutcome::Completed(summary) => summary,
        CycleOutcome::AlreadyRunning => panic!("cycle unexpectedly running"),
    }
}

/// 42msで200を返すエンドポイントはPASSとして記録される
#[tokio::test]
async fn test_slow_success_is_recorded_with_latency() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(42)))
        .mount(&server)
        .await;
    let t = build_app(
        &server.uri(),
        vec![EndpointDescriptor::get("/api/health", "system", false)],
    )
    .await;

    let summary = run_cycle(&t).await;
    assert_eq!(summary.pass, 1);

    let (status, history) = get_json(&t.app, "/api/health/history").await;
    assert_eq!(status, StatusCode::OK);
    let row = &history[0];
    assert_eq!(row["status"], "PASS");
    assert_eq!(row["status_code"], 200);
    assert!(row["response_time_ms"].as_u64().unwrap() >= 42);
}

/// タイムアウトはrecent_failuresの先頭に現れる
#[tokio::test]
async fn test_timeout_leads_recent_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/reports"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/deals"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.probe_timeout = Duration::from_millis(200);
    // 直列にして記録順を固定する
    config.probe_concurrency = 1;
    let t = build_app_with(
        config,
        vec![
            EndpointDescriptor::get("/api/deals", "deals", false),
            EndpointDescriptor::get("/api/reports", "reports", false),
        ],
        Arc::new(NoCredentialProvider),
    )
    .await;

    let summary = run_cycle(&t).await;
    assert_eq!(summary.fail, 2);

    let (_, body) = get_json(&t.app, "/api/health/summary").await;
    let failures = body["recent_failures"].as_array().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0]["endpoint"], "/api/reports");
    assert!(failures[0]["status_code"].is_null());
    assert!(failures[0]["error_message"]
        .as_str()
        .unwrap()
        .contains("timeout"));
    assert_eq!(failures[1]["error_message"], "HTTP 500");
}

/// 保護エンドポイントは認証情報がなければ送信せずに失敗として記録する
#[tokio::test]
async fn test_protected_endpoints_without_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let t = build_app(
        &server.uri(),
        vec![
            EndpointDescriptor::get("/api/health", "system", false),
            EndpointDescriptor::get("/api/users", "users", true),
            EndpointDescriptor::get("/api/deals", "deals", true),
        ],
    )
    .await;

    let summary = run_cycle(&t).await;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.pass, 1);

    let skipped: Vec<&CheckResult> = summary
        .results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .collect();
    assert_eq!(skipped.len(), 2);
    for result in skipped {
        assert_eq!(
            result.error_message.as_deref(),
            Some("authentication unavailable")
        );
        assert!(result.response_time_ms.is_none());
    }

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
}

/// 結果の並びはレジストリ順、保存件数はエンドポイント数と一致する
#[tokio::test]
async fn test_concurrent_cycle_keeps_registry_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(20)))
        .mount(&server)
        .await;
    let endpoints: Vec<EndpointDescriptor> = (0..8)
        .map(|i| EndpointDescriptor::get(&format!("/api/item/{i}"), "items", false))
        .collect();
    let expected: Vec<String> = endpoints.iter().map(|e| e.path.clone()).collect();

    let mut config = test_config(&server.uri());
    config.probe_concurrency = 4;
    let t = build_app_with(config, endpoints, Arc::new(NoCredentialProvider)).await;

    let summary = run_cycle(&t).await;
    let order: Vec<String> = summary.results.iter().map(|r| r.endpoint.clone()).collect();
    assert_eq!(order, expected);

    let (_, page) = get_json(&t.app, "/api/health/checks").await;
    assert_eq!(page["total"], 8);
}

/// 8日前の結果は7日保持で削除され、1日前の結果は残る
#[tokio::test]
async fn test_retention_removes_only_expired_results() {
    let t = build_app("http://127.0.0.1:1", vec![]).await;
    let storage = &t.state.health_checks;

    let mut old = CheckResult::from_response("/api/health", "system", 200, 10, None);
    old.created_at = Utc::now() - ChronoDuration::days(8);
    let mut recent = CheckResult::from_response("/api/health", "system", 200, 10, None);
    recent.created_at = Utc::now() - ChronoDuration::days(1);
    storage.insert(&old).await.unwrap();
    storage.insert(&recent).await.unwrap();

    let deleted = t.state.monitor.retention.cleanup_older_than(7).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(storage.get(old.id).await.unwrap().is_none());
    assert!(storage.get(recent.id).await.unwrap().is_some());

    let (_, summary) = get_json(&t.app, "/api/health/summary?timeframe=7d").await;
    assert_eq!(summary["overall"]["total_checks"], 1);
}
