//! Integration Test: スケジューラー経由のプローブ

use crate::support::{build_app, build_app_with, get_json, send_json, test_config};
use apimon::auth::NoCredentialProvider;
use apimon::health::scheduler::TriggerOutcome;
use apimon::health::{PROBE_TASK, RETENTION_TASK};
use apimon::registry::EndpointDescriptor;
use axum::http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 起動直後にプローブが1回走り、停止後はループが終わる
#[tokio::test]
async fn test_scheduler_runs_probe_on_start_and_stops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let t = build_app(
        &server.uri(),
        vec![EndpointDescriptor::get("/api/health", "system", false)],
    )
    .await;

    t.state.scheduler.start();

    let probe_runs = || {
        t.state
            .scheduler
            .status()
            .into_iter()
            .find(|task| task.name == PROBE_TASK)
            .map(|task| task.run_count)
            .unwrap_or(0)
    };
    let mut finished = false;
    for _ in 0..100 {
        if probe_runs() >= 1 {
            finished = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(finished, "probe did not run on start");
    assert!(t.state.monitor.probe_cycle.last_cycle().await.is_some());

    let (_, status) = get_json(&t.app, "/api/health/status").await;
    let probe = status["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|task| task["name"] == PROBE_TASK)
        .cloned()
        .unwrap();
    assert_eq!(probe["failure_count"], 0);
    assert!(probe["last_error"].is_null());
    assert_eq!(status["last_cycle"]["total"], 1);

    assert_eq!(
        t.state.scheduler.trigger("no-such-task"),
        TriggerOutcome::UnknownTask
    );

    t.state.shutdown.request_shutdown();
    tokio::time::timeout(Duration::from_secs(5), t.state.scheduler.stop())
        .await
        .expect("scheduler did not stop");
}

/// 応答の遅いプローブが走っている間も保持期間タスクは実行できる
#[tokio::test]
async fn test_slow_probe_does_not_block_retention() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let mut config = test_config(&server.uri());
    config.probe_timeout = Duration::from_secs(10);
    let t = build_app_with(
        config,
        vec![EndpointDescriptor::get("/api/slow", "system", false)],
        Arc::new(NoCredentialProvider),
    )
    .await;

    t.state.scheduler.start();
    for _ in 0..100 {
        if t.state.monitor.probe_cycle.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(t.state.monitor.probe_cycle.is_running());

    let (status, _) =
        send_json(&t.app, "POST", "/api/health/tasks/retention/run", &Value::Null).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let retention_runs = || {
        t.state
            .scheduler
            .status()
            .into_iter()
            .find(|task| task.name == RETENTION_TASK)
            .map(|task| (task.run_count, task.last_error))
            .unwrap_or((0, None))
    };
    let mut finished = false;
    for _ in 0..100 {
        if retention_runs().0 >= 1 {
            finished = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(finished, "retention did not run while the probe was in flight");
    assert_eq!(retention_runs().1, None);
    assert!(t.state.monitor.probe_cycle.is_running());

    t.state.scheduler.stop().await;
}
