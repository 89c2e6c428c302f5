//! テスト共通ヘルパー
//!
//! インメモリDBと任意のプローブ先でアプリを組み立てる。

#![allow(dead_code)]

use apimon::auth::{CredentialProvider, NoCredentialProvider};
use apimon::config::MonitorConfig;
use apimon::registry::{EndpointDescriptor, EndpointRegistry};
use apimon::shutdown::ShutdownController;
use apimon::{api, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// 組み立て済みのテストアプリ
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub pool: SqlitePool,
}

/// マイグレーション済みのインメモリDB
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    apimon::db::migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// テスト用設定（短いタイムアウト）
pub fn test_config(base_url: &str) -> MonitorConfig {
    MonitorConfig {
        target_base_url: base_url.to_string(),
        probe_timeout: Duration::from_secs(2),
        ..MonitorConfig::default()
    }
}

/// 認証なしでアプリを組み立てる
pub async fn build_app(base_url: &str, endpoints: Vec<EndpointDescriptor>) -> TestApp {
    build_app_with(test_config(base_url), endpoints, Arc::new(NoCredentialProvider)).await
}

/// 設定と認証プロバイダーを指定してアプリを組み立てる
pub async fn build_app_with(
    config: MonitorConfig,
    endpoints: Vec<EndpointDescriptor>,
    credentials: Arc<dyn CredentialProvider>,
) -> TestApp {
    let pool = memory_pool().await;
    let state = AppState::new(
        pool.clone(),
        config,
        Arc::new(EndpointRegistry::new(endpoints)),
        credentials,
        ShutdownController::new(),
    )
    .expect("Failed to build app state");
    let app = api::create_app(state.clone());
    TestApp { app, state, pool }
}

/// リクエストを1つ送る
pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

/// GETしてステータスとJSONボディを返す
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    let status = response.status();
    (status, body_json(response).await)
}

/// JSONボディ付きでリクエストし、ステータスとJSONボディを返す
pub async fn send_json(app: &Router, method: &str, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = send(
        app,
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

/// レスポンスボディをJSONとして読む（空ならNull）
pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}
