//! プローブ実行
//!
//! レジストリの各エントリへHTTPリクエストを1回ずつ送り、レイテンシを計測して
//! `CheckResult` に正規化する。失敗は例外ではなく値（`ProbeFailure`）として扱うので、
//! 1つの不調なエンドポイントがサイクル全体を止めることはない。

use crate::auth::{Credential, CredentialProvider};
use crate::common::error::{MonitorError, MonitorResult, ProbeFailure};
use crate::health::recorder::ResultRecorder;
use crate::registry::{EndpointDescriptor, EndpointRegistry};
use crate::types::{BatchSummary, CheckResult};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// デフォルトの同時プローブ数
const DEFAULT_CONCURRENCY: usize = 4;

/// 失敗理由を探すために読むボディの上限
const MAX_REASON_BODY_BYTES: usize = 64 * 1024;

/// プローブ用HTTPクライアントを作成
///
/// リダイレクトは追わない（3xxをそのまま観測してPASS判定する）。
pub fn build_probe_client(timeout: Duration) -> MonitorResult<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| MonitorError::Http(format!("Failed to create probe client: {}", e)))
}

/// HTTP応答を受け取れたプローブの観測値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTPステータス
    pub status_code: u16,
    /// ヘッダー受信までの経過時間（ミリ秒）
    pub elapsed_ms: u64,
    /// 失敗時のボディ由来の理由（`error` / `message`）
    pub body_reason: Option<String>,
}

/// プローブ実行器
#[derive(Clone)]
pub struct ProbeExecutor {
    client: Client,
    base_url: String,
    registry: Arc<EndpointRegistry>,
    credentials: Arc<dyn CredentialProvider>,
    recorder: ResultRecorder,
    concurrency: usize,
}

impl ProbeExecutor {
    /// 新しいプローブ実行器を作成
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        registry: Arc<EndpointRegistry>,
        credentials: Arc<dyn CredentialProvider>,
        recorder: ResultRecorder,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            registry,
            credentials,
            recorder,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// 同時プローブ数を設定（最低1）
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// プローブ対象のレジストリ
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// 1エンドポイントへリクエストを送る
    ///
    /// 認証必須なのにトークンがなければリクエストせずに`AuthUnavailable`を返す。
    pub async fn probe(
        &self,
        descriptor: &EndpointDescriptor,
        credential: Option<&Credential>,
    ) -> Result<ProbeResponse, ProbeFailure> {
        let mut request = self
            .client
            .request(descriptor.method.into(), self.url_for(&descriptor.path));
        if descriptor.requires_auth {
            let credential = credential.ok_or(ProbeFailure::AuthUnavailable)?;
            request = request.header(
                reqwest::header::AUTHORIZATION,
                credential.authorization_header(),
            );
        }

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| ProbeFailure::from_reqwest(&e, elapsed_ms(start)))?;
        let elapsed_ms = elapsed_ms(start);

        let status = response.status();
        let body_reason = if is_pass_status(status) {
            None
        } else {
            let body = read_capped(response, MAX_REASON_BODY_BYTES).await;
            body_reason(&body)
        };

        Ok(ProbeResponse {
            status_code: status.as_u16(),
            elapsed_ms,
            body_reason,
        })
    }

    /// 取得済みのトークンを使って1エンドポイントをチェックする
    async fn check_with(
        &self,
        descriptor: &EndpointDescriptor,
        credential: Option<&Credential>,
    ) -> CheckResult {
        let start = Instant::now();
        match self.probe(descriptor, credential).await {
            Ok(response) => CheckResult::from_response(
                descriptor.path.as_str(),
                descriptor.category.as_str(),
                response.status_code,
                response.elapsed_ms,
                response.body_reason,
            ),
            Err(failure) => {
                let response_time_ms = match &failure {
                    ProbeFailure::Timeout { elapsed_ms, .. } => Some(*elapsed_ms),
                    ProbeFailure::Request(_) => Some(elapsed_ms(start)),
                    ProbeFailure::Connect(_) | ProbeFailure::AuthUnavailable => None,
                };
                debug!(
                    endpoint = %descriptor.path,
                    failure = %failure,
                    "Probe did not receive a response"
                );
                CheckResult::from_failure(
                    descriptor.path.as_str(),
                    descriptor.category.as_str(),
                    response_time_ms,
                    failure.to_string(),
                )
            }
        }
    }

    /// 単一エンドポイントのヘルスチェック（記録はしない）
    pub async fn check_endpoint(&self, descriptor: &EndpointDescriptor) -> CheckResult {
        let credential = if descriptor.requires_auth {
            self.acquire_credential().await
        } else {
            None
        };

        let result = self.check_with(descriptor, credential.as_ref()).await;
        if descriptor.requires_auth && result.status_code == Some(StatusCode::UNAUTHORIZED.as_u16())
        {
            self.credentials.invalidate().await;
        }
        result
    }

    async fn acquire_credential(&self) -> Option<Credential> {
        match self.credentials.ensure_credential().await {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(
                    error = %e,
                    "Probe credential unavailable, protected endpoints will be marked failed"
                );
                None
            }
        }
    }

    /// 全GETエンドポイントをチェックし、各結果を記録してサマリーを返す
    pub async fn run_all_checks(&self) -> BatchSummary {
        let endpoints = self.registry.list_get_endpoints();
        if endpoints.is_empty() {
            info!("No endpoints to probe");
            return BatchSummary::from_results(Vec::new());
        }

        // トークンはサイクルごとに1回だけ確認する
        let credential = if endpoints.iter().any(|e| e.requires_auth) {
            self.acquire_credential().await
        } else {
            None
        };

        let started = Instant::now();
        let outcomes: Vec<(CheckResult, bool)> = stream::iter(endpoints)
            .map(|descriptor: EndpointDescriptor| {
                let credential = credential.clone();
                async move {
                    let result = self.check_with(&descriptor, credential.as_ref()).await;
                    self.recorder.record_check(&result).await;
                    (result, descriptor.requires_auth)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let unauthorized = outcomes.iter().any(|(result, requires_auth)| {
            *requires_auth && result.status_code == Some(StatusCode::UNAUTHORIZED.as_u16())
        });
        if unauthorized && credential.is_some() {
            info!("Protected endpoint rejected the probe credential, refreshing on next cycle");
            self.credentials.invalidate().await;
        }

        let summary =
            BatchSummary::from_results(outcomes.into_iter().map(|(result, _)| result).collect());
        info!(
            total = summary.total,
            pass = summary.pass,
            fail = summary.fail,
            avg_response_time_ms = summary.avg_response_time_ms,
            elapsed_ms = elapsed_ms(started),
            "Probe cycle completed"
        );
        summary
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn is_pass_status(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// JSONボディから失敗理由を取り出す
///
/// `{"error": "..."}`、`{"error": {"message": "..."}}`、`{"message": "..."}` に対応。
#[allow(clippy::let_and_return)]
fn body_reason(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let candidates = [
        value.get("error"),
        value.get("error").and_then(|e| e.get("message")),
        value.get("message"),
    ];
    let reason = candidates
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string);
    reason
}

/// ボディを先頭`cap`バイトまで読む。読み取りエラーはそこまでの内容で打ち切る
async fn read_capped(mut response: reqwest::Response, cap: usize) -> Vec<u8> {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        let room = cap.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= cap {
            break;
        }
    }
    body
}

/// 結果付きのサイクル実行
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// 実行した
    Completed(BatchSummary),
    /// 実行中のサイクルがあったので破棄した
    AlreadyRunning,
}

/// 直近のサイクル情報
#[derive(Debug, Clone, PartialEq)]
pub struct LastCycle {
    /// 完了時刻
    pub finished_at: DateTime<Utc>,
    /// サマリー
    pub summary: BatchSummary,
}

/// 同時に1つしか走らないプローブサイクル
///
/// 定期実行と手動トリガーの両方がここを通る。実行中に来たトリガーは破棄する
/// （実行中のサイクルが同じレジストリを網羅するため）。
pub struct ProbeCycle {
    executor: ProbeExecutor,
    running: AtomicBool,
    last: RwLock<Option<LastCycle>>,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ProbeCycle {
    /// 新しいサイクルを作成
    pub fn new(executor: ProbeExecutor) -> Self {
        Self {
            executor,
            running: AtomicBool::new(false),
            last: RwLock::new(None),
        }
    }

    /// 実行器
    pub fn executor(&self) -> &ProbeExecutor {
        &self.executor
    }

    /// 実行中か
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 直近の完了サイクル
    pub async fn last_cycle(&self) -> Option<LastCycle> {
        self.last.read().await.clone()
    }

    /// アイドルならサイクルを実行する
    pub async fn run_if_idle(&self) -> CycleOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Probe cycle already running, trigger dropped");
            return CycleOutcome::AlreadyRunning;
        }
        let _guard = RunningGuard(&self.running);

        let summary = self.executor.run_all_checks().await;
        *self.last.write().await = Some(LastCycle {
            finished_at: Utc::now(),
            summary: summary.clone(),
        });
        CycleOutcome::Completed(summary)
    }
}
