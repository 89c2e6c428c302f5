//! 日次エラーレポート
//!
//! 直近24時間のエラー統計を集計し、通知フックへ渡す。
//! ログ出力は常に行い、Webhookは設定されている場合のみ送る。

use crate::common::error::{MonitorError, MonitorResult};
use crate::health::aggregator::Aggregator;
use crate::types::{ErrorStats, Timeframe};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// レポートの通知先
#[async_trait]
pub trait ErrorReportNotifier: Send + Sync {
    /// 通知先の名前（ログ用）
    fn name(&self) -> &str;

    /// 統計を通知する
    async fn notify(&self, stats: &ErrorStats) -> MonitorResult<()>;
}

/// ログに出すだけの通知先
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl ErrorReportNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, stats: &ErrorStats) -> MonitorResult<()> {
        let top_endpoint = stats.endpoint_stats.first().map(|s| s.endpoint.as_str());
        let top_code = stats.code_stats.first().map(|s| s.code.as_str());
        if stats.total_count == 0 {
            info!(timeframe = %stats.timeframe, "Daily error report: no errors");
        } else {
            warn!(
                timeframe = %stats.timeframe,
                total_count = stats.total_count,
                endpoints = stats.endpoint_stats.len(),
                top_endpoint = ?top_endpoint,
                top_code = ?top_code,
                "Daily error report"
            );
        }
        Ok(())
    }
}

/// 統計JSONをPOSTする通知先
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// 新しい通知先を作成
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ErrorReportNotifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, stats: &ErrorStats) -> MonitorResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(stats)
            .send()
            .await
            .map_err(|e| MonitorError::Http(format!("Webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Http(format!(
                "Webhook returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

/// 日次エラーレポーター
#[derive(Clone)]
pub struct ErrorReporter {
    aggregator: Aggregator,
    notifiers: Vec<Arc<dyn ErrorReportNotifier>>,
}

impl ErrorReporter {
    /// 新しいレポーターを作成
    pub fn new(aggregator: Aggregator, notifiers: Vec<Arc<dyn ErrorReportNotifier>>) -> Self {
        Self {
            aggregator,
            notifiers,
        }
    }

    /// 直近24時間の統計を集計して全通知先に送る
    ///
    /// 集計の失敗はそのまま返す。通知先ごとの失敗はログに残して次へ進む。
    pub async fn run_daily_report(&self) -> MonitorResult<ErrorStats> {
        let stats = self
            .aggregator
            .get_error_stats(Timeframe::hours(24), None)
            .await?;

        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(&stats).await {
                warn!(
                    component = "report",
                    notifier = notifier.name(),
                    error = %e,
                    "Failed to deliver daily error report"
                );
            }
        }
        Ok(stats)
    }
}
