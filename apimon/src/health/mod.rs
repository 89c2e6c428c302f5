//! ヘルスモニター
//!
//! プローブ → 記録 → 集計の流れと、保持期間削除・日次レポートを束ねる。

/// 集計
pub mod aggregator;
/// プローブ実行
pub mod probe;
/// 結果レコーダー
pub mod recorder;
/// 日次エラーレポート
pub mod report;
/// 保持期間による一括削除
pub mod retention;
/// スケジューラー
pub mod scheduler;

use crate::auth::CredentialProvider;
use crate::common::error::MonitorResult;
use crate::config::MonitorConfig;
use crate::db::error_logs::ErrorLogStorage;
use crate::db::health_checks::HealthCheckStorage;
use crate::db::settings::SettingsStorage;
use crate::registry::EndpointRegistry;
use crate::shutdown::ShutdownController;
use aggregator::Aggregator;
use probe::{build_probe_client, ProbeCycle, ProbeExecutor};
use recorder::ResultRecorder;
use report::{ErrorReportNotifier, ErrorReporter, LogNotifier, WebhookNotifier};
use retention::{RetentionPolicy, RetentionSweeper};
use scheduler::{Schedule, Scheduler, TaskSpec};
use sqlx::SqlitePool;
use std::sync::Arc;

/// プローブサイクルのタスク名
pub const PROBE_TASK: &str = "probe";
/// 保持期間削除のタスク名
pub const RETENTION_TASK: &str = "retention";
/// 日次エラーレポートのタスク名
pub const ERROR_REPORT_TASK: &str = "error_report";

/// 配線済みのモニター部品一式
#[derive(Clone)]
pub struct HealthMonitor {
    /// 結果レコーダー
    pub recorder: ResultRecorder,
    /// 集計器
    pub aggregator: Aggregator,
    /// 保持期間スイーパー
    pub retention: RetentionSweeper,
    /// プローブサイクル
    pub probe_cycle: Arc<ProbeCycle>,
    /// 日次エラーレポーター
    pub reporter: ErrorReporter,
    config: MonitorConfig,
}

impl HealthMonitor {
    /// 部品を組み立てる
    pub fn new(
        pool: SqlitePool,
        config: MonitorConfig,
        registry: Arc<EndpointRegistry>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> MonitorResult<Self> {
        let health_checks = HealthCheckStorage::new(pool.clone());
        let error_logs = ErrorLogStorage::new(pool.clone());
        let settings = SettingsStorage::new(pool);

        let recorder = ResultRecorder::new(health_checks.clone(), error_logs.clone());
        let aggregator = Aggregator::new(
            health_checks.clone(),
            error_logs.clone(),
            config.recent_limit,
        );
        let retention = RetentionSweeper::new(
            health_checks,
            error_logs,
            settings,
            RetentionPolicy {
                health_check_retention_days: config.health_retention_days,
                error_log_retention_days: config.error_retention_days,
            },
        );

        let client = build_probe_client(config.probe_timeout)?;
        let executor = ProbeExecutor::new(
            client.clone(),
            config.target_base_url.clone(),
            registry,
            credentials,
            recorder.clone(),
        )
        .with_concurrency(config.probe_concurrency);

        let mut notifiers: Vec<Arc<dyn ErrorReportNotifier>> =
            vec![Arc::new(LogNotifier) as Arc<dyn ErrorReportNotifier>];
        if let Some(url) = &config.report_webhook_url {
            notifiers.push(Arc::new(WebhookNotifier::new(client, url.clone())));
        }
        let reporter = ErrorReporter::new(aggregator.clone(), notifiers);

        Ok(Self {
            recorder,
            aggregator,
            retention,
            probe_cycle: Arc::new(ProbeCycle::new(executor)),
            reporter,
            config,
        })
    }

    /// 設定
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// 3つの定期タスクを登録したスケジューラーを作る（未起動）
    pub fn scheduler(&self, shutdown: ShutdownController) -> Scheduler {
        let mut scheduler = Scheduler::new(shutdown);

        let probe_cycle = self.probe_cycle.clone();
        scheduler.add_task(
            TaskSpec::new(
                PROBE_TASK,
                Schedule::Every(self.config.probe_interval),
                move || {
                    let probe_cycle = probe_cycle.clone();
                    async move {
                        probe_cycle.run_if_idle().await;
                        Ok(())
                    }
                },
            )
            .run_on_start(),
        );

        let retention = self.retention.clone();
        scheduler.add_task(TaskSpec::new(
            RETENTION_TASK,
            Schedule::DailyAt {
                hour: self.config.retention_hour,
            },
            move || {
                let retention = retention.clone();
                async move { retention.run().await.map(|_| ()) }
            },
        ));

        let reporter = self.reporter.clone();
        scheduler.add_task(TaskSpec::new(
            ERROR_REPORT_TASK,
            Schedule::DailyAt {
                hour: self.config.report_hour,
            },
            move || {
                let reporter = reporter.clone();
                async move { reporter.run_daily_report().await.map(|_| ()) }
            },
        ));

        scheduler
    }
}
