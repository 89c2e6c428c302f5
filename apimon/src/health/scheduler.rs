//! スケジューラー
//!
//! 名前付きの定期タスク（プローブ・保持期間削除・日次レポート）を独立に駆動する。
//! 各実行は個別のタスクとして起動され、失敗やパニックはタスク境界で捕捉してログに残す。
//! 次回以降の実行には影響しない。

use crate::common::error::MonitorResult;
use crate::shutdown::ShutdownController;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// タスクハンドラー
pub type TaskHandler = Arc<dyn Fn() -> BoxFuture<'static, MonitorResult<()>> + Send + Sync>;

/// 実行スケジュール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// 固定間隔（最初の実行は1周期後）
    Every(Duration),
    /// 毎日指定時刻（ローカル時、0-23）
    DailyAt {
        /// 時
        hour: u32,
    },
}

impl Schedule {
    fn describe(&self) -> String {
        match self {
            Self::Every(period) => format!("every {}s", period.as_secs()),
            Self::DailyAt { hour } => format!("daily at {:02}:00", hour),
        }
    }
}

/// `now` の次に来る `hour:00` までの待ち時間
pub fn next_daily_delay(now: NaiveDateTime, hour: u32) -> Duration {
    let Some(today) = now.date().and_hms_opt(hour.min(23), 0, 0) else {
        return Duration::from_secs(86_400);
    };
    let target = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (target - now).to_std().unwrap_or_default()
}

/// タスク定義
pub struct TaskSpec {
    name: String,
    schedule: Schedule,
    run_on_start: bool,
    handler: TaskHandler,
}

impl TaskSpec {
    /// 新しいタスク定義
    pub fn new<F, Fut>(name: impl Into<String>, schedule: Schedule, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MonitorResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            schedule,
            run_on_start: false,
            handler: Arc::new(move || -> BoxFuture<'static, MonitorResult<()>> {
                Box::pin(handler())
            }),
        }
    }

    /// 起動直後にも1回実行する
    pub fn run_on_start(mut self) -> Self {
        self.run_on_start = true;
        self
    }
}

#[derive(Default)]
struct LastRun {
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

#[derive(Default)]
struct TaskState {
    running: AtomicBool,
    runs: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
    last: Mutex<LastRun>,
}

impl TaskState {
    fn with_last<R>(&self, f: impl FnOnce(&mut LastRun) -> R) -> R {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut last)
    }
}

struct ScheduledTask {
    spec: TaskSpec,
    state: TaskState,
}

/// タスクの状態
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskStatus {
    /// タスク名
    pub name: String,
    /// スケジュール
    pub schedule: String,
    /// 実行中か
    pub running: bool,
    /// 完了した実行回数
    pub run_count: u64,
    /// 前回が実行中だったためスキップした回数
    pub skipped_count: u64,
    /// 失敗した実行回数
    pub failure_count: u64,
    /// 最後の開始時刻
    pub last_started_at: Option<DateTime<Utc>>,
    /// 最後の完了時刻
    pub last_finished_at: Option<DateTime<Utc>>,
    /// 最後の実行のエラー
    pub last_error: Option<String>,
}

/// 手動トリガーの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// 起動した
    Started,
    /// 実行中だったので破棄した
    AlreadyRunning,
    /// そのような名前のタスクはない
    UnknownTask,
}

/// スケジューラー
pub struct Scheduler {
    tasks: Vec<Arc<ScheduledTask>>,
    shutdown: ShutdownController,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// 新しいスケジューラーを作成
    pub fn new(shutdown: ShutdownController) -> Self {
        Self {
            tasks: Vec::new(),
            shutdown,
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// タスクを追加（`start` 前のみ）
    pub fn add_task(&mut self, spec: TaskSpec) -> &mut Self {
        self.tasks.push(Arc::new(ScheduledTask {
            spec,
            state: TaskState::default(),
        }));
        self
    }

    /// 全タスクのループを起動する。2回目以降の呼び出しは何もしない
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for task in &self.tasks {
            info!(
                task = %task.spec.name,
                schedule = %task.spec.schedule.describe(),
                "Scheduled task registered"
            );
            if task.spec.run_on_start {
                spawn_run(task);
            }
            handles.push(tokio::spawn(task_loop(
                Arc::clone(task),
                self.shutdown.clone(),
            )));
        }
    }

    /// 名前を指定して即時実行する。実行中なら破棄
    pub fn trigger(&self, name: &str) -> TriggerOutcome {
        match self.tasks.iter().find(|t| t.spec.name == name) {
            Some(task) if spawn_run(task) => TriggerOutcome::Started,
            Some(_) => TriggerOutcome::AlreadyRunning,
            None => TriggerOutcome::UnknownTask,
        }
    }

    /// 全タスクの状態
    pub fn status(&self) -> Vec<TaskStatus> {
        self.tasks
            .iter()
            .map(|task| {
                let state = &task.state;
                let (last_started_at, last_finished_at, last_error) = state
                    .with_last(|last| (last.started_at, last.finished_at, last.error.clone()));
                TaskStatus {
                    name: task.spec.name.clone(),
                    schedule: task.spec.schedule.describe(),
                    running: state.running.load(Ordering::SeqCst),
                    run_count: state.runs.load(Ordering::SeqCst),
                    skipped_count: state.skipped.load(Ordering::SeqCst),
                    failure_count: state.failures.load(Ordering::SeqCst),
                    last_started_at,
                    last_finished_at,
                    last_error,
                }
            })
            .collect()
    }

    /// ループを止める。実行中の処理は中断しない
    pub async fn stop(&self) {
        self.shutdown.request_shutdown();
        let handles: Vec<_> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Scheduler loop join error: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

async fn task_loop(task: Arc<ScheduledTask>, shutdown: ShutdownController) {
    match task.spec.schedule {
        Schedule::Every(period) => {
            let period = period.max(Duration::from_millis(1));
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = timer.tick() => {}
                }
                spawn_run(&task);
            }
        }
        Schedule::DailyAt { hour } => loop {
            let delay = next_daily_delay(chrono::Local::now().naive_local(), hour);
            debug!(task = %task.spec.name, delay_secs = delay.as_secs(), "Next daily run scheduled");
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            spawn_run(&task);
        },
    }
    debug!(task = %task.spec.name, "Scheduled task loop exited");
}

/// 1回分の実行を別タスクで起動する。前回が実行中ならスキップしてfalse
fn spawn_run(task: &Arc<ScheduledTask>) -> bool {
    let state = &task.state;
    if state
        .running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        state.skipped.fetch_add(1, Ordering::SeqCst);
        debug!(task = %task.spec.name, "Previous run still in progress, skipping");
        return false;
    }
    state.with_last(|last| last.started_at = Some(Utc::now()));

    let task = Arc::clone(task);
    tokio::spawn(async move {
        let started = Instant::now();
        // ハンドラーのパニックをここで受け止める
        let outcome = tokio::spawn((task.spec.handler)()).await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(join_error) if join_error.is_panic() => Some("task panicked".to_string()),
            Err(join_error) => Some(join_error.to_string()),
        };

        let state = &task.state;
        state.runs.fetch_add(1, Ordering::SeqCst);
        match &failure {
            None => debug!(
                task = %task.spec.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Scheduled task completed"
            ),
            Some(e) => {
                state.failures.fetch_add(1, Ordering::SeqCst);
                error!(task = %task.spec.name, error = %e, "Scheduled task failed");
            }
        }
        state.with_last(|last| {
            last.finished_at = Some(Utc::now());
            last.error = failure;
        });
        state.running.store(false, Ordering::SeqCst);
    });
    true
}
