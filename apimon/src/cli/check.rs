//! check サブコマンド
//!
//! プローブサイクルを1回だけ実行し、サマリーをJSONで出力する。

use crate::health::probe::CycleOutcome;
use crate::shutdown::ShutdownController;
use crate::types::BatchSummary;
use clap::Args;

/// check サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Exit with a non-zero status when any probe fails
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

/// 1サイクル実行してサマリーを返す
pub async fn execute(_args: &CheckArgs) -> anyhow::Result<BatchSummary> {
    let state = super::build_state(ShutdownController::new()).await?;
    match state.monitor.probe_cycle.run_if_idle().await {
        CycleOutcome::Completed(summary) => Ok(summary),
        CycleOutcome::AlreadyRunning => anyhow::bail!("probe cycle already running"),
    }
}
