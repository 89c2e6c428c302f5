//! ロギング初期化ユーティリティ
//!
//! 標準出力（人間向け）とJSONログファイル（日次ローテーション）の2系統に出力する。

use crate::config::{get_env_with_fallback, get_env_with_fallback_or};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "apimon.jsonl";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// ログディレクトリを解決する
///
/// `APIMON_LOG_DIR` が未設定の場合は `~/.apimon/logs`。
pub fn log_dir() -> std::io::Result<PathBuf> {
    if let Some(dir) = get_env_with_fallback("APIMON_LOG_DIR", "LOG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Failed to resolve home directory",
            )
        })?;
    Ok(PathBuf::from(home).join(".apimon").join("logs"))
}

/// 人間向けログの出力先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    /// 標準出力（サーバー）
    Stdout,
    /// 標準エラー（標準出力をJSON結果に使うCLI）
    Stderr,
}

/// tracingサブスクライバーを初期化する（標準出力）
///
/// ログレベルは `APIMON_LOG_LEVEL`（旧: `RUST_LOG`）、未設定時は `info`。
pub fn init() -> anyhow::Result<()> {
    init_with(Console::Stdout)
}

/// 出力先を指定してtracingサブスクライバーを初期化する
pub fn init_with(console: Console) -> anyhow::Result<()> {
    let level = get_env_with_fallback_or("APIMON_LOG_LEVEL", "RUST_LOG", "info");
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_writer = match console {
        Console::Stdout => BoxMakeWriter::new(std::io::stdout),
        Console::Stderr => BoxMakeWriter::new(std::io::stderr),
    };
    let console_layer = fmt::layer().with_target(false).with_writer(console_writer);

    let dir = log_dir()?;
    std::fs::create_dir_all(&dir)?;
    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer().json().with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    // プロセス終了までライターを生かしておく
    let _ = FILE_GUARD.set(guard);

    tracing::debug!(log_dir = %dir.display(), "Logging initialized");
    Ok(())
}
