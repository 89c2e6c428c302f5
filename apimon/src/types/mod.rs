//! 型定義

/// ヘルスチェック結果・集計型
pub mod health;

/// エラーログ型
pub mod error_log;

/// 集計ウィンドウ（"24h" など）
pub mod timeframe;

pub use error_log::{ErrorRecord, ErrorStats, NewErrorRecord};
pub use health::{BatchSummary, CheckResult, CheckStatus, HealthStats, HealthSummary};
pub use timeframe::Timeframe;

use chrono::{DateTime, SecondsFormat, Utc};

/// ストレージ用のタイムスタンプ文字列（固定幅・UTC・`Z`終端）
///
/// 固定幅なので文字列比較が時系列比較と一致する。
pub fn to_storage_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// ストレージのタイムスタンプ文字列をパースする
pub fn parse_storage_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
