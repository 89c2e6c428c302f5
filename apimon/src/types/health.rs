//! ヘルスチェック型定義
//!
//! プローブ1回分の結果（`CheckResult`）と、その集計結果の型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// プローブ結果ステータス
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    /// 成功（HTTP 200..400）
    Pass,
    /// 失敗（それ以外のステータス、または接続失敗）
    Fail,
}

impl CheckStatus {
    /// HTTPステータスコードから判定する
    pub fn from_status_code(code: u16) -> Self {
        if (200..400).contains(&code) {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    /// DB保存用の文字列
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

impl FromStr for CheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown check status: {other}")),
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// プローブ1回分の結果（不変）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckResult {
    /// 結果ID
    pub id: Uuid,
    /// プローブしたパス
    pub endpoint: String,
    /// カテゴリ（レジストリ由来）
    pub category: String,
    /// 判定
    pub status: CheckStatus,
    /// 応答時間（ミリ秒）。接続すらしなかった場合のみNone
    pub response_time_ms: Option<u64>,
    /// 観測したHTTPステータス。接続失敗時はNone
    pub status_code: Option<u16>,
    /// 失敗理由
    pub error_message: Option<String>,
    /// 作成日時
    pub created_at: DateTime<Utc>,
}

impl CheckResult {
    /// HTTP応答を受け取ったプローブの結果を作成
    pub fn from_response(
        endpoint: impl Into<String>,
        category: impl Into<String>,
        status_code: u16,
        response_time_ms: u64,
        body_reason: Option<String>,
    ) -> Self {
        let status = CheckStatus::from_status_code(status_code);
        let error_message = match status {
            CheckStatus::Pass => None,
            CheckStatus::Fail => Some(body_reason.unwrap_or_else(|| format!("HTTP {status_code}"))),
        };
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            category: category.into(),
            status,
            response_time_ms: Some(response_time_ms),
            status_code: Some(status_code),
            error_message,
            created_at: Utc::now(),
        }
    }

    /// 応答を得られなかったプローブの結果を作成
    pub fn from_failure(
        endpoint: impl Into<String>,
        category: impl Into<String>,
        response_time_ms: Option<u64>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            category: category.into(),
            status: CheckStatus::Fail,
            response_time_ms,
            status_code: None,
            error_message: Some(error_message.into()),
            created_at: Utc::now(),
        }
    }

    /// 成功判定か
    pub fn is_pass(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}

/// 件数と平均応答時間
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthStats {
    /// 総チェック数
    pub total_checks: u64,
    /// 成功数
    pub passed_checks: u64,
    /// 失敗数
    pub failed_checks: u64,
    /// 平均応答時間（応答時間が記録された行のみ）
    pub avg_response_time_ms: f64,
}

/// カテゴリ別集計
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryHealth {
    /// カテゴリ
    pub category: String,
    /// 集計値
    #[serde(flatten)]
    pub stats: HealthStats,
}

/// エンドポイント別集計
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointHealth {
    /// エンドポイント
    pub endpoint: String,
    /// 集計値
    #[serde(flatten)]
    pub stats: HealthStats,
}

/// ヘルスサマリー（保存しない、毎回再計算）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSummary {
    /// 集計ウィンドウ
    pub timeframe: String,
    /// 全体
    pub overall: HealthStats,
    /// カテゴリ別（カテゴリ昇順）
    pub per_category: Vec<CategoryHealth>,
    /// エンドポイント別（エンドポイント昇順）
    pub per_endpoint: Vec<EndpointHealth>,
    /// 直近の失敗（新しい順）
    pub recent_failures: Vec<CheckResult>,
}

/// プローブサイクルのカテゴリ別サブサマリー
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryBatch {
    /// カテゴリ
    pub category: String,
    /// 件数
    pub total: u64,
    /// 成功数
    pub pass: u64,
    /// 失敗数
    pub fail: u64,
    /// 平均応答時間
    pub avg_response_time_ms: f64,
}

/// プローブサイクル1回分のサマリー
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    /// 件数
    pub total: u64,
    /// 成功数
    pub pass: u64,
    /// 失敗数
    pub fail: u64,
    /// 平均応答時間
    pub avg_response_time_ms: f64,
    /// カテゴリ別（カテゴリ昇順）
    pub categories: Vec<CategoryBatch>,
    /// 個々の結果
    pub results: Vec<CheckResult>,
}

#[derive(Default)]
struct Tally {
    total: u64,
    pass: u64,
    latency_sum: u64,
    latency_count: u64,
}

impl Tally {
    fn add(&mut self, result: &CheckResult) {
        self.total += 1;
        if result.is_pass() {
            self.pass += 1;
        }
        if let Some(ms) = result.response_time_ms {
            self.latency_sum += ms;
            self.latency_count += 1;
        }
    }

    fn avg(&self) -> f64 {
        if self.latency_count == 0 {
            0.0
        } else {
            self.latency_sum as f64 / self.latency_count as f64
        }
    }
}

impl BatchSummary {
    /// 結果一覧を逐次畳み込んでサマリーを作る
    pub fn from_results(results: Vec<CheckResult>) -> Self {
        let mut overall = Tally::default();
        let mut by_category: BTreeMap<String, Tally> = BTreeMap::new();

        for result in &results {
            overall.add(result);
            by_category
                .entry(result.category.clone())
                .or_default()
                .add(result);
        }

        let categories = by_category
            .into_iter()
            .map(|(category, tally)| CategoryBatch {
                category,
                total: tally.total,
                pass: tally.pass,
                fail: tally.total - tally.pass,
                avg_response_time_ms: tally.avg(),
            })
            .collect();

        Self {
            total: overall.total,
            pass: overall.pass,
            fail: overall.total - overall.pass,
            avg_response_time_ms: overall.avg(),
            categories,
            results,
        }
    }
}
