//! エラーログ型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 未処理リクエストエラー1件（不変）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    /// レコードID
    pub id: Uuid,
    /// エラー分類タグ（例: "DATABASE_ERROR"）
    pub code: String,
    /// メッセージ
    pub message: String,
    /// クライアントへ返したHTTPステータス
    pub status: u16,
    /// 発生したエンドポイント
    pub endpoint: String,
    /// リクエスト相関ID
    pub request_id: String,
    /// 構造化コンテキスト
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// スタックトレース
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// 呼び出しユーザー
    #[serde(default)]
    pub user_id: Option<String>,
    /// 作成日時
    pub created_at: DateTime<Utc>,
}

/// 他サブシステムから報告されるエラー（IDと作成日時は任意）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewErrorRecord {
    /// レコードID（未指定なら採番）
    #[serde(default)]
    pub id: Option<Uuid>,
    /// エラー分類タグ
    pub code: String,
    /// メッセージ
    pub message: String,
    /// HTTPステータス
    #[serde(default = "default_error_status")]
    pub status: u16,
    /// エンドポイント
    pub endpoint: String,
    /// リクエスト相関ID（未指定なら採番）
    #[serde(default)]
    pub request_id: Option<String>,
    /// 構造化コンテキスト
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    /// スタックトレース
    #[serde(default)]
    pub stack_trace: Option<String>,
    /// 呼び出しユーザー
    #[serde(default)]
    pub user_id: Option<String>,
    /// 作成日時（未指定なら現在時刻）
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_error_status() -> u16 {
    500
}

impl NewErrorRecord {
    /// 欠けているIDと日時を補って`ErrorRecord`にする
    pub fn into_record(self) -> ErrorRecord {
        ErrorRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            code: self.code,
            message: self.message,
            status: self.status,
            endpoint: self.endpoint,
            request_id: self
                .request_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            details: self.details,
            stack_trace: self.stack_trace,
            user_id: self.user_id,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// エンドポイント別エラー件数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointErrorStats {
    /// エンドポイント
    pub endpoint: String,
    /// 件数
    pub count: u64,
    /// 最初の発生
    pub first_occurrence: DateTime<Utc>,
    /// 最後の発生
    pub last_occurrence: DateTime<Utc>,
}

/// コード別エラー件数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeErrorStats {
    /// エラー分類タグ
    pub code: String,
    /// 件数
    pub count: u64,
}

/// エラー統計
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorStats {
    /// 集計ウィンドウ
    pub timeframe: String,
    /// エンドポイント別（件数降順）
    pub endpoint_stats: Vec<EndpointErrorStats>,
    /// コード別（件数降順）
    pub code_stats: Vec<CodeErrorStats>,
    /// 直近のエラー（新しい順）
    pub recent_errors: Vec<ErrorRecord>,
    /// ウィンドウ内の総件数
    pub total_count: u64,
}
