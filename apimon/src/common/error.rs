//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! 書き込み系（プローブ・記録・保持期間削除）の失敗はタスク境界でログに落とし、
//! 読み取り系（集計・履歴）の失敗は`MonitorError`として呼び出し元へ伝播する。

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// UUID parse error
    #[error("UUID parse error: {0}")]
    UuidParse(#[from] uuid::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// monitor error type
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Authentication error (probe credential could not be obtained)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Invalid timeframe string (e.g. "24x")
    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    /// Conflict error (e.g., probe cycle already running)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Returns a safe error message for external clients.
    ///
    /// Full details (SQL errors, URLs of monitored services) only go to the
    /// server logs via `Display`.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::Common(_) => "Request error",
            Self::NotFound(_) => "Not found",
            Self::Database(_) => "Database error",
            Self::Http(_) => "Backend service unavailable",
            Self::Authentication(_) => "Authentication failed",
            Self::InvalidTimeframe(_) => "Invalid timeframe",
            Self::Conflict(_) => "Resource conflict",
            Self::Internal(_) => "Internal server error",
        }
    }

    /// Returns the error type string used in API error bodies.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Common(_) => "invalid_request_error",
            Self::NotFound(_) => "not_found_error",
            Self::Database(_) => "server_error",
            Self::Http(_) => "service_unavailable",
            Self::Authentication(_) => "authentication_error",
            Self::InvalidTimeframe(_) => "invalid_request_error",
            Self::Conflict(_) => "invalid_request_error",
            Self::Internal(_) => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Common(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidTimeframe(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// エラー分類タグ（ErrorRecord.codeに記録される）
    pub fn code(&self) -> &'static str {
        match self {
            Self::Common(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Http(_) => "UPSTREAM_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::InvalidTimeframe(_) => "INVALID_TIMEFRAME",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Converts this error to the JSON error body returned by the API.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                message: self.external_message().to_string(),
                error_type: self.error_type().to_string(),
                code: Some(self.status_code().as_u16().to_string()),
            },
        }
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        MonitorError::Database(err.to_string())
    }
}

/// APIエラーレスポンス
///
/// ```json
/// {
///   "error": {
///     "message": "Invalid timeframe",
///     "type": "invalid_request_error",
///     "code": "400"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// The error details
    pub error: ErrorDetail,
}

/// エラー詳細
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    /// Human-readable error message
    pub message: String,
    /// Error type (e.g., "invalid_request_error", "server_error")
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error code (HTTP status as string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// プローブ失敗
///
/// 監視対象が成功応答を返さなかった理由。例外ではなく値として扱い、
/// `CheckResult`（status=FAIL）へ畳み込まれる。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Probe exceeded the configured timeout
    #[error("timeout after {elapsed_ms}ms: {message}")]
    Timeout {
        /// 経過時間（ミリ秒）
        elapsed_ms: u64,
        /// 下位エラーのメッセージ
        message: String,
    },

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// No bearer credential available for a protected endpoint
    #[error("authentication unavailable")]
    AuthUnavailable,

    /// Any other transport-level failure
    #[error("request failed: {0}")]
    Request(String),
}

impl ProbeFailure {
    /// reqwestのエラーを分類する
    pub fn from_reqwest(err: &reqwest::Error, elapsed_ms: u64) -> Self {
        let message = error_chain(err);
        if err.is_timeout() {
            ProbeFailure::Timeout {
                elapsed_ms,
                message,
            }
        } else if err.is_connect() {
            ProbeFailure::Connect(message)
        } else {
            ProbeFailure::Request(message)
        }
    }
}

/// エラーと原因チェーンを1行の文字列に連結する
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Result type alias (monitor)
pub type MonitorResult<T> = Result<T, MonitorError>;
