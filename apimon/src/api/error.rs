//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use crate::common::error::MonitorError;
use axum::{response::IntoResponse, Json};
use tracing::error;

/// レスポンスに添付する内部エラー情報
///
/// エラー捕捉ミドルウェアがこれを読んで`ErrorRecord`を作る。クライアントには返さない。
#[derive(Debug, Clone)]
pub struct CapturedError {
    /// エラー分類タグ
    pub code: &'static str,
    /// 内部向けの詳細メッセージ
    pub message: String,
}

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub MonitorError);

impl From<MonitorError> for AppError {
    fn from(err: MonitorError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            error!(error = %self.0, code = self.0.code(), "Request failed");
        }

        // 外部向けにはexternal_message()のみ返し、詳細はログとエラーログへ
        let mut response = (status, Json(self.0.to_error_response())).into_response();
        response.extensions_mut().insert(CapturedError {
            code: self.0.code(),
            message: self.0.to_string(),
        });
        response
    }
}
