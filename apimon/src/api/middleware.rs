//! エラー捕捉ミドルウェア
//!
//! 全リクエストに`x-request-id`を付け、5xxになったリクエストを`ErrorRecord`として記録する。

use super::error::CapturedError;
use crate::types::NewErrorRecord;
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// リクエストIDヘッダー
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 呼び出し元ユーザーIDヘッダー（外部の認証レイヤーが付与する）
pub const USER_ID_HEADER: &str = "x-user-id";

fn header_string(request: &Request<Body>, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// エラー捕捉ミドルウェア
pub async fn error_capture_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id =
        header_string(&request, REQUEST_ID_HEADER).unwrap_or_else(|| Uuid::new_v4().to_string());
    let user_id = header_string(&request, USER_ID_HEADER);
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    if status.is_server_error() {
        let captured = response.extensions().get::<CapturedError>().cloned();
        let (code, message) = match captured {
            Some(captured) => (captured.code.to_string(), captured.message),
            None => (
                "INTERNAL_ERROR".to_string(),
                status
                    .canonical_reason()
                    .unwrap_or("Internal Server Error")
                    .to_string(),
            ),
        };
        debug!(request_id = %request_id, path = %path, code = %code, "Capturing server error");

        state
            .monitor
            .recorder
            .record_error(NewErrorRecord {
                id: None,
                code,
                message,
                status: status.as_u16(),
                endpoint: path,
                request_id: Some(request_id),
                details: Some(json!({
                    "method": method,
                    "duration_ms": start.elapsed().as_millis() as u64,
                })),
                stack_trace: None,
                user_id,
                created_at: None,
            })
            .await;
    }

    response
}
