//! HTTP Middleware
//!
//! 4xx/5xx 响应日志，附带调用方和耗时

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use super::extract::USER_ID_HEADER;

/// HTTP 状态码错误日志中间件
///
/// 业务错误详情（errno）在 ApiError::into_response() 中记录，这里只记录请求维度
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_id = request
        .headers()
        .get(&USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            user_id = %user_id,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            user_id = %user_id,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP client error"
        );
    }

    response
}
