//! HTTP Error Handling
//!
//! 每类错误对应独立的 HTTP 状态码和 errno，调用方据此区分
//! "稍后重试"（配额）、"可立即重试"（模型服务）和 "请求本身有误"

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::application::{ApplicationError, ModelError, QuotaError};

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            errno,
            error: error.into(),
            data,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const QUOTA_EXCEEDED: i32 = 429;
    pub const CLIENT_CLOSED: i32 = 499;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const PROVIDER_ERROR: i32 = 502;
    pub const PROVIDER_TIMEOUT: i32 = 504;
    pub const EMPTY_RESPONSE: i32 = 520;
}

/// 客户端提前断开（非标准状态码）
fn client_closed_status() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    QuotaExceeded {
        message: String,
        data: serde_json::Value,
    },
    /// 模型服务失败（含超时与空响应）
    Upstream {
        errno: i32,
        message: String,
        data: Option<serde_json::Value>,
    },
    Cancelled {
        message: String,
        data: Option<serde_json::Value>,
    },
    Internal(String),
}

impl ApiError {
    fn from_model(error: &ModelError, data: Option<serde_json::Value>) -> Self {
        let message = error.to_string();
        match error {
            ModelError::Provider(_) => ApiError::Upstream {
                errno: errno::PROVIDER_ERROR,
                message,
                data,
            },
            ModelError::Timeout => ApiError::Upstream {
                errno: errno::PROVIDER_TIMEOUT,
                message,
                data,
            },
            ModelError::EmptyResponse { .. } => ApiError::Upstream {
                errno: errno::EMPTY_RESPONSE,
                message,
                data,
            },
            ModelError::Cancelled { .. } => ApiError::Cancelled { message, data },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Cancelled { .. } => client_closed_status(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let response = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!(errno = errno::BAD_REQUEST, error = %msg, "Bad request");
                ErrorResponse::new(errno::BAD_REQUEST, msg, None)
            }
            ApiError::NotFound(msg) => {
                tracing::warn!(errno = errno::NOT_FOUND, error = %msg, "Resource not found");
                ErrorResponse::new(errno::NOT_FOUND, msg, None)
            }
            ApiError::QuotaExceeded { message, data } => {
                tracing::warn!(errno = errno::QUOTA_EXCEEDED, error = %message, "Quota exceeded");
                ErrorResponse::new(errno::QUOTA_EXCEEDED, message, Some(data))
            }
            ApiError::Upstream {
                errno,
                message,
                data,
            } => {
                tracing::error!(errno, error = %message, "Model service error");
                ErrorResponse::new(errno, message, data)
            }
            ApiError::Cancelled { message, data } => {
                tracing::info!(errno = errno::CLIENT_CLOSED, error = %message, "Generation cancelled");
                ErrorResponse::new(errno::CLIENT_CLOSED, message, data)
            }
            ApiError::Internal(msg) => {
                tracing::error!(errno = errno::INTERNAL_ERROR, error = %msg, "Internal server error");
                ErrorResponse::new(errno::INTERNAL_ERROR, msg, None)
            }
        };

        (status, Json(response)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        match e {
            ApplicationError::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{} not found: {}", resource_type, id))
            }
            ApplicationError::ValidationError(msg) => ApiError::BadRequest(msg),
            ApplicationError::QuotaExceeded(err) => {
                let QuotaError::Exceeded {
                    used,
                    limit,
                    period_end,
                } = &err;
                ApiError::QuotaExceeded {
                    message: err.to_string(),
                    data: json!({
                        "used": used,
                        "limit": limit,
                        "periodEnd": period_end,
                    }),
                }
            }
            ApplicationError::Model(err) => ApiError::from_model(&err, None),
            ApplicationError::LoopAborted(abort) => {
                let data = json!({
                    "iteration": abort.iteration,
                    "content": abort.content,
                    "history": abort.history,
                    "usage": abort.chargeable_usage(),
                });
                let mut error = ApiError::from_model(&abort.cause, Some(data));
                if let ApiError::Upstream { message, .. } | ApiError::Cancelled { message, .. } =
                    &mut error
                {
                    *message = format!("Editor-critic loop aborted at iteration {}: {}", abort.iteration, message);
                }
                error
            }
            ApplicationError::RepositoryError(msg) => ApiError::Internal(msg),
            ApplicationError::InternalError(msg) => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::workflows::LoopAbort;
    use crate::application::TokenUsage;
    use chrono::Utc;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApplicationError, StatusCode)> = vec![
            (ApplicationError::validation("x"), StatusCode::BAD_REQUEST),
            (ApplicationError::not_found("Project", "1"), StatusCode::NOT_FOUND),
            (
                QuotaError::Exceeded {
                    used: 10,
                    limit: 10,
                    period_end: Utc::now(),
                }
                .into(),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (ModelError::Timeout.into(), StatusCode::BAD_GATEWAY),
            (
                ModelError::EmptyResponse {
                    usage: TokenUsage::default(),
                }
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
            (ApplicationError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_empty_response_has_distinct_errno() {
        match ApiError::from(ApplicationError::from(ModelError::EmptyResponse {
            usage: TokenUsage::default(),
        })) {
            ApiError::Upstream { errno, .. } => assert_eq!(errno, errno::EMPTY_RESPONSE),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_loop_abort_carries_partial_history() {
        let abort = LoopAbort {
            cause: ModelError::Provider("down".into()),
            iteration: 2,
            history: Vec::new(),
            content: "latest".into(),
            usage: TokenUsage::new(10, 5),
        };

        match ApiError::from(ApplicationError::from(abort)) {
            ApiError::Upstream { errno, message, data } => {
                assert_eq!(errno, errno::PROVIDER_ERROR);
                assert!(message.contains("iteration 2"));
                let data = data.unwrap();
                assert_eq!(data["content"], "latest");
                assert_eq!(data["usage"]["totalTokens"], 15);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
