//! Request Extractors
//!
//! 调用方身份由上游鉴权层通过 `X-User-Id` 头传入

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use http::HeaderName;

use super::error::ApiError;

/// 用户 ID 请求头
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// 已识别的调用方
#[derive(Debug, Clone)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(&USER_ID_HEADER)
            .ok_or_else(|| ApiError::BadRequest("missing X-User-Id header".to_string()))?;

        let user_id = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("X-User-Id header is not valid text".to_string()))?
            .trim();
        if user_id.is_empty() {
            return Err(ApiError::BadRequest("X-User-Id header must not be empty".to_string()));
        }

        Ok(UserId(user_id.to_string()))
    }
}
