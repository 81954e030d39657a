//! Quota Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::GetUsage;
use crate::domain::quota::UsageInfo;
use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::extract::UserId;
use crate::infrastructure::http::state::AppState;

/// 当前周期用量
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Result<Json<ApiResponse<UsageInfo>>, ApiError> {
    let info = state.get_usage_handler.handle(GetUsage { user_id })?;
    Ok(Json(ApiResponse::success(info)))
}
