//! Outline Handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::application::EditOutline;
use crate::domain::outline::BookOutline;
use crate::infrastructure::http::dto::{ApiResponse, EditOutlineRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 编辑大纲，返回编辑并重新编号后的大纲
pub async fn edit_outline(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EditOutlineRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BookOutline>>, ApiError> {
    let Json(req) = payload?;

    let outline = state.edit_outline_handler.handle(EditOutline {
        outline: req.outline,
        operation: req.operation,
    })?;

    Ok(Json(ApiResponse::success(outline)))
}
