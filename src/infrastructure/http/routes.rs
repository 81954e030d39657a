//! HTTP Routes
//!
//! API Endpoints（除 ping 外均需 `X-User-Id` 头）:
//! - /api/ping                    GET   健康检查
//! - /api/generate                POST  执行一个阶段（phase 字段区分）
//! - /api/generate/stream         POST  流式写作（SSE 事件）
//! - /api/generate/stream/raw     POST  流式写作（原始文本分块）
//! - /api/quota/usage             GET   当前周期用量
//! - /api/outline/edit            POST  编辑大纲（插入/删除/移动/更新/重新编号）
//! - /api/project/create          POST  创建项目
//! - /api/project/get             POST  获取项目详情
//! - /api/project/list            GET   列出项目
//! - /api/project/delete          POST  删除项目
//! - /api/project/outline         POST  保存项目大纲
//! - /api/project/chapter/save    POST  保存章节
//! - /api/project/chapters        POST  列出章节
//! - /ws/events/{user_id}         WS    用户事件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/events/:user_id", get(handlers::events_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/generate", post(handlers::generate))
        .route("/generate/stream", post(handlers::generate_stream))
        .route("/generate/stream/raw", post(handlers::generate_stream_raw))
        .route("/quota/usage", get(handlers::get_usage))
        .route("/outline/edit", post(handlers::edit_outline))
        .nest("/project", project_routes())
}

/// Project 路由
fn project_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_project))
        .route("/get", post(handlers::get_project))
        .route("/list", get(handlers::list_projects))
        .route("/delete", post(handlers::delete_project))
        .route("/outline", post(handlers::save_outline))
        .route("/chapter/save", post(handlers::save_chapter))
        .route("/chapters", post(handlers::list_chapters))
}
