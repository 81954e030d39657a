//! Project Handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::application::{
    ChapterResponse, CreateProject, DeleteProject, GetProject, ListChapters, ListProjects,
    ProjectResponse, SaveChapter, SaveOutline,
};
use crate::domain::outline::BookOutline;
use crate::infrastructure::http::dto::{
    ApiResponse, CreateProjectRequest, Empty, ProjectIdRequest, SaveChapterRequest,
    SaveOutlineRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::extract::UserId;
use crate::infrastructure::http::state::AppState;

/// 创建项目
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ProjectResponse>>, ApiError> {
    let Json(req) = payload?;

    let project = state
        .create_project_handler
        .handle(CreateProject {
            user_id,
            title: req.title,
            book_type: req.book_type,
            description: req.description,
        })
        .await?;

    Ok(Json(ApiResponse::success(ProjectResponse::from(project))))
}

/// 获取项目详情
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<ProjectIdRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ProjectResponse>>, ApiError> {
    let Json(req) = payload?;

    let project = state
        .get_project_handler
        .handle(GetProject {
            user_id,
            project_id: req.id,
        })
        .await?;

    Ok(Json(ApiResponse::success(project)))
}

/// 列出当前用户的项目
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Result<Json<ApiResponse<Vec<ProjectResponse>>>, ApiError> {
    let projects = state
        .list_projects_handler
        .handle(ListProjects { user_id })
        .await?;
    Ok(Json(ApiResponse::success(projects)))
}

/// 删除项目（连同章节）
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<ProjectIdRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let Json(req) = payload?;

    state
        .delete_project_handler
        .handle(DeleteProject {
            user_id,
            project_id: req.id,
        })
        .await?;

    Ok(Json(ApiResponse::ok()))
}

/// 保存项目大纲
pub async fn save_outline(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<SaveOutlineRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BookOutline>>, ApiError> {
    let Json(req) = payload?;

    let outline = state
        .save_outline_handler
        .handle(SaveOutline {
            user_id,
            project_id: req.id,
            outline: req.outline,
        })
        .await?;

    Ok(Json(ApiResponse::success(outline)))
}

/// 保存章节正文
pub async fn save_chapter(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<SaveChapterRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ChapterResponse>>, ApiError> {
    let Json(req) = payload?;

    let chapter = state
        .save_chapter_handler
        .handle(SaveChapter {
            user_id,
            project_id: req.project_id,
            number: req.number,
            title: req.title,
            content: req.content,
        })
        .await?;

    Ok(Json(ApiResponse::success(ChapterResponse::from(chapter))))
}

/// 列出项目章节
pub async fn list_chapters(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<ProjectIdRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<ChapterResponse>>>, ApiError> {
    let Json(req) = payload?;

    let chapters = state
        .list_chapters_handler
        .handle(ListChapters {
            user_id,
            project_id: req.id,
        })
        .await?;

    Ok(Json(ApiResponse::success(chapters)))
}
