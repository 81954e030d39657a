//! Project Query Handlers

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::handlers::find_owned_project;
use crate::application::error::ApplicationError;
use crate::application::ports::{ChapterRecord, ProjectRecord, ProjectRepositoryPort};
use crate::application::queries::{GetProject, ListChapters, ListProjects};
use crate::domain::outline::BookOutline;

// ============================================================================
// Response DTOs
// ============================================================================

/// 项目详情响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: Uuid,
    pub title: String,
    pub book_type: String,
    pub description: String,
    pub outline: Option<BookOutline>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ProjectRecord> for ProjectResponse {
    fn from(record: ProjectRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            book_type: record.book_type,
            description: record.description,
            outline: record.outline,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// 章节响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterResponse {
    pub number: u32,
    pub title: String,
    pub content: String,
    pub word_count: u32,
    pub updated_at: String,
}

impl From<ChapterRecord> for ChapterResponse {
    fn from(record: ChapterRecord) -> Self {
        Self {
            number: record.number,
            title: record.title,
            content: record.content,
            word_count: record.word_count,
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GetProject Handler
pub struct GetProjectHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl GetProjectHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, query: GetProject) -> Result<ProjectResponse, ApplicationError> {
        let project =
            find_owned_project(self.project_repo.as_ref(), &query.user_id, query.project_id).await?;
        Ok(ProjectResponse::from(project))
    }
}

/// ListProjects Handler
pub struct ListProjectsHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl ListProjectsHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, query: ListProjects) -> Result<Vec<ProjectResponse>, ApplicationError> {
        let projects = self.project_repo.find_by_user(&query.user_id).await?;
        Ok(projects.into_iter().map(ProjectResponse::from).collect())
    }
}

/// ListChapters Handler
pub struct ListChaptersHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl ListChaptersHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, query: ListChapters) -> Result<Vec<ChapterResponse>, ApplicationError> {
        find_owned_project(self.project_repo.as_ref(), &query.user_id, query.project_id).await?;
        let chapters = self.project_repo.find_chapters(query.project_id).await?;
        Ok(chapters.into_iter().map(ChapterResponse::from).collect())
    }
}
