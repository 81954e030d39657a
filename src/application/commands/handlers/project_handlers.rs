//! Project Command Handlers

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::{
    CreateProject, DeleteProject, EditOutline, OutlineOperation, SaveChapter, SaveOutline,
};
use crate::application::error::ApplicationError;
use crate::application::ports::{ChapterRecord, ProjectRecord, ProjectRepositoryPort};
use crate::domain::outline::BookOutline;

/// 查找属于该用户的项目，他人的项目一律视为不存在
pub(crate) async fn find_owned_project(
    repo: &dyn ProjectRepositoryPort,
    user_id: &str,
    project_id: Uuid,
) -> Result<ProjectRecord, ApplicationError> {
    repo.find_by_id(project_id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| ApplicationError::not_found("Project", project_id))
}

// ============================================================================
// CreateProject
// ============================================================================

/// CreateProject Handler
pub struct CreateProjectHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl CreateProjectHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, command: CreateProject) -> Result<ProjectRecord, ApplicationError> {
        if command.title.trim().is_empty() {
            return Err(ApplicationError::validation("title must not be empty"));
        }
        if command.book_type.trim().is_empty() {
            return Err(ApplicationError::validation("bookType must not be empty"));
        }

        let project = ProjectRecord::new(
            command.user_id,
            command.title,
            command.book_type,
            command.description,
        );
        self.project_repo.save(&project).await?;

        tracing::info!(
            project_id = %project.id,
            user_id = %project.user_id,
            title = %project.title,
            "Project created"
        );

        Ok(project)
    }
}

// ============================================================================
// DeleteProject
// ============================================================================

/// DeleteProject Handler
pub struct DeleteProjectHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl DeleteProjectHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, command: DeleteProject) -> Result<(), ApplicationError> {
        find_owned_project(self.project_repo.as_ref(), &command.user_id, command.project_id).await?;
        self.project_repo.delete(command.project_id).await?;

        tracing::info!(project_id = %command.project_id, "Project deleted");
        Ok(())
    }
}

// ============================================================================
// SaveOutline
// ============================================================================

/// SaveOutline Handler
pub struct SaveOutlineHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl SaveOutlineHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, command: SaveOutline) -> Result<BookOutline, ApplicationError> {
        command.outline.validate()?;
        find_owned_project(self.project_repo.as_ref(), &command.user_id, command.project_id).await?;

        self.project_repo
            .save_outline(command.project_id, &command.outline)
            .await?;

        tracing::info!(
            project_id = %command.project_id,
            chapters = command.outline.len(),
            "Project outline saved"
        );
        Ok(command.outline)
    }
}

// ============================================================================
// SaveChapter
// ============================================================================

/// SaveChapter Handler
pub struct SaveChapterHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl SaveChapterHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, command: SaveChapter) -> Result<ChapterRecord, ApplicationError> {
        if command.number == 0 {
            return Err(ApplicationError::validation("chapter number must be positive"));
        }
        find_owned_project(self.project_repo.as_ref(), &command.user_id, command.project_id).await?;

        let mut chapter = ChapterRecord::new(
            command.project_id,
            command.number,
            command.title,
            command.content,
        );
        chapter.updated_at = Utc::now();
        self.project_repo.save_chapter(&chapter).await?;

        tracing::info!(
            project_id = %command.project_id,
            chapter = chapter.number,
            word_count = chapter.word_count,
            "Chapter saved"
        );
        Ok(chapter)
    }
}

// ============================================================================
// EditOutline
// ============================================================================

/// EditOutline Handler - 纯领域操作，不访问仓储
#[derive(Default)]
pub struct EditOutlineHandler;

impl EditOutlineHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, command: EditOutline) -> Result<BookOutline, ApplicationError> {
        let EditOutline {
            mut outline,
            operation,
        } = command;
        let name = operation.name();

        // renumber 用于修复外部传入的编号，其余操作要求输入已满足编号不变量
        if !matches!(operation, OutlineOperation::Renumber) {
            outline.validate()?;
        }

        match operation {
            OutlineOperation::Insert { position, chapter } => {
                outline.insert_chapter(position, chapter)?;
            }
            OutlineOperation::Remove { number } => {
                outline.remove_chapter(number)?;
            }
            OutlineOperation::Move { from, to } => outline.move_chapter(from, to)?,
            OutlineOperation::Update { number, patch } => outline.update_chapter(number, patch)?,
            OutlineOperation::Renumber => outline.renumber(),
        }

        tracing::debug!(operation = %name, chapters = outline.len(), "Outline edited");
        Ok(outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outline::{ChapterOutline, SectionOutline};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteProjectRepository,
    };

    fn chapter(title: &str, sections: &[&str]) -> ChapterOutline {
        let mut chapter = ChapterOutline::new(title, "");
        chapter.sections = sections
            .iter()
            .map(|s| SectionOutline {
                id: String::new(),
                title: s.to_string(),
                summary: String::new(),
                estimated_word_count: 0,
            })
            .collect();
        chapter
    }

    #[test]
    fn test_remove_middle_chapter_renumbers() {
        let outline = BookOutline::new(vec![
            chapter("One", &["a"]),
            chapter("Two", &["b"]),
            chapter("Three", &["c"]),
        ]);

        let edited = EditOutlineHandler::new()
            .handle(EditOutline {
                outline,
                operation: OutlineOperation::Remove { number: 2 },
            })
            .unwrap();

        let chapters = edited.chapters();
        assert_eq!(chapters.len(), 2);
        assert_eq!((chapters[0].number, chapters[0].title.as_str()), (1, "One"));
        assert_eq!((chapters[1].number, chapters[1].title.as_str()), (2, "Three"));
        assert_eq!(chapters[0].sections[0].id, "1.1");
        assert_eq!(chapters[1].sections[0].id, "2.1");
    }

    #[test]
    fn test_operation_wire_format() {
        let operation: OutlineOperation = serde_json::from_value(serde_json::json!({
            "operation": "move",
            "from": 3,
            "to": 1
        }))
        .unwrap();
        assert!(matches!(operation, OutlineOperation::Move { from: 3, to: 1 }));

        let operation: OutlineOperation =
            serde_json::from_value(serde_json::json!({"operation": "renumber"})).unwrap();
        assert_eq!(operation.name(), "renumber");
    }

    #[test]
    fn test_missing_chapter_is_not_found() {
        let outline = BookOutline::new(vec![chapter("One", &[])]);
        let err = EditOutlineHandler::new()
            .handle(EditOutline {
                outline,
                operation: OutlineOperation::Remove { number: 4 },
            })
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }

    async fn repo() -> Arc<dyn ProjectRepositoryPort> {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(SqliteProjectRepository::new(pool))
    }

    #[tokio::test]
    async fn test_other_users_project_is_hidden() {
        let repo = repo().await;
        let project = CreateProjectHandler::new(repo.clone())
            .handle(CreateProject {
                user_id: "alice".into(),
                title: "Tides".into(),
                book_type: "novel".into(),
                description: String::new(),
            })
            .await
            .unwrap();

        let err = DeleteProjectHandler::new(repo.clone())
            .handle(DeleteProject {
                user_id: "bob".into(),
                project_id: project.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));

        let chapter = SaveChapterHandler::new(repo.clone())
            .handle(SaveChapter {
                user_id: "alice".into(),
                project_id: project.id,
                number: 1,
                title: "Arrival".into(),
                content: "one two three".into(),
            })
            .await
            .unwrap();
        assert_eq!(chapter.word_count, 3);
    }

    #[tokio::test]
    async fn test_save_outline_rejects_gaps() {
        let repo = repo().await;
        let project = CreateProjectHandler::new(repo.clone())
            .handle(CreateProject {
                user_id: "alice".into(),
                title: "Tides".into(),
                book_type: "novel".into(),
                description: String::new(),
            })
            .await
            .unwrap();

        let mut outline = BookOutline::new(vec![chapter("One", &[]), chapter("Two", &[])]);
        let mut broken: serde_json::Value = serde_json::to_value(&outline).unwrap();
        broken["chapters"][1]["number"] = serde_json::json!(5);
        let broken: BookOutline = serde_json::from_value(broken).unwrap();

        let handler = SaveOutlineHandler::new(repo.clone());
        let err = handler
            .handle(SaveOutline {
                user_id: "alice".into(),
                project_id: project.id,
                outline: broken,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));

        outline.renumber();
        handler
            .handle(SaveOutline {
                user_id: "alice".into(),
                project_id: project.id,
                outline: outline.clone(),
            })
            .await
            .unwrap();
        let stored = repo.find_by_id(project.id).await.unwrap().unwrap();
        assert_eq!(stored.outline, Some(outline));
    }
}
