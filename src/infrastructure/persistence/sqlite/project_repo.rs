//! SQLite Project Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{
    ChapterRecord, ProjectRecord, ProjectRepositoryPort, RepositoryError,
};
use crate::domain::outline::BookOutline;

/// SQLite Project Repository
pub struct SqliteProjectRepository {
    pool: DbPool,
}

impl SqliteProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

fn parse_id(value: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(value).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

#[derive(FromRow)]
struct ProjectRow {
    id: String,
    user_id: String,
    title: String,
    book_type: String,
    description: String,
    outline: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProjectRow> for ProjectRecord {
    type Error = RepositoryError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let outline = row
            .outline
            .map(|json| serde_json::from_str::<BookOutline>(&json))
            .transpose()
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        Ok(ProjectRecord {
            id: parse_id(&row.id)?,
            user_id: row.user_id,
            title: row.title,
            book_type: row.book_type,
            description: row.description,
            outline,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct ChapterRow {
    project_id: String,
    number: i64,
    title: String,
    content: String,
    word_count: i64,
    updated_at: String,
}

impl TryFrom<ChapterRow> for ChapterRecord {
    type Error = RepositoryError;

    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        Ok(ChapterRecord {
            project_id: parse_id(&row.project_id)?,
            number: row.number as u32,
            title: row.title,
            content: row.content,
            word_count: row.word_count as u32,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

fn outline_json(outline: &BookOutline) -> Result<String, RepositoryError> {
    serde_json::to_string(outline).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

#[async_trait]
impl ProjectRepositoryPort for SqliteProjectRepository {
    async fn save(&self, project: &ProjectRecord) -> Result<(), RepositoryError> {
        let outline = project.outline.as_ref().map(outline_json).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO projects (id, user_id, title, book_type, description, outline, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                book_type = excluded.book_type,
                description = excluded.description,
                outline = excluded.outline,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(project.id.to_string())
        .bind(&project.user_id)
        .bind(&project.title)
        .bind(&project.book_type)
        .bind(&project.description)
        .bind(outline)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepositoryError> {
        let row: Option<ProjectRow> = sqlx::query_as(
            "SELECT id, user_id, title, book_type, description, outline, created_at, updated_at FROM projects WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(ProjectRecord::try_from).transpose()
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<ProjectRecord>, RepositoryError> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            "SELECT id, user_id, title, book_type, description, outline, created_at, updated_at FROM projects WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(ProjectRecord::try_from).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        sqlx::query("DELETE FROM chapters WHERE project_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }

        tx.commit().await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn save_outline(&self, id: Uuid, outline: &BookOutline) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE projects SET outline = ?, updated_at = ? WHERE id = ?")
            .bind(outline_json(outline)?)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn save_chapter(&self, chapter: &ChapterRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO chapters (project_id, number, title, content, word_count, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, number) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                word_count = excluded.word_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(chapter.project_id.to_string())
        .bind(chapter.number as i64)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(chapter.word_count as i64)
        .bind(chapter.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_chapters(&self, project_id: Uuid) -> Result<Vec<ChapterRecord>, RepositoryError> {
        let rows: Vec<ChapterRow> = sqlx::query_as(
            "SELECT project_id, number, title, content, word_count, updated_at FROM chapters WHERE project_id = ? ORDER BY number",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(ChapterRecord::try_from).collect()
    }
}
