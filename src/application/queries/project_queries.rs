//! Project Queries - 书籍项目读操作

use uuid::Uuid;

/// 获取项目详情
#[derive(Debug, Clone)]
pub struct GetProject {
    pub user_id: String,
    pub project_id: Uuid,
}

/// 列出用户的项目
#[derive(Debug, Clone)]
pub struct ListProjects {
    pub user_id: String,
}

/// 列出项目的章节
#[derive(Debug, Clone)]
pub struct ListChapters {
    pub user_id: String,
    pub project_id: Uuid,
}
