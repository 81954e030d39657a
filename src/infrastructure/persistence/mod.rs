//! Persistence Layer - 数据持久化
//!
//! SQLite 存储实现：项目、章节、用量账本

pub mod sqlite;

pub use self::sqlite::{SqliteProjectRepository, SqliteUsageLedger};
