//! Domain Layer - 领域层
//!
//! 包含三个限界上下文:
//! - Outline Context: 书籍大纲与章节编号
//! - Review Context: 评审打分与 Editor/Critic 迭代状态机
//! - Quota Context: 用户 token 配额周期

pub mod outline;
pub mod quota;
pub mod review;

// 模型输出的结构化提取
mod json_extract;

pub use json_extract::{extract_json_object, parse_fail_soft, ParseOutcome};
