//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{GenerateResponse, OutlineOperation, PhaseOutput};
use crate::domain::outline::BookOutline;
use crate::domain::quota::UsageInfo;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(Empty {}),
        }
    }
}

// ============================================================================
// Generation DTOs
// ============================================================================

/// 生成结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    pub phase: &'static str,
    pub result: PhaseOutput,
    pub tokens_used: u64,
    pub quota: UsageInfo,
}

impl From<GenerateResponse> for GenerateResult {
    fn from(response: GenerateResponse) -> Self {
        Self {
            phase: response.phase,
            result: response.output,
            tokens_used: response.usage_record.amount,
            quota: response.quota,
        }
    }
}

// ============================================================================
// Outline DTOs
// ============================================================================

/// 大纲编辑请求，`operation` 字段与大纲并列
#[derive(Debug, Deserialize)]
pub struct EditOutlineRequest {
    pub outline: BookOutline,
    #[serde(flatten)]
    pub operation: OutlineOperation,
}

// ============================================================================
// Project DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub title: String,
    pub book_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectIdRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SaveOutlineRequest {
    pub id: Uuid,
    pub outline: BookOutline,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChapterRequest {
    pub project_id: Uuid,
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edit_outline_request_flattens_operation() {
        let request: EditOutlineRequest = serde_json::from_value(json!({
            "outline": {"chapters": [{"number": 1, "title": "One"}]},
            "operation": "remove",
            "number": 1
        }))
        .unwrap();

        assert_eq!(request.outline.len(), 1);
        assert!(matches!(request.operation, OutlineOperation::Remove { number: 1 }));
    }

    #[test]
    fn test_ok_response_shape() {
        let value = serde_json::to_value(ApiResponse::ok()).unwrap();
        assert_eq!(value, json!({"errno": 0, "error": "", "data": {}}));
    }
}
