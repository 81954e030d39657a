//! 结构化输出提取器
//!
//! 模型并不保证遵守 JSON 输出格式，这里负责从自由文本中找出第一个
//! 平衡的 `{...}` 片段并解析，失败时退回到调用方给出的默认值。
//!
//! 边界行为：
//! - 只识别第一个 `{` 开始的平衡片段；后续出现的其他对象一律忽略
//! - 嵌套对象属于外层片段的一部分
//! - 字符串内部的 `{` / `}` 与转义引号不参与括号计数
//! - 第一个 `{` 没有匹配的 `}` 时视为无结构化输出，不会再尝试后面的 `{`

use serde::de::DeserializeOwned;

/// 解析结果
///
/// `Fallback` 表示模型输出无法解析，值来自调用方的默认构造
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    /// 从模型输出中成功解析
    Parsed(T),
    /// 使用了文档约定的默认值
    Fallback(T),
}

impl<T> ParseOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::Fallback(_))
    }

    pub fn value(&self) -> &T {
        match self {
            ParseOutcome::Parsed(v) | ParseOutcome::Fallback(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            ParseOutcome::Parsed(v) | ParseOutcome::Fallback(v) => v,
        }
    }

    /// 转换内部值，保留 Parsed/Fallback 标记
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Parsed(v) => ParseOutcome::Parsed(f(v)),
            ParseOutcome::Fallback(v) => ParseOutcome::Fallback(f(v)),
        }
    }
}

/// 定位第一个平衡的 JSON 对象片段
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&raw[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

/// 尝试解析模型输出，失败时使用默认值
pub fn parse_fail_soft<T, F>(raw: &str, fallback: F) -> ParseOutcome<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let Some(candidate) = extract_json_object(raw) else {
        tracing::debug!(raw_len = raw.len(), "No JSON object in model output, using fallback");
        return ParseOutcome::Fallback(fallback());
    };

    match serde_json::from_str::<T>(candidate) {
        Ok(value) => ParseOutcome::Parsed(value),
        Err(e) => {
            tracing::debug!(error = %e, "Model output is not valid for schema, using fallback");
            ParseOutcome::Fallback(fallback())
        }
    }
}
