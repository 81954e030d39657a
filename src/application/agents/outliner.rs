//! Outliner Agent - 大纲生成、修订与目录

use std::sync::Arc;

use serde::Deserialize;

use super::{invoke_structured, prompts, AgentOutput, BookBrief};
use crate::application::ports::{AgentRole, ModelError, ModelInvokerPort, ModelRequest};
use crate::domain::outline::{BookOutline, ChapterOutline, SectionOutline, TocEntry};
use crate::domain::ParseOutcome;

const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Deserialize)]
struct TocResponse {
    entries: Vec<TocEntry>,
}

pub struct OutlinerAgent {
    invoker: Arc<dyn ModelInvokerPort>,
}

impl OutlinerAgent {
    pub fn new(invoker: Arc<dyn ModelInvokerPort>) -> Self {
        Self { invoker }
    }

    /// 生成大纲（结构化）
    pub async fn generate_outline(
        &self,
        brief: &BookBrief,
        research: Option<&str>,
        chapter_count: Option<u32>,
    ) -> Result<AgentOutput<BookOutline>, ModelError> {
        let request = ModelRequest::new(
            AgentRole::Outliner,
            prompts::OUTLINER_SYSTEM,
            prompts::generate_outline(brief, research, chapter_count),
            TEMPERATURE,
        );

        let (outcome, usage) =
            invoke_structured(self.invoker.as_ref(), request, || Self::fallback_outline(brief)).await?;
        let outcome = normalize(outcome, || Self::fallback_outline(brief));

        tracing::debug!(
            chapters = outcome.value().len(),
            fallback = outcome.is_fallback(),
            "Outline generated"
        );
        Ok(AgentOutput::from_outcome(outcome, usage))
    }

    /// 按反馈修订大纲（结构化，失败时原样返回）
    pub async fn refine_outline(
        &self,
        outline: &BookOutline,
        feedback: &str,
    ) -> Result<AgentOutput<BookOutline>, ModelError> {
        let request = ModelRequest::new(
            AgentRole::Outliner,
            prompts::OUTLINER_SYSTEM,
            prompts::refine_outline(outline, feedback),
            TEMPERATURE,
        );

        let (outcome, usage) =
            invoke_structured(self.invoker.as_ref(), request, || Self::fallback_refinement(outline)).await?;
        let outcome = normalize(outcome, || Self::fallback_refinement(outline));
        Ok(AgentOutput::from_outcome(outcome, usage))
    }

    /// 生成目录（结构化，失败时由大纲直接推导）
    pub async fn table_of_contents(
        &self,
        outline: &BookOutline,
    ) -> Result<AgentOutput<Vec<TocEntry>>, ModelError> {
        let request = ModelRequest::new(
            AgentRole::Outliner,
            prompts::OUTLINER_SYSTEM,
            prompts::table_of_contents(outline),
            TEMPERATURE,
        );

        let (outcome, usage) = invoke_structured(self.invoker.as_ref(), request, || TocResponse {
            entries: Self::fallback_toc(outline),
        })
        .await?;

        let outcome = match outcome {
            ParseOutcome::Parsed(r) if r.entries.is_empty() => {
                ParseOutcome::Fallback(Self::fallback_toc(outline))
            }
            other => other.map(|r| {
                let mut entries = r.entries;
                for (i, entry) in entries.iter_mut().enumerate() {
                    entry.number = (i + 1) as u32;
                }
                entries
            }),
        };
        Ok(AgentOutput::from_outcome(outcome, usage))
    }

    /// 无法解析时的三章骨架
    pub fn fallback_outline(brief: &BookBrief) -> BookOutline {
        let chapters = [
            ("Introduction", "Introduces the premise"),
            ("Development", "Develops the core of"),
            ("Conclusion", "Brings to a close"),
        ]
        .into_iter()
        .map(|(title, lead)| {
            let mut chapter = ChapterOutline::new(
                format!("{}: {}", title, brief.title),
                format!("{} {}.", lead, brief.title),
            );
            chapter.sections = vec![SectionOutline {
                id: String::new(),
                title: title.to_string(),
                summary: String::new(),
                estimated_word_count: 1500,
            }];
            chapter
        })
        .collect();

        BookOutline::new(chapters)
    }

    /// 修订失败时保持原大纲
    pub fn fallback_refinement(outline: &BookOutline) -> BookOutline {
        outline.clone()
    }

    pub fn fallback_toc(outline: &BookOutline) -> Vec<TocEntry> {
        outline.table_of_contents()
    }
}

/// 去掉无标题章节并重新编号；结果为空时视为无法解析
fn normalize(
    outcome: ParseOutcome<BookOutline>,
    fallback: impl FnOnce() -> BookOutline,
) -> ParseOutcome<BookOutline> {
    match outcome {
        ParseOutcome::Parsed(outline) => {
            let chapters: Vec<ChapterOutline> = outline
                .chapters()
                .iter()
                .filter(|c| !c.title.trim().is_empty())
                .cloned()
                .collect();
            if chapters.is_empty() {
                tracing::warn!("Parsed outline has no usable chapters, using fallback");
                ParseOutcome::Fallback(fallback())
            } else {
                ParseOutcome::Parsed(BookOutline::new(chapters))
            }
        }
        fallback_outcome => fallback_outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::ScriptedModelClient;

    fn brief() -> BookBrief {
        BookBrief {
            book_type: "novel".into(),
            title: "Tides".into(),
            description: "A harbour town".into(),
            target_audience: None,
        }
    }

    #[tokio::test]
    async fn test_parsed_outline_is_renumbered() {
        let reply = r#"```json
{"chapters": [
  {"number": 4, "title": "Calm", "summary": "s", "sections": [{"id": "9.9", "title": "Dawn"}]},
  {"number": 7, "title": "", "summary": "dropped"},
  {"number": 2, "title": "Storm", "summary": "s", "sections": [{"title": "Wind"}, {"title": "Rain"}]}
]}
```"#;
        let client = Arc::new(ScriptedModelClient::new().with_reply(AgentRole::Outliner, reply));
        let agent = OutlinerAgent::new(client);

        let output = agent.generate_outline(&brief(), None, Some(2)).await.unwrap();
        assert!(!output.fallback);

        let chapters = output.value.chapters();
        assert_eq!(chapters.len(), 2);
        assert_eq!((chapters[0].number, chapters[0].title.as_str()), (1, "Calm"));
        assert_eq!(chapters[0].sections[0].id, "1.1");
        assert_eq!(chapters[1].sections[1].id, "2.2");
        assert!(output.value.validate().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_outline_falls_back_to_skeleton() {
        let client = Arc::new(ScriptedModelClient::new().with_reply(AgentRole::Outliner, "no json here"));
        let agent = OutlinerAgent::new(client);

        let output = agent.generate_outline(&brief(), None, None).await.unwrap();
        assert!(output.fallback);
        assert_eq!(output.value, OutlinerAgent::fallback_outline(&brief()));
        assert_eq!(output.value.len(), 3);
        assert!(output.value.chapters()[0].title.contains("Tides"));
    }

    #[tokio::test]
    async fn test_refine_falls_back_to_input() {
        let client = Arc::new(ScriptedModelClient::new().with_reply(AgentRole::Outliner, "{\"chapters\": []}"));
        let agent = OutlinerAgent::new(client);
        let original = OutlinerAgent::fallback_outline(&brief());

        let output = agent.refine_outline(&original, "more tension").await.unwrap();
        assert!(output.fallback);
        assert_eq!(output.value, original);
    }

    #[tokio::test]
    async fn test_toc_fallback_derives_from_outline() {
        let client = Arc::new(ScriptedModelClient::new().with_reply(AgentRole::Outliner, "{\"entries\": 3}"));
        let agent = OutlinerAgent::new(client);
        let outline = OutlinerAgent::fallback_outline(&brief());

        let output = agent.table_of_contents(&outline).await.unwrap();
        assert!(output.fallback);
        let numbers: Vec<u32> = output.value.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
