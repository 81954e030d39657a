//! Writer Agent - 章节正文

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{invoke_text, prompts, AgentOutput, ChapterAssignment};
use crate::application::ports::{AgentRole, ModelError, ModelInvokerPort, ModelRequest};

const TEMPERATURE: f32 = 0.8;

pub struct WriterAgent {
    invoker: Arc<dyn ModelInvokerPort>,
}

impl WriterAgent {
    pub fn new(invoker: Arc<dyn ModelInvokerPort>) -> Self {
        Self { invoker }
    }

    fn request(assignment: &ChapterAssignment) -> ModelRequest {
        ModelRequest::new(
            AgentRole::Writer,
            prompts::WRITER_SYSTEM,
            prompts::write_chapter(assignment),
            TEMPERATURE,
        )
    }

    pub async fn write_chapter(
        &self,
        assignment: &ChapterAssignment,
    ) -> Result<AgentOutput<String>, ModelError> {
        invoke_text(self.invoker.as_ref(), Self::request(assignment)).await
    }

    /// 流式写作，片段按生成顺序发送到 chunks
    pub async fn write_chapter_streaming(
        &self,
        assignment: &ChapterAssignment,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<AgentOutput<String>, ModelError> {
        let completion = self
            .invoker
            .invoke_streaming(Self::request(assignment), chunks, cancel)
            .await?;
        if completion.text.trim().is_empty() {
            return Err(ModelError::EmptyResponse {
                usage: completion.usage,
            });
        }
        Ok(AgentOutput::new(completion.text, completion.usage))
    }
}
