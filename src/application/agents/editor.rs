//! Editor Agent - 整章修订与局部改写

use std::sync::Arc;

use super::{invoke_text, prompts, AgentOutput};
use crate::application::ports::{AgentRole, ModelError, ModelInvokerPort, ModelRequest};
use crate::domain::outline::ChapterOutline;

const TEMPERATURE: f32 = 0.5;

pub struct EditorAgent {
    invoker: Arc<dyn ModelInvokerPort>,
}

impl EditorAgent {
    pub fn new(invoker: Arc<dyn ModelInvokerPort>) -> Self {
        Self { invoker }
    }

    /// 修订整章，feedback 为上一轮 Critic 的意见
    pub async fn edit_chapter(
        &self,
        content: &str,
        feedback: Option<&str>,
        chapter: Option<&ChapterOutline>,
    ) -> Result<AgentOutput<String>, ModelError> {
        let request = ModelRequest::new(
            AgentRole::Editor,
            prompts::EDITOR_SYSTEM,
            prompts::edit_chapter(content, feedback, chapter),
            TEMPERATURE,
        );
        invoke_text(self.invoker.as_ref(), request).await
    }

    /// 按指令改写选中的片段
    pub async fn inline_edit(
        &self,
        selection: &str,
        instruction: &str,
        context: Option<&str>,
    ) -> Result<AgentOutput<String>, ModelError> {
        let request = ModelRequest::new(
            AgentRole::Editor,
            prompts::EDITOR_SYSTEM,
            prompts::inline_edit(selection, instruction, context),
            TEMPERATURE,
        );
        invoke_text(self.invoker.as_ref(), request).await
    }
}
