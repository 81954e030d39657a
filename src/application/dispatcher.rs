//! Pipeline Dispatcher - 按阶段派发
//!
//! 只负责按 phase 选择 Agent 或循环控制器并传入对应参数，
//! 结果原样返回，不含其他业务逻辑。
//! 派发前按同样的路由给出该请求的配额预留量

use std::sync::Arc;

use crate::application::agents::{
    CriticAgent, EditorAgent, OutlinerAgent, ResearchAgent, WriterAgent,
};
use crate::application::commands::{payload_bytes, GenerationRequest, PhaseOutput};
use crate::application::error::ApplicationError;
use crate::application::ports::ModelInvokerPort;
use crate::application::workflows::{EditorCriticInput, EditorCriticLoop, LoopMode};
use crate::domain::quota::{CallPlan, ReservationPolicy};
use crate::domain::review::LoopSettings;

pub struct PipelineDispatcher {
    research: ResearchAgent,
    outliner: OutlinerAgent,
    writer: Arc<WriterAgent>,
    critic: Arc<CriticAgent>,
    editor: Arc<EditorAgent>,
    editor_critic: EditorCriticLoop,
    loop_defaults: LoopSettings,
    reservation: ReservationPolicy,
}

impl PipelineDispatcher {
    pub fn new(invoker: Arc<dyn ModelInvokerPort>, loop_defaults: LoopSettings) -> Self {
        let editor = Arc::new(EditorAgent::new(invoker.clone()));
        let critic = Arc::new(CriticAgent::new(invoker.clone()));
        Self {
            research: ResearchAgent::new(invoker.clone()),
            outliner: OutlinerAgent::new(invoker.clone()),
            writer: Arc::new(WriterAgent::new(invoker)),
            editor_critic: EditorCriticLoop::new(editor.clone(), critic.clone()),
            critic,
            editor,
            loop_defaults,
            reservation: ReservationPolicy::default(),
        }
    }

    pub fn with_reservation_policy(mut self, reservation: ReservationPolicy) -> Self {
        self.reservation = reservation;
        self
    }

    pub fn reservation_policy(&self) -> ReservationPolicy {
        self.reservation
    }

    pub fn writer(&self) -> Arc<WriterAgent> {
        self.writer.clone()
    }

    pub fn loop_defaults(&self) -> LoopSettings {
        self.loop_defaults
    }

    /// 校验请求，包括与默认值合并后的循环参数
    pub fn validate(&self, request: &GenerationRequest) -> Result<(), ApplicationError> {
        request.validate().map_err(ApplicationError::validation)?;
        match request {
            GenerationRequest::EditorCritic(p) => {
                self.loop_settings(p.max_iterations, p.pass_threshold)?;
            }
            GenerationRequest::Critic(p) => {
                self.loop_settings(None, p.pass_threshold)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// 请求的用量上界，作为 check_quota 的预留量（须在 validate 之后调用）
    pub fn reservation_tokens(&self, request: &GenerationRequest) -> u64 {
        let plan = match request {
            GenerationRequest::EditorCritic(p) if p.use_feedback_loop => {
                let max_iterations = self
                    .loop_settings(p.max_iterations, p.pass_threshold)
                    .map_or(self.loop_defaults.max_iterations(), |s| s.max_iterations());
                CallPlan::editor_critic(max_iterations)
            }
            GenerationRequest::EditorCritic(_) => CallPlan::editor_critic(1),
            _ => CallPlan::single(),
        };
        self.reservation.reserve(plan, payload_bytes(request))
    }

    fn loop_settings(
        &self,
        max_iterations: Option<u32>,
        pass_threshold: Option<u8>,
    ) -> Result<LoopSettings, ApplicationError> {
        self.loop_defaults
            .with_overrides(max_iterations, pass_threshold)
            .map_err(|e| ApplicationError::validation(e.to_string()))
    }

    pub async fn dispatch(&self, request: GenerationRequest) -> Result<PhaseOutput, ApplicationError> {
        let output = match request {
            GenerationRequest::Research(brief) => {
                PhaseOutput::Questions(self.research.generate_questions(&brief).await?)
            }
            GenerationRequest::ResearchBrief(p) => {
                PhaseOutput::Text(self.research.compile_research(&p.brief, &p.answers).await?)
            }
            GenerationRequest::Outline(p) => PhaseOutput::Outline(
                self.outliner
                    .generate_outline(&p.brief, p.research.as_deref(), p.chapter_count)
                    .await?,
            ),
            GenerationRequest::Refine(p) => {
                PhaseOutput::Outline(self.outliner.refine_outline(&p.outline, &p.feedback).await?)
            }
            GenerationRequest::Toc(p) => {
                PhaseOutput::Toc(self.outliner.table_of_contents(&p.outline).await?)
            }
            GenerationRequest::Write(assignment) => {
                PhaseOutput::Text(self.writer.write_chapter(&assignment).await?)
            }
            GenerationRequest::Edit(p) => PhaseOutput::Text(
                self.editor
                    .edit_chapter(&p.content, p.feedback.as_deref(), p.chapter.as_ref())
                    .await?,
            ),
            GenerationRequest::Critic(p) => {
                let settings = self.loop_settings(None, p.pass_threshold)?;
                PhaseOutput::Evaluation(
                    self.critic
                        .evaluate(&p.content, p.chapter.as_ref(), settings.pass_threshold())
                        .await?,
                )
            }
            GenerationRequest::EditorCritic(p) => {
                let settings = self.loop_settings(p.max_iterations, p.pass_threshold)?;
                let mode = if p.use_feedback_loop {
                    LoopMode::Iterative(settings)
                } else {
                    LoopMode::SinglePass {
                        pass_threshold: settings.pass_threshold(),
                    }
                };
                let input = EditorCriticInput {
                    content: p.content,
                    chapter: p.chapter,
                    feedback: p.feedback,
                };
                PhaseOutput::EditorCritic(self.editor_critic.run(input, mode).await?)
            }
            GenerationRequest::InlineEdit(p) => PhaseOutput::Text(
                self.editor
                    .inline_edit(&p.selection, &p.instruction, p.context.as_deref())
                    .await?,
            ),
        };
        Ok(output)
    }
}
