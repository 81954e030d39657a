//! Workflows - 多次模型调用的编排

mod editor_critic;

pub use editor_critic::{
    EditorCriticInput, EditorCriticLoop, EditorCriticOutcome, LoopAbort, LoopMode, LoopModeKind,
};
