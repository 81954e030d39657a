//! LLM Adapter - 模型调用客户端实现

mod fake_model_client;
mod http_model_client;

pub use fake_model_client::{ScriptedModelClient, ScriptedReply};
pub use http_model_client::{HttpModelClient, HttpModelClientConfig};
