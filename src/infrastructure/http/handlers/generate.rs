//! Generation Handlers
//!
//! 非流式阶段返回 JSON；写作阶段另有两种流式输出:
//! - SSE: `start` / `chunk` / `complete` / `error` 事件，负载为 JSON
//! - raw: 直接写出文本片段的分块响应体

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures_util::Stream;
use std::convert::Infallible;
use std::sync::Arc;

use crate::application::{
    GenerateCommand, GenerationRequest, StreamChapterCommand, StreamEvent,
};
use crate::infrastructure::http::dto::{ApiResponse, GenerateResult};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::extract::UserId;
use crate::infrastructure::http::state::AppState;

/// 执行一次阶段生成
pub async fn generate(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<GenerateResult>>, ApiError> {
    let Json(request) = payload?;

    let response = state
        .generate_handler
        .handle(GenerateCommand { user_id, request })
        .await?;

    Ok(Json(ApiResponse::success(GenerateResult::from(response))))
}

fn stream_command(user_id: String, request: GenerationRequest) -> Result<StreamChapterCommand, ApiError> {
    match request {
        GenerationRequest::Write(assignment) => Ok(StreamChapterCommand { user_id, assignment }),
        other => Err(ApiError::BadRequest(format!(
            "phase {} does not support streaming",
            other.phase()
        ))),
    }
}

/// 流式写作（SSE 事件）
pub async fn generate_stream(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload?;
    let command = stream_command(user_id, request)?;

    let (mut events, guard) = state.chapter_stream_handler.handle(command)?.into_parts();

    // 响应体被丢弃（客户端断开）时 guard 随之释放并取消生成
    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = events.recv().await {
            let sse = Event::default()
                .event(event.name())
                .data(event.data().to_string());
            yield Ok::<Event, Infallible>(sse);
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// 流式写作（原始文本分块）
pub async fn generate_stream_raw(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let command = stream_command(user_id, request)?;

    let (mut events, guard) = state.chapter_stream_handler.handle(command)?.into_parts();

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = events.recv().await {
            match event {
                StreamEvent::Chunk { text } => yield Ok::<String, Infallible>(text),
                StreamEvent::Error { error } => {
                    tracing::warn!(error = %error, "Raw chapter stream ended with error");
                    break;
                }
                StreamEvent::Start { .. } | StreamEvent::Complete { .. } => {}
            }
        }
    };

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    ))
}
