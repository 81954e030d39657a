//! WebSocket Handler
//!
//! 按用户推送生成完成、循环结束、流式结束和配额预警事件

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::infrastructure::http::state::AppState;

/// 用户事件 WebSocket
pub async fn events_websocket_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_user_socket(socket, user_id, state))
}

async fn handle_user_socket(socket: WebSocket, user_id: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_rx = state.event_publisher.register_user(&user_id);

    tracing::info!(user_id = %user_id, "WebSocket connected");

    let forward_user = user_id.clone();
    let mut forward_task = tokio::spawn(async move {
        loop {
            let event = match event_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %forward_user, skipped, "WebSocket subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(
                    user_id = %forward_user,
                    error = %e,
                    "Failed to send WebSocket message"
                );
                break;
            }
        }
    });

    // 接收客户端消息（心跳与关闭）
    let receive_user = user_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::info!(user_id = %receive_user, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(user_id = %receive_user, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 任一方向结束即中止另一方，并等待其释放订阅后再回收通道
    tokio::select! {
        _ = &mut forward_task => {
            receive_task.abort();
            let _ = receive_task.await;
        }
        _ = &mut receive_task => {
            forward_task.abort();
            let _ = forward_task.await;
        }
    }

    state.event_publisher.unregister_user(&user_id);
    tracing::info!(user_id = %user_id, "WebSocket disconnected");
}
