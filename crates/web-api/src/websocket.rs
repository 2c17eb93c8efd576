//! WebSocket 传输绑定。
//!
//! `GET /ws/{room}` 升级后为该连接构造一个会话 actor：接收循环把入站
//! 帧喂给 `ChatSession::receive`，发送泵把会话的出站事件序列化成 JSON
//! 文本帧。任一半边结束即拆除连接并执行 `disconnect`。

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use application::{ChatSession, InboundFrame};

use crate::state::AppState;

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Path(room): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, room_ref: String) {
    let mut session = ChatSession::new(state.session_deps.clone());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    match session.connect(&room_ref, event_tx).await {
        Ok(true) => {}
        Ok(false) => {
            // 房间解析失败：拒绝连接，不发错误帧
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
        Err(err) => {
            tracing::error!(room = %room_ref, error = %err, "建立会话失败");
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    }

    let (mut sink, mut stream) = socket.split();

    // 发送泵：独立任务消费会话的出站通道，有界等待不影响事件转发
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(error = %err, "事件序列化失败");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let frame: InboundFrame = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(err) => {
                            tracing::warn!(error = %err, "丢弃无法解析的入站帧");
                            continue;
                        }
                    };
                    if let Err(err) = session.receive(frame).await {
                        tracing::error!(error = %err, "处理入站消息失败");
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong 由协议层处理，二进制帧忽略
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "WebSocket 读取错误");
                    break;
                }
            }
        }
    }

    send_task.abort();
    session.disconnect().await;
    tracing::info!(connection_id = %session.connection_id(), "WebSocket 连接已断开");
}
