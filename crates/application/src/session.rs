//! 每连接会话 actor。
//!
//! 状态机 `disconnected -> connecting -> joined -> closing -> disconnected`，
//! 负责连接/收消息/断开的生命周期：把接受的内容写入存储、触发异步审核，
//! 并对审核结果做一次有界等待以便尽早把"被标记"的裁决推给房间。入站
//! 广播事件的转发不经过会话本身——出站通道由传输层的发送泵消费。

use std::sync::Arc;
use std::time::Duration;

use domain::{MessageRepository, Room, RoomRepository, UserRepository};
use serde::{Deserialize, Serialize};

use crate::broadcaster::{ConnectionId, EventSender, RoomBroadcaster, RoomEvent};
use crate::chat_service::resolve_room;
use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::moderation::ModerationOutcome;
use crate::moderation_queue::ModerationQueue;

/// 入站传输帧。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundFrame {
    pub message: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Joined,
    Closing,
}

pub struct SessionDependencies {
    pub room_repository: Arc<dyn RoomRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub broadcaster: Arc<dyn RoomBroadcaster>,
    pub moderation_queue: Arc<ModerationQueue>,
    pub clock: Arc<dyn Clock>,
    /// 审核裁决的有界等待时长
    pub verdict_wait: Duration,
}

pub struct ChatSession {
    deps: Arc<SessionDependencies>,
    connection_id: ConnectionId,
    state: SessionState,
    room: Option<Room>,
}

impl ChatSession {
    pub fn new(deps: Arc<SessionDependencies>) -> Self {
        Self {
            deps,
            connection_id: ConnectionId::generate(),
            state: SessionState::Disconnected,
            room: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    /// 解析房间并加入广播器。
    ///
    /// 先按名称精确匹配，否则对全部房间做大小写不敏感的线性扫描，
    /// 首个匹配生效。解析失败则拒绝连接，回到 `disconnected`。
    pub async fn connect(
        &mut self,
        room_ref: &str,
        sender: EventSender,
    ) -> Result<bool, ApplicationError> {
        self.state = SessionState::Connecting;

        let room = match resolve_room(self.deps.room_repository.as_ref(), room_ref).await? {
            Some(room) => room,
            None => {
                tracing::info!(room = %room_ref, "拒绝连接：房间不存在");
                self.state = SessionState::Disconnected;
                return Ok(false);
            }
        };

        self.deps
            .broadcaster
            .join(room.id, self.connection_id, sender)
            .await;
        tracing::info!(
            room_id = %room.id,
            connection_id = %self.connection_id,
            "会话已加入房间"
        );
        self.room = Some(room);
        self.state = SessionState::Joined;
        Ok(true)
    }

    /// 处理一条入站消息。
    ///
    /// 用户解析失败时静默丢弃（不产生事件、不报错帧）——延续源头
    /// "韧性优先于严格确认"的取舍。聊天事件在审核开始前就完成全量
    /// 扇出，投递延迟从不被审核阻塞。
    pub async fn receive(&mut self, frame: InboundFrame) -> Result<(), ApplicationError> {
        if self.state != SessionState::Joined {
            tracing::debug!(state = ?self.state, "忽略非 joined 状态下的入站消息");
            return Ok(());
        }
        let room = match &self.room {
            Some(room) => room.clone(),
            None => return Ok(()),
        };

        let user = match self
            .deps
            .user_repository
            .find_by_username(&frame.username)
            .await?
        {
            Some(user) => user,
            None => {
                tracing::debug!(username = %frame.username, "用户不存在，丢弃消息");
                return Ok(());
            }
        };

        if domain::Message::validate_content(&frame.message).is_err() {
            tracing::debug!(username = %frame.username, "消息内容超限，丢弃");
            return Ok(());
        }

        let message = self
            .deps
            .message_repository
            .create(room.id, user.id, &frame.message)
            .await?;

        self.deps
            .broadcaster
            .publish(
                room.id,
                RoomEvent::ChatMessage {
                    message: message.content.clone(),
                    username: user.username.as_str().to_owned(),
                    message_id: message.id,
                    timestamp: message.created_at,
                },
            )
            .await;

        // 异步审核任务已派发；这里的有界等待只是尽力加速，超时或失败
        // 不做任何补救，权威路径稍后自行广播同样的更新。
        let job = self.deps.moderation_queue.submit(message.id);
        match job.await_result(self.deps.verdict_wait).await {
            Ok(ModerationOutcome::Completed(result)) if result.is_flagged => {
                self.deps
                    .broadcaster
                    .publish(
                        room.id,
                        RoomEvent::ModerationUpdate {
                            message_id: result.message_id,
                            status: result.status,
                            notes: result.notes,
                        },
                    )
                    .await;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(message_id = %message.id, error = %err, "有界等待未得到裁决");
            }
        }

        Ok(())
    }

    /// 退出房间并回到 `disconnected`。可重复调用，从未加入也安全。
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.state = SessionState::Closing;
        if let Some(room) = &self.room {
            self.deps
                .broadcaster
                .leave(room.id, self.connection_id)
                .await;
        }
        self.room = None;
        self.state = SessionState::Disconnected;
    }
}
