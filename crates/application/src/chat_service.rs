//! 聊天室用例服务。
//!
//! 核心管道之外的房间与消息操作：建房/列表、可读历史、人工复核。

use std::sync::Arc;

use domain::{
    slugify, Message, MessageId, MessageRepository, ModerationStatus, Room, RoomRepository,
};

use crate::clock::Clock;
use crate::error::ApplicationError;

/// 历史查询的默认与上限条数。
const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 100;

/// 按引用解析房间：先精确名称匹配，否则对全部房间做归一化比较的
/// 线性扫描，首个匹配生效。房间数量小，线性扫描足够。
pub async fn resolve_room(
    rooms: &dyn RoomRepository,
    reference: &str,
) -> Result<Option<Room>, ApplicationError> {
    if let Some(room) = rooms.find_by_name(reference).await? {
        return Ok(Some(room));
    }
    let normalized = slugify(reference);
    let all = rooms.list_all().await?;
    Ok(all.into_iter().find(|room| room.slug() == normalized))
}

pub struct ChatServiceDependencies {
    pub room_repository: Arc<dyn RoomRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 按显示名幂等建房：已存在（含归一化匹配）则返回现房。
    pub async fn get_or_create_room(&self, name: &str) -> Result<Room, ApplicationError> {
        if let Some(room) = resolve_room(self.deps.room_repository.as_ref(), name).await? {
            return Ok(room);
        }
        let room = self.deps.room_repository.create(name.trim()).await?;
        tracing::info!(room_id = %room.id, name = %room.name, "创建房间");
        Ok(room)
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, ApplicationError> {
        Ok(self.deps.room_repository.list_all().await?)
    }

    /// 房间可读历史：排除 pending 与 flagged，按创建时间升序。
    pub async fn room_history(
        &self,
        room_ref: &str,
        limit: Option<u32>,
    ) -> Result<(Room, Vec<Message>), ApplicationError> {
        let room = resolve_room(self.deps.room_repository.as_ref(), room_ref)
            .await?
            .ok_or(ApplicationError::RoomNotFound)?;
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT);
        let messages = self
            .deps
            .message_repository
            .list_readable(room.id, limit)
            .await?;
        Ok((room, messages))
    }

    /// 人工复核：迁移到 approved / flagged / rejected。
    ///
    /// `is_flagged` 始终由状态推导；标记时盖上 `flagged_at`。
    pub async fn review_message(
        &self,
        message_id: MessageId,
        status: ModerationStatus,
    ) -> Result<Message, ApplicationError> {
        let mut message = self
            .deps
            .message_repository
            .find_by_id(message_id)
            .await?
            .ok_or(ApplicationError::MessageNotFound)?;

        let reviewed_at = self.deps.clock.now();
        message.apply_review(status, reviewed_at)?;

        self.deps
            .message_repository
            .update_moderation(message.id, message.status, &message.notes, reviewed_at)
            .await?;

        tracing::info!(message_id = %message.id, status = %message.status, "人工复核");
        Ok(message)
    }
}
