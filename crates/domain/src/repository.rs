//! 消息存储协作者接口。
//!
//! 核心只约定它对持久化协作者的要求；单行创建/更新的原子性由实现保证，
//! 核心不做跨行事务。

use async_trait::async_trait;

use crate::errors::RepositoryResult;
use crate::message::{Message, ModerationNotes, ModerationStatus};
use crate::room::Room;
use crate::user::User;
use crate::value_objects::{MessageId, RoomId, Timestamp, UserId, Username};

/// 消息计数过滤条件。
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub created_after: Option<Timestamp>,
    pub status: Option<ModerationStatus>,
    pub flagged_only: bool,
}

impl MessageFilter {
    pub fn created_after(at: Timestamp) -> Self {
        Self {
            created_after: Some(at),
            ..Default::default()
        }
    }

    pub fn with_status(status: ModerationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn flagged() -> Self {
        Self {
            flagged_only: true,
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, name: &str) -> RepositoryResult<Room>;

    async fn find_by_id(&self, id: RoomId) -> RepositoryResult<Option<Room>>;

    /// 精确名称匹配；大小写不敏感的解析由调用方在 `list_all` 之上实现
    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Room>>;

    async fn list_all(&self) -> RepositoryResult<Vec<Room>>;

    /// 删除房间并级联删除其全部消息
    async fn delete(&self, id: RoomId) -> RepositoryResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, username: &Username) -> RepositoryResult<User>;

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 创建消息，状态初始化为 pending
    async fn create(
        &self,
        room_id: RoomId,
        user_id: UserId,
        content: &str,
    ) -> RepositoryResult<Message>;

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>>;

    /// 单次更新写入状态、审核记录和审核时间
    async fn update_moderation(
        &self,
        id: MessageId,
        status: ModerationStatus,
        notes: &ModerationNotes,
        moderated_at: Timestamp,
    ) -> RepositoryResult<()>;

    /// 房间可读历史：排除 pending 与 flagged，按创建时间升序，截断到 limit
    async fn list_readable(&self, room_id: RoomId, limit: u32) -> RepositoryResult<Vec<Message>>;

    async fn count(&self, room_id: RoomId, filter: &MessageFilter) -> RepositoryResult<u64>;

    /// 指定时间之后发过言的去重用户数
    async fn count_distinct_senders(
        &self,
        room_id: RoomId,
        since: Timestamp,
    ) -> RepositoryResult<u64>;

    /// 已有情感分析记录的消息的极性序列
    async fn sentiment_polarities(&self, room_id: RoomId) -> RepositoryResult<Vec<f64>>;

    /// 删除早于截止时间的消息，返回删除数量
    async fn delete_created_before(&self, cutoff: Timestamp) -> RepositoryResult<u64>;
}
