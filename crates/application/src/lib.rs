//! 应用层实现。
//!
//! 这里提供实时消息管道的用例服务：内容分析、审核引擎与后台任务队列、
//! 房间广播、每连接会话 actor，以及面向报表协作者的统计聚合。

pub mod analyzer;
pub mod broadcaster;
pub mod chat_service;
pub mod clock;
pub mod error;
pub mod moderation;
pub mod moderation_queue;
pub mod session;
pub mod stats_service;

pub use analyzer::{analyze, ContentAnalysis};
pub use broadcaster::{ConnectionId, EventSender, LocalRoomBroadcaster, RoomBroadcaster, RoomEvent};
pub use chat_service::{resolve_room, ChatService, ChatServiceDependencies};
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use moderation::{
    ModerationEngine, ModerationEngineDependencies, ModerationOutcome, ModerationPolicy,
    ModerationResult,
};
pub use moderation_queue::{ModerationJob, ModerationQueue, ModerationWaitError};
pub use session::{ChatSession, InboundFrame, SessionDependencies, SessionState};
pub use stats_service::{RoomStatistics, StatsService};
