//! 集成测试支撑：内存后端的完整应用装配。

use std::sync::Arc;
use std::time::Duration;

use application::{
    ChatService, ChatServiceDependencies, LocalRoomBroadcaster, ModerationEngine,
    ModerationEngineDependencies, ModerationPolicy, ModerationQueue, SessionDependencies,
    StatsService, SystemClock,
};
use infrastructure::{InMemoryMessageRepository, InMemoryRoomRepository, InMemoryUserRepository};
use web_api::{router, AppState};

pub struct TestApp {
    pub router: axum::Router,
    pub rooms: Arc<InMemoryRoomRepository>,
    pub users: Arc<InMemoryUserRepository>,
    pub messages: Arc<InMemoryMessageRepository>,
}

/// 组装一个内存后端的完整应用；必须在 tokio 运行时内调用。
pub fn build_app() -> TestApp {
    let messages = Arc::new(InMemoryMessageRepository::new());
    let rooms = Arc::new(InMemoryRoomRepository::with_cascade(messages.clone()));
    let users = Arc::new(InMemoryUserRepository::new());
    let broadcaster = Arc::new(LocalRoomBroadcaster::new());
    let clock = Arc::new(SystemClock);

    let engine = Arc::new(ModerationEngine::new(ModerationEngineDependencies {
        message_repository: messages.clone(),
        broadcaster: broadcaster.clone(),
        clock: clock.clone(),
        policy: ModerationPolicy::SENSITIVE,
    }));
    let moderation_queue = Arc::new(ModerationQueue::start(engine, 2));

    let session_deps = Arc::new(SessionDependencies {
        room_repository: rooms.clone(),
        user_repository: users.clone(),
        message_repository: messages.clone(),
        broadcaster,
        moderation_queue,
        clock: clock.clone(),
        verdict_wait: Duration::from_secs(2),
    });

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        room_repository: rooms.clone(),
        message_repository: messages.clone(),
        clock: clock.clone(),
    }));
    let stats_service = Arc::new(StatsService::new(messages.clone(), clock));

    let state = AppState::new(chat_service, stats_service, session_deps);

    TestApp {
        router: router(state),
        rooms,
        users,
        messages,
    }
}
