//! 主应用程序入口
//!
//! 装载配置、初始化日志、选择存储后端、装配审核管道并启动 Web 服务。

use std::sync::Arc;
use std::time::Duration;

use application::{
    ChatService, ChatServiceDependencies, Clock, LocalRoomBroadcaster, ModerationEngine,
    ModerationEngineDependencies, ModerationQueue, SessionDependencies, StatsService, SystemClock,
};
use domain::{MessageRepository, RoomRepository, UserRepository};
use infrastructure::{
    create_pg_pool, ensure_schema, InMemoryMessageRepository, InMemoryRoomRepository,
    InMemoryUserRepository, PgMessageRepository, PgRoomRepository, PgUserRepository,
    RetentionSweeper,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppConfig, AppState, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;

    // 选择存储后端
    let rooms: Arc<dyn RoomRepository>;
    let users: Arc<dyn UserRepository>;
    let messages: Arc<dyn MessageRepository>;
    match config.database.backend {
        StorageBackend::Postgres => {
            tracing::info!(
                "连接数据库: {}",
                config.database.url.split('@').next_back().unwrap_or("unknown")
            );
            let pool =
                create_pg_pool(&config.database.url, config.database.max_connections).await?;
            ensure_schema(&pool).await?;
            rooms = Arc::new(PgRoomRepository::new(pool.clone()));
            users = Arc::new(PgUserRepository::new(pool.clone()));
            messages = Arc::new(PgMessageRepository::new(pool));
        }
        StorageBackend::Memory => {
            tracing::info!("使用进程内内存存储");
            let memory_messages = Arc::new(InMemoryMessageRepository::new());
            rooms = Arc::new(InMemoryRoomRepository::with_cascade(memory_messages.clone()));
            users = Arc::new(InMemoryUserRepository::new());
            messages = memory_messages;
        }
    }

    let broadcaster = Arc::new(LocalRoomBroadcaster::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 审核引擎与后台工作池
    let engine = Arc::new(ModerationEngine::new(ModerationEngineDependencies {
        message_repository: messages.clone(),
        broadcaster: broadcaster.clone(),
        clock: clock.clone(),
        policy: config.moderation.policy(),
    }));
    let moderation_queue = Arc::new(ModerationQueue::start(engine, config.moderation.workers));

    let session_deps = Arc::new(SessionDependencies {
        room_repository: rooms.clone(),
        user_repository: users.clone(),
        message_repository: messages.clone(),
        broadcaster,
        moderation_queue,
        clock: clock.clone(),
        verdict_wait: config.moderation.verdict_wait(),
    });

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        room_repository: rooms,
        message_repository: messages.clone(),
        clock: clock.clone(),
    }));
    let stats_service = Arc::new(StatsService::new(messages.clone(), clock));

    // 保留期清理任务
    if config.retention.enabled {
        tracing::info!(
            max_age_days = config.retention.max_age_days,
            interval_seconds = config.retention.interval_seconds,
            "启动保留期清理任务"
        );
        RetentionSweeper::new(
            messages,
            config.retention.max_age_days,
            Duration::from_secs(config.retention.interval_seconds),
        )
        .spawn();
    }

    let state = AppState::new(chat_service, stats_service, session_deps);
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("聊天服务器启动在 http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
