use std::sync::Arc;

use application::{ChatService, SessionDependencies, StatsService};

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub stats_service: Arc<StatsService>,
    /// 每个 WebSocket 连接据此构造自己的会话 actor
    pub session_deps: Arc<SessionDependencies>,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        stats_service: Arc<StatsService>,
        session_deps: Arc<SessionDependencies>,
    ) -> Self {
        Self {
            chat_service,
            stats_service,
            session_deps,
        }
    }
}
