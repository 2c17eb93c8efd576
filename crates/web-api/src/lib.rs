//! Web 层。
//!
//! Axum 路由：WebSocket 端点（会话 actor 的传输绑定）与房间/历史/
//! 统计/复核的 REST 端点，外加 figment 配置装载。

pub mod app_config;
pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use app_config::{AppConfig, StorageBackend, ThresholdPreset};
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
