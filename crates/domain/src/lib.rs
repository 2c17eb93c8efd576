//! 审核聊天系统核心领域模型
//!
//! 包含房间、用户、消息实体，审核状态机，以及消息存储协作者接口。

pub mod errors;
pub mod message;
pub mod repository;
pub mod room;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use message::*;
pub use repository::*;
pub use room::*;
pub use user::*;
pub use value_objects::*;
