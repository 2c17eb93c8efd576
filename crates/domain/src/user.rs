//! 用户实体。
//!
//! 注册与认证属于外部协作者，核心只负责按用户名解析已有用户。

use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub created_at: Timestamp,
}

impl User {
    pub fn new(id: UserId, username: Username, created_at: Timestamp) -> Self {
        Self {
            id,
            username,
            created_at,
        }
    }
}
