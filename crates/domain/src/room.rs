//! 聊天室实体。

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{RoomId, Timestamp};

/// 聊天室实体。
///
/// 房间名是对外的稳定标识；按显示名解析时大小写不敏感、首个匹配生效。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(id: RoomId, name: impl Into<String>, created_at: Timestamp) -> Result<Self, DomainError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(DomainError::validation_error("name", "房间名不能为空"));
        }
        if name.chars().count() > 255 {
            return Err(DomainError::validation_error("name", "房间名超出长度限制"));
        }
        Ok(Self {
            id,
            name,
            created_at,
        })
    }

    /// 房间名的归一化形式，用于大小写不敏感的匹配。
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// 判断给定引用是否指向本房间：先精确匹配，再比较归一化形式。
    pub fn matches(&self, reference: &str) -> bool {
        self.name == reference || self.slug() == slugify(reference)
    }
}

/// 将显示名归一化为小写、连字符分隔的标识。
///
/// 非字母数字字符一律折叠成单个 `-`，首尾不留分隔符。
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_separator = true;
        }
    }
    slug
}
