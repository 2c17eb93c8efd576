//! 消息实体与审核状态机。
//!
//! 消息归属于房间（级联删除），携带审核状态、结构化审核记录和审核时间。

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{MessageId, RoomId, Timestamp, UserId};

/// 审核状态。
///
/// 初始状态为 `Pending`；`Flagged`/`Rejected` 视为被标记状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Flagged,
    Rejected,
}

impl ModerationStatus {
    /// 该状态是否意味着消息被标记。
    ///
    /// `is_flagged` 永远由状态推导，任何路径都不能独立设置它。
    pub fn is_flagged(self) -> bool {
        matches!(self, Self::Flagged | Self::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Flagged => "flagged",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "flagged" => Ok(Self::Flagged),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::validation_error(
                "status",
                format!("未知的审核状态: {other}"),
            )),
        }
    }
}

impl std::fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 情感分析得分。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    /// 极性，-1（负面）到 1（正面）
    pub polarity: f64,
    /// 主观性，0（客观）到 1（主观）
    pub subjectivity: f64,
}

/// 结构化审核记录。
///
/// 缺省的键在序列化时省略；`sentiment` 缺失表示分析没有执行或失败。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationNotes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profanity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_content: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagged_at: Option<Timestamp>,
}

impl ModerationNotes {
    pub fn is_empty(&self) -> bool {
        self.profanity.is_none()
            && self.sentiment.is_none()
            && self.negative_content.is_none()
            && self.flag_reason.is_none()
            && self.flagged_at.is_none()
    }
}

/// 消息实体。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: String,
    /// 创建时间，写入后不可变
    pub created_at: Timestamp,
    pub status: ModerationStatus,
    /// 由状态推导的便捷标记
    pub is_flagged: bool,
    pub notes: ModerationNotes,
    /// 首次审核完成之前为空
    pub moderated_at: Option<Timestamp>,
}

impl Message {
    /// 创建待审核的新消息。
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        user_id: UserId,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let content = content.into();
        Self::validate_content(&content)?;
        Ok(Self {
            id,
            room_id,
            user_id,
            content,
            created_at,
            status: ModerationStatus::Pending,
            is_flagged: false,
            notes: ModerationNotes::default(),
            moderated_at: None,
        })
    }

    /// 校验消息内容。空文本是合法输入，由分析器退化处理。
    pub fn validate_content(content: &str) -> Result<(), DomainError> {
        if content.chars().count() > 10_000 {
            return Err(DomainError::validation_error(
                "content",
                "消息内容不能超过10000个字符",
            ));
        }
        Ok(())
    }

    /// 应用一次审核结果。
    ///
    /// 同一消息在相同阈值下重复审核必须得到相同的状态与记录（幂等）。
    pub fn apply_moderation(
        &mut self,
        status: ModerationStatus,
        notes: ModerationNotes,
        moderated_at: Timestamp,
    ) {
        self.status = status;
        self.is_flagged = status.is_flagged();
        self.notes = notes;
        self.moderated_at = Some(moderated_at);
    }

    /// 人工复核：仅允许迁移到 approved / flagged / rejected。
    pub fn apply_review(
        &mut self,
        status: ModerationStatus,
        reviewed_at: Timestamp,
    ) -> Result<(), DomainError> {
        if status == ModerationStatus::Pending {
            return Err(DomainError::invalid_status_transition(
                self.status.as_str(),
                status.as_str(),
            ));
        }
        self.status = status;
        self.is_flagged = status.is_flagged();
        if status.is_flagged() {
            self.notes.flagged_at = Some(reviewed_at);
        }
        self.moderated_at = Some(reviewed_at);
        Ok(())
    }
}
