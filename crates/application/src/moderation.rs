//! 审核引擎。
//!
//! 把内容分析器的输出套上策略阈值，决定标记或放行，持久化状态迁移并
//! 向房间广播 `moderation_update`。每条消息的七个步骤作为一个原子序列
//! 执行，同一消息的两次审核不允许交错（由队列按消息分片串行保证）。

use std::sync::Arc;

use domain::{
    MessageId, MessageRepository, ModerationNotes, ModerationStatus, RepositoryError,
    SentimentScore, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::analyzer::{analyze, ContentAnalysis};
use crate::broadcaster::{RoomBroadcaster, RoomEvent};
use crate::clock::Clock;
use crate::error::ApplicationError;

/// 负面内容的固定标记理由，与对外协议保持一致。
const NEGATIVE_FLAG_REASON: &str = "Potentially negative or unfriendly message";

/// 审核策略阈值。
///
/// 源头存在两套并行的灵敏度（面向儿童的更严格），哪一套是权威口径仍是
/// 待定的产品决策，所以两套都以命名预设的形式暴露，可由配置覆盖。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModerationPolicy {
    /// 极性低于该值视为负面
    pub negative_polarity_threshold: f64,
    /// 主观性高于该值才触发负面标记
    pub subjectivity_threshold: f64,
}

impl ModerationPolicy {
    /// 更严格的灵敏度预设。
    pub const SENSITIVE: Self = Self {
        negative_polarity_threshold: -0.1,
        subjectivity_threshold: 0.5,
    };

    /// 更宽松的灵敏度预设。
    pub const RELAXED: Self = Self {
        negative_polarity_threshold: -0.35,
        subjectivity_threshold: 0.5,
    };
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self::SENSITIVE
    }
}

/// 一次完成的审核结果，既作为任务返回值也作为加速广播的载荷。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationResult {
    pub message_id: MessageId,
    pub is_flagged: bool,
    pub status: ModerationStatus,
    pub notes: ModerationNotes,
}

/// 审核任务的出口：完成，或消息在执行前已被清理掉。
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationOutcome {
    Completed(ModerationResult),
    NotFound,
}

pub struct ModerationEngineDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub broadcaster: Arc<dyn RoomBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub policy: ModerationPolicy,
}

pub struct ModerationEngine {
    deps: ModerationEngineDependencies,
}

impl ModerationEngine {
    pub fn new(deps: ModerationEngineDependencies) -> Self {
        Self { deps }
    }

    pub fn policy(&self) -> ModerationPolicy {
        self.deps.policy
    }

    /// 纯决策：分析结果 + 阈值 -> (状态, 审核记录)。
    ///
    /// 相同内容与相同阈值重复执行得到相同结论，幂等重放安全。
    pub fn evaluate(
        &self,
        analysis: &ContentAnalysis,
        at: Timestamp,
    ) -> (ModerationStatus, ModerationNotes) {
        let mut notes = ModerationNotes::default();
        let mut flagged = false;

        if analysis.profane {
            notes.profanity = Some(true);
            flagged = true;
        }

        notes.sentiment = Some(SentimentScore {
            polarity: analysis.polarity,
            subjectivity: analysis.subjectivity,
        });

        if analysis.polarity < self.deps.policy.negative_polarity_threshold
            && analysis.subjectivity > self.deps.policy.subjectivity_threshold
        {
            notes.negative_content = Some(true);
            notes.flag_reason = Some(NEGATIVE_FLAG_REASON.to_owned());
            flagged = true;
        }

        if flagged {
            notes.flagged_at = Some(at);
            (ModerationStatus::Flagged, notes)
        } else {
            (ModerationStatus::Approved, notes)
        }
    }

    /// 执行一条消息的完整审核。
    ///
    /// 消息不存在（保留清理与审核之间的竞态）返回 `NotFound`：记录日志、
    /// 不持久化、不广播、不重试。存储故障对这次任务是致命的，向上传播。
    pub async fn moderate(
        &self,
        message_id: MessageId,
    ) -> Result<ModerationOutcome, ApplicationError> {
        let message = match self.deps.message_repository.find_by_id(message_id).await? {
            Some(message) => message,
            None => {
                tracing::warn!(message_id = %message_id, "待审核消息不存在，跳过");
                return Ok(ModerationOutcome::NotFound);
            }
        };

        let analysis = analyze(&message.content);
        let moderated_at = self.deps.clock.now();
        let (status, notes) = self.evaluate(&analysis, moderated_at);

        match self
            .deps
            .message_repository
            .update_moderation(message_id, status, &notes, moderated_at)
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => {
                // 读与写之间被保留清理删除
                tracing::warn!(message_id = %message_id, "消息在审核途中被删除，跳过");
                return Ok(ModerationOutcome::NotFound);
            }
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(
            message_id = %message_id,
            status = %status,
            "审核完成"
        );

        self.deps
            .broadcaster
            .publish(
                message.room_id,
                RoomEvent::ModerationUpdate {
                    message_id,
                    status,
                    notes: notes.clone(),
                },
            )
            .await;

        Ok(ModerationOutcome::Completed(ModerationResult {
            message_id,
            is_flagged: status.is_flagged(),
            status,
            notes,
        }))
    }
}
