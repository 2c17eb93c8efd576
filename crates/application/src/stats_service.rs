//! 房间统计聚合。
//!
//! 对消息存储的纯读查询，按调用时刻重新计算，不做缓存、不做任何修改。

use std::sync::Arc;

use chrono::Duration;
use domain::{MessageFilter, MessageRepository, ModerationStatus, RoomId};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::ApplicationError;

/// 某一时点的房间指标。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomStatistics {
    pub total_messages: u64,
    pub messages_24h: u64,
    pub messages_7d: u64,
    pub flagged_count: u64,
    pub pending_count: u64,
    pub active_users_24h: u64,
    pub active_users_7d: u64,
    /// 平均情感极性的百分数表示，保留一位小数；无样本时为 0
    pub average_sentiment: f64,
}

pub struct StatsService {
    message_repository: Arc<dyn MessageRepository>,
    clock: Arc<dyn Clock>,
}

impl StatsService {
    pub fn new(message_repository: Arc<dyn MessageRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            message_repository,
            clock,
        }
    }

    pub async fn get_statistics(&self, room_id: RoomId) -> Result<RoomStatistics, ApplicationError> {
        let now = self.clock.now();
        let last_24h = now - Duration::hours(24);
        let last_7d = now - Duration::days(7);
        let repo = self.message_repository.as_ref();

        let total_messages = repo.count(room_id, &MessageFilter::default()).await?;
        let messages_24h = repo
            .count(room_id, &MessageFilter::created_after(last_24h))
            .await?;
        let messages_7d = repo
            .count(room_id, &MessageFilter::created_after(last_7d))
            .await?;
        let flagged_count = repo.count(room_id, &MessageFilter::flagged()).await?;
        let pending_count = repo
            .count(room_id, &MessageFilter::with_status(ModerationStatus::Pending))
            .await?;
        let active_users_24h = repo.count_distinct_senders(room_id, last_24h).await?;
        let active_users_7d = repo.count_distinct_senders(room_id, last_7d).await?;

        // 无情感记录的消息既不进分子也不进分母
        let polarities = repo.sentiment_polarities(room_id).await?;
        let average_sentiment = if polarities.is_empty() {
            0.0
        } else {
            let mean = polarities.iter().sum::<f64>() / polarities.len() as f64;
            round_one_decimal(mean * 100.0)
        };

        Ok(RoomStatistics {
            total_messages,
            messages_24h,
            messages_7d,
            flagged_count,
            pending_count,
            active_users_24h,
            active_users_7d,
            average_sentiment,
        })
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
