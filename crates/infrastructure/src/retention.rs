//! 消息保留期清理任务。
//!
//! 周期性删除早于配置年龄的消息。与审核任务之间的竞态是被接受的：
//! 审核引擎对消失的消息报告 not-found 并跳过。

use std::sync::Arc;
use std::time::Duration;

use domain::{MessageRepository, RepositoryError, Timestamp};
use tokio::task::JoinHandle;

pub struct RetentionSweeper {
    message_repository: Arc<dyn MessageRepository>,
    max_age: chrono::Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        message_repository: Arc<dyn MessageRepository>,
        max_age_days: i64,
        interval: Duration,
    ) -> Self {
        Self {
            message_repository,
            max_age: chrono::Duration::days(max_age_days),
            interval,
        }
    }

    /// 执行一轮清理，返回删除数量。
    pub async fn sweep_once(&self, now: Timestamp) -> Result<u64, RepositoryError> {
        let cutoff = now - self.max_age;
        let deleted = self
            .message_repository
            .delete_created_before(cutoff)
            .await?;
        tracing::info!(deleted, cutoff = %cutoff, "保留期清理完成");
        Ok(deleted)
    }

    /// 启动周期任务；进程退出时随运行时一起终止。
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // 第一个 tick 立即触发，跳过它让清理从一个完整周期后开始
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = self.sweep_once(chrono::Utc::now()).await {
                    tracing::error!(error = %err, "保留期清理失败");
                }
            }
        })
    }
}
