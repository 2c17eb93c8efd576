//! 审核后台任务队列。
//!
//! 与连接 actor 解耦的工作池：任务按消息 ID 分片到固定的 worker，
//! 同一消息的两次审核永远落在同一个 worker 上顺序执行（逐消息串行），
//! 不同消息并行。任务句柄携带一次性结果通道，供发送方的有界等待使用。

use std::sync::Arc;
use std::time::Duration;

use domain::MessageId;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::moderation::{ModerationEngine, ModerationOutcome};

/// 有界等待的失败形态。超时不是错误：权威路径随后仍会广播结果。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModerationWaitError {
    #[error("moderation result not ready within the wait bound")]
    Elapsed,
    #[error("moderation job terminated without a result")]
    Aborted,
}

struct QueueJob {
    message_id: MessageId,
    result_tx: oneshot::Sender<ModerationOutcome>,
}

/// 单个审核任务的句柄。
pub struct ModerationJob {
    message_id: MessageId,
    result_rx: oneshot::Receiver<ModerationOutcome>,
}

impl ModerationJob {
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// 在时间上限内等待该任务的结果。
    ///
    /// 这是一个纯本地、限时的 await：除了"结果及时到达就多发一个事件"
    /// 之外没有任何副作用，也不影响任务本身的执行。
    pub async fn await_result(
        self,
        timeout: Duration,
    ) -> Result<ModerationOutcome, ModerationWaitError> {
        match tokio::time::timeout(timeout, self.result_rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(ModerationWaitError::Aborted),
            Err(_) => Err(ModerationWaitError::Elapsed),
        }
    }
}

/// 审核工作池。
pub struct ModerationQueue {
    shards: Vec<mpsc::UnboundedSender<QueueJob>>,
}

impl ModerationQueue {
    /// 启动 `workers` 个 worker，必须在 tokio 运行时内调用。
    pub fn start(engine: Arc<ModerationEngine>, workers: usize) -> Self {
        let workers = workers.max(1);
        let mut shards = Vec::with_capacity(workers);

        for worker in 0..workers {
            let (tx, mut rx) = mpsc::unbounded_channel::<QueueJob>();
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    match engine.moderate(job.message_id).await {
                        Ok(outcome) => {
                            // 发送方可能早已放弃等待，忽略丢弃的接收端
                            let _ = job.result_tx.send(outcome);
                        }
                        Err(err) => {
                            // 存储故障对这次任务是致命的；worker 继续服务
                            tracing::error!(
                                worker,
                                message_id = %job.message_id,
                                error = %err,
                                "审核任务失败"
                            );
                        }
                    }
                }
            });
            shards.push(tx);
        }

        Self { shards }
    }

    /// 投递一个审核任务（非阻塞），返回可供有界等待的句柄。
    pub fn submit(&self, message_id: MessageId) -> ModerationJob {
        let (result_tx, result_rx) = oneshot::channel();
        let shard = (message_id.0.unsigned_abs() as usize) % self.shards.len();
        let job = QueueJob {
            message_id,
            result_tx,
        };
        if self.shards[shard].send(job).is_err() {
            // worker 已退出；句柄上的等待会以 Aborted 结束
            tracing::error!(message_id = %message_id, "审核 worker 不可用");
        }
        ModerationJob {
            message_id,
            result_rx,
        }
    }
}
