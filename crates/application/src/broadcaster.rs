//! 房间级发布/订阅广播器。
//!
//! 维护 room_id -> 活跃连接集合 的注册表（成员关系，不是所有权——连接
//! 由会话 actor 持有）。投递是逐连接 fire-and-forget：一个连接失败不能
//! 影响同房间其他连接。注册表是唯一被多个 actor 并发修改的结构，由
//! 读写锁保护，生命周期随进程显式创建与销毁，不做环境全局量。

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use domain::{MessageId, ModerationNotes, ModerationStatus, RoomId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// 连接的临时标识，只存在于进程内，从不持久化。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 房间内广播的事件，序列化形态即对外线上协议。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomEvent {
    #[serde(rename = "message")]
    ChatMessage {
        message: String,
        username: String,
        message_id: MessageId,
        timestamp: Timestamp,
    },
    #[serde(rename = "moderation")]
    ModerationUpdate {
        message_id: MessageId,
        status: ModerationStatus,
        notes: ModerationNotes,
    },
}

/// 连接的出站通道。无界队列保证 publish 端不阻塞，顺序即发送顺序。
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

#[async_trait]
pub trait RoomBroadcaster: Send + Sync {
    async fn join(&self, room_id: RoomId, connection_id: ConnectionId, sender: EventSender);

    /// 幂等：离开从未加入的房间是 no-op
    async fn leave(&self, room_id: RoomId, connection_id: ConnectionId);

    /// 向调用时刻房间内的全部连接投递事件；空房间静默成功
    async fn publish(&self, room_id: RoomId, event: RoomEvent);
}

/// 进程内广播器实现。
#[derive(Default)]
pub struct LocalRoomBroadcaster {
    rooms: RwLock<HashMap<RoomId, HashMap<ConnectionId, EventSender>>>,
}

impl LocalRoomBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前房间成员数，测试与诊断用。
    pub async fn member_count(&self, room_id: RoomId) -> usize {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl RoomBroadcaster for LocalRoomBroadcaster {
    async fn join(&self, room_id: RoomId, connection_id: ConnectionId, sender: EventSender) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id).or_default().insert(connection_id, sender);
        tracing::debug!(room_id = %room_id, connection_id = %connection_id, "连接加入房间");
    }

    async fn leave(&self, room_id: RoomId, connection_id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&room_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                rooms.remove(&room_id);
            }
        }
        tracing::debug!(room_id = %room_id, connection_id = %connection_id, "连接离开房间");
    }

    async fn publish(&self, room_id: RoomId, event: RoomEvent) {
        // 快照调用时刻的成员，投递时不持有锁
        let members: Vec<(ConnectionId, EventSender)> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&room_id) {
                Some(members) => members
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        for (connection_id, sender) in members {
            if sender.send(event.clone()).is_err() {
                tracing::debug!(
                    room_id = %room_id,
                    connection_id = %connection_id,
                    "向已关闭的连接投递失败，移除成员"
                );
                dead.push(connection_id);
            }
        }

        if !dead.is_empty() {
            let mut rooms = self.rooms.write().await;
            if let Some(members) = rooms.get_mut(&room_id) {
                for connection_id in dead {
                    members.remove(&connection_id);
                }
                if members.is_empty() {
                    rooms.remove(&room_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chat_event(id: i64) -> RoomEvent {
        RoomEvent::ChatMessage {
            message: format!("message {id}"),
            username: "alice".into(),
            message_id: MessageId::new(id),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_to_empty_room_is_a_silent_success() {
        let broadcaster = LocalRoomBroadcaster::new();
        broadcaster.publish(RoomId::new(1), chat_event(1)).await;
    }

    #[tokio::test]
    async fn leaving_a_room_never_joined_is_a_no_op() {
        let broadcaster = LocalRoomBroadcaster::new();
        broadcaster
            .leave(RoomId::new(1), ConnectionId::generate())
            .await;
        assert_eq!(broadcaster.member_count(RoomId::new(1)).await, 0);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let broadcaster = LocalRoomBroadcaster::new();
        let room = RoomId::new(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.join(room, ConnectionId::generate(), tx).await;

        for id in 1..=5 {
            broadcaster.publish(room, chat_event(id)).await;
        }

        for expected in 1..=5 {
            match rx.recv().await.unwrap() {
                RoomEvent::ChatMessage { message_id, .. } => {
                    assert_eq!(message_id, MessageId::new(expected));
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn delivery_is_scoped_to_the_target_room() {
        let broadcaster = LocalRoomBroadcaster::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        broadcaster.join(RoomId::new(1), ConnectionId::generate(), tx_a).await;
        broadcaster.join(RoomId::new(2), ConnectionId::generate(), tx_b).await;

        broadcaster.publish(RoomId::new(1), chat_event(1)).await;

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_connection_does_not_affect_the_rest() {
        let broadcaster = LocalRoomBroadcaster::new();
        let room = RoomId::new(1);

        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();

        broadcaster.join(room, ConnectionId::generate(), dead_tx).await;
        broadcaster.join(room, ConnectionId::generate(), live_tx).await;

        broadcaster.publish(room, chat_event(1)).await;

        assert!(live_rx.recv().await.is_some());
        // 失效的连接在投递时被剔除
        assert_eq!(broadcaster.member_count(room).await, 1);
    }

    #[tokio::test]
    async fn membership_is_removed_on_leave() {
        let broadcaster = LocalRoomBroadcaster::new();
        let room = RoomId::new(1);
        let connection = ConnectionId::generate();
        let (tx, mut rx) = mpsc::unbounded_channel();

        broadcaster.join(room, connection, tx).await;
        broadcaster.leave(room, connection).await;
        broadcaster.publish(room, chat_event(1)).await;

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn chat_event_serializes_to_the_wire_contract() {
        let event = RoomEvent::ChatMessage {
            message: "hi".into(),
            username: "alice".into(),
            message_id: MessageId::new(9),
            timestamp: "2026-01-02T03:04:05Z".parse().unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "message");
        assert_eq!(json["message"], "hi");
        assert_eq!(json["username"], "alice");
        assert_eq!(json["message_id"], 9);
        assert_eq!(json["timestamp"], "2026-01-02T03:04:05Z");
    }

    #[test]
    fn moderation_event_serializes_to_the_wire_contract() {
        let event = RoomEvent::ModerationUpdate {
            message_id: MessageId::new(9),
            status: ModerationStatus::Flagged,
            notes: ModerationNotes {
                profanity: Some(true),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "moderation");
        assert_eq!(json["status"], "flagged");
        assert_eq!(json["notes"]["profanity"], true);
        assert!(json["notes"].get("sentiment").is_none());
    }
}
