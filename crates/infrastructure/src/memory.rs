//! 内存存储实现。
//!
//! 默认后端，同时充当集成测试的存储替身。锁的临界区内没有 await，
//! 用标准库读写锁即可。

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{
    Message, MessageFilter, MessageId, MessageRepository, ModerationNotes, ModerationStatus,
    RepositoryError, RepositoryResult, Room, RoomId, RoomRepository, Timestamp, User,
    UserId, UserRepository, Username,
};

/// 内存消息存储。
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<BTreeMap<MessageId, Message>>,
    next_id: AtomicI64,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> MessageId {
        MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// 级联删除指定房间的全部消息。
    pub fn delete_by_room(&self, room_id: RoomId) -> u64 {
        let mut messages = self.messages.write().expect("message store poisoned");
        let before = messages.len();
        messages.retain(|_, message| message.room_id != room_id);
        (before - messages.len()) as u64
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(
        &self,
        room_id: RoomId,
        user_id: UserId,
        content: &str,
    ) -> RepositoryResult<Message> {
        let id = self.allocate_id();
        let message = Message::new(id, room_id, user_id, content, chrono::Utc::now())
            .map_err(|err| RepositoryError::storage(err.to_string()))?;
        self.messages
            .write()
            .expect("message store poisoned")
            .insert(id, message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>> {
        Ok(self
            .messages
            .read()
            .expect("message store poisoned")
            .get(&id)
            .cloned())
    }

    async fn update_moderation(
        &self,
        id: MessageId,
        status: ModerationStatus,
        notes: &ModerationNotes,
        moderated_at: Timestamp,
    ) -> RepositoryResult<()> {
        let mut messages = self.messages.write().expect("message store poisoned");
        let message = messages.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        message.apply_moderation(status, notes.clone(), moderated_at);
        Ok(())
    }

    async fn list_readable(&self, room_id: RoomId, limit: u32) -> RepositoryResult<Vec<Message>> {
        let messages = self.messages.read().expect("message store poisoned");
        let mut readable: Vec<Message> = messages
            .values()
            .filter(|message| message.room_id == room_id)
            .filter(|message| {
                !matches!(
                    message.status,
                    ModerationStatus::Pending | ModerationStatus::Flagged
                )
            })
            .cloned()
            .collect();
        readable.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        readable.truncate(limit as usize);
        Ok(readable)
    }

    async fn count(&self, room_id: RoomId, filter: &MessageFilter) -> RepositoryResult<u64> {
        let messages = self.messages.read().expect("message store poisoned");
        let count = messages
            .values()
            .filter(|message| message.room_id == room_id)
            .filter(|message| {
                filter
                    .created_after
                    .map_or(true, |since| message.created_at >= since)
            })
            .filter(|message| filter.status.map_or(true, |status| message.status == status))
            .filter(|message| !filter.flagged_only || message.is_flagged)
            .count();
        Ok(count as u64)
    }

    async fn count_distinct_senders(
        &self,
        room_id: RoomId,
        since: Timestamp,
    ) -> RepositoryResult<u64> {
        let messages = self.messages.read().expect("message store poisoned");
        let senders: HashSet<UserId> = messages
            .values()
            .filter(|message| message.room_id == room_id && message.created_at >= since)
            .map(|message| message.user_id)
            .collect();
        Ok(senders.len() as u64)
    }

    async fn sentiment_polarities(&self, room_id: RoomId) -> RepositoryResult<Vec<f64>> {
        let messages = self.messages.read().expect("message store poisoned");
        Ok(messages
            .values()
            .filter(|message| message.room_id == room_id)
            .filter_map(|message| message.notes.sentiment.as_ref())
            .map(|sentiment| sentiment.polarity)
            .collect())
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> RepositoryResult<u64> {
        let mut messages = self.messages.write().expect("message store poisoned");
        let before = messages.len();
        messages.retain(|_, message| message.created_at >= cutoff);
        Ok((before - messages.len()) as u64)
    }
}

/// 内存房间存储。
#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<BTreeMap<RoomId, Room>>,
    next_id: AtomicI64,
    /// 级联删除的目标；不设置时删除只移除房间本身
    cascade: Option<Arc<InMemoryMessageRepository>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 删除房间时级联删除其消息。
    pub fn with_cascade(messages: Arc<InMemoryMessageRepository>) -> Self {
        Self {
            cascade: Some(messages),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn create(&self, name: &str) -> RepositoryResult<Room> {
        let mut rooms = self.rooms.write().expect("room store poisoned");
        if rooms.values().any(|room| room.name == name) {
            return Err(RepositoryError::Conflict);
        }
        let id = RoomId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let room = Room::new(id, name, chrono::Utc::now())
            .map_err(|err| RepositoryError::storage(err.to_string()))?;
        rooms.insert(id, room.clone());
        Ok(room)
    }

    async fn find_by_id(&self, id: RoomId) -> RepositoryResult<Option<Room>> {
        Ok(self
            .rooms
            .read()
            .expect("room store poisoned")
            .get(&id)
            .cloned())
    }

    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Room>> {
        Ok(self
            .rooms
            .read()
            .expect("room store poisoned")
            .values()
            .find(|room| room.name == name)
            .cloned())
    }

    async fn list_all(&self) -> RepositoryResult<Vec<Room>> {
        Ok(self
            .rooms
            .read()
            .expect("room store poisoned")
            .values()
            .cloned()
            .collect())
    }

    async fn delete(&self, id: RoomId) -> RepositoryResult<()> {
        let removed = self
            .rooms
            .write()
            .expect("room store poisoned")
            .remove(&id);
        if removed.is_none() {
            return Err(RepositoryError::NotFound);
        }
        if let Some(messages) = &self.cascade {
            messages.delete_by_room(id);
        }
        Ok(())
    }
}

/// 内存用户存储。
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<BTreeMap<UserId, User>>,
    next_id: AtomicI64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, username: &Username) -> RepositoryResult<User> {
        let mut users = self.users.write().expect("user store poisoned");
        if users
            .values()
            .any(|user| user.username.as_str() == username.as_str())
        {
            return Err(RepositoryError::Conflict);
        }
        let id = UserId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let user = User::new(id, username.clone(), chrono::Utc::now());
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .read()
            .expect("user store poisoned")
            .values()
            .find(|user| user.username.as_str() == username)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_ids_are_monotonic_integers() {
        let repo = InMemoryMessageRepository::new();
        let room = RoomId::new(1);
        let user = UserId::new(1);

        let first = repo.create(room, user, "a").await.unwrap();
        let second = repo.create(room, user, "b").await.unwrap();
        assert_eq!(first.id, MessageId::new(1));
        assert_eq!(second.id, MessageId::new(2));
        assert_eq!(first.status, ModerationStatus::Pending);
    }

    #[tokio::test]
    async fn update_moderation_on_missing_message_is_not_found() {
        let repo = InMemoryMessageRepository::new();
        let err = repo
            .update_moderation(
                MessageId::new(404),
                ModerationStatus::Approved,
                &ModerationNotes::default(),
                chrono::Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn retention_deletes_only_strictly_older_messages() {
        let repo = InMemoryMessageRepository::new();
        let room = RoomId::new(1);
        let user = UserId::new(1);

        let old = repo.create(room, user, "old").await.unwrap();
        let fresh = repo.create(room, user, "fresh").await.unwrap();

        // 手动把第一条改旧
        {
            let mut messages = repo.messages.write().unwrap();
            messages.get_mut(&old.id).unwrap().created_at =
                chrono::Utc::now() - chrono::Duration::days(10);
        }

        let cutoff = chrono::Utc::now() - chrono::Duration::days(7);
        let deleted = repo.delete_created_before(cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.find_by_id(old.id).await.unwrap().is_none());
        assert!(repo.find_by_id(fresh.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_room_names_conflict() {
        let repo = InMemoryRoomRepository::new();
        repo.create("lounge").await.unwrap();
        let err = repo.create("lounge").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict));
    }

    #[tokio::test]
    async fn deleting_a_room_cascades_to_its_messages() {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let rooms = InMemoryRoomRepository::with_cascade(messages.clone());

        let room = rooms.create("lounge").await.unwrap();
        let other = rooms.create("other").await.unwrap();
        let doomed = messages.create(room.id, UserId::new(1), "a").await.unwrap();
        let kept = messages.create(other.id, UserId::new(1), "b").await.unwrap();

        rooms.delete(room.id).await.unwrap();

        assert!(messages.find_by_id(doomed.id).await.unwrap().is_none());
        assert!(messages.find_by_id(kept.id).await.unwrap().is_some());
        assert!(rooms.find_by_id(room.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let repo = InMemoryUserRepository::new();
        let alice = Username::parse("alice").unwrap();

        repo.create(&alice).await.unwrap();
        assert!(repo.create(&alice).await.is_err());
        assert!(repo.find_by_username("alice").await.unwrap().is_some());
        assert!(repo.find_by_username("bob").await.unwrap().is_none());
    }
}
