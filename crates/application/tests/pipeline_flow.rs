//! 实时消息管道的端到端流程测试：会话 -> 存储 -> 广播 -> 异步审核。

use std::sync::Arc;
use std::time::Duration;

use application::{
    ChatSession, ConnectionId, InboundFrame, LocalRoomBroadcaster, ModerationEngine,
    ModerationEngineDependencies, ModerationOutcome, ModerationPolicy, ModerationQueue,
    RoomBroadcaster, RoomEvent, SessionDependencies, SessionState, SystemClock,
};
use domain::{
    MessageId, MessageRepository, ModerationStatus, RoomRepository, UserRepository, Username,
};
use infrastructure::{InMemoryMessageRepository, InMemoryRoomRepository, InMemoryUserRepository};
use tokio::sync::mpsc;

struct Harness {
    rooms: Arc<InMemoryRoomRepository>,
    users: Arc<InMemoryUserRepository>,
    messages: Arc<InMemoryMessageRepository>,
    broadcaster: Arc<LocalRoomBroadcaster>,
    queue: Arc<ModerationQueue>,
    session_deps: Arc<SessionDependencies>,
}

fn harness(policy: ModerationPolicy, verdict_wait: Duration) -> Harness {
    let rooms = Arc::new(InMemoryRoomRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());
    let messages = Arc::new(InMemoryMessageRepository::new());
    let broadcaster = Arc::new(LocalRoomBroadcaster::new());
    let clock = Arc::new(SystemClock);

    let engine = Arc::new(ModerationEngine::new(ModerationEngineDependencies {
        message_repository: messages.clone(),
        broadcaster: broadcaster.clone(),
        clock: clock.clone(),
        policy,
    }));
    let queue = Arc::new(ModerationQueue::start(engine, 4));

    let session_deps = Arc::new(SessionDependencies {
        room_repository: rooms.clone(),
        user_repository: users.clone(),
        message_repository: messages.clone(),
        broadcaster: broadcaster.clone(),
        moderation_queue: queue.clone(),
        clock,
        verdict_wait,
    });

    Harness {
        rooms,
        users,
        messages,
        broadcaster,
        queue,
        session_deps,
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<RoomEvent>) -> RoomEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event not delivered in time")
        .expect("event channel closed")
}

#[tokio::test]
async fn chat_event_precedes_moderation_update_and_duplicates_are_expected() {
    let h = harness(ModerationPolicy::SENSITIVE, Duration::from_secs(2));
    let room = h.rooms.create("lounge").await.unwrap();
    h.users
        .create(&Username::parse("alice").unwrap())
        .await
        .unwrap();

    let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
    h.broadcaster
        .join(room.id, ConnectionId::generate(), observer_tx)
        .await;

    let mut session = ChatSession::new(h.session_deps.clone());
    let (sender_tx, _sender_rx) = mpsc::unbounded_channel();
    assert!(session.connect("lounge", sender_tx).await.unwrap());

    session
        .receive(InboundFrame {
            message: "I hate this, it is awful and terrible".into(),
            username: "alice".into(),
        })
        .await
        .unwrap();

    let first = next_event(&mut observer_rx).await;
    let message_id = match first {
        RoomEvent::ChatMessage {
            message_id,
            ref username,
            ..
        } => {
            assert_eq!(username, "alice");
            message_id
        }
        other => panic!("expected chat_message first, got {other:?}"),
    };

    let second = next_event(&mut observer_rx).await;
    match &second {
        RoomEvent::ModerationUpdate {
            message_id: moderated_id,
            status,
            notes,
        } => {
            assert_eq!(*moderated_id, message_id);
            assert_eq!(*status, ModerationStatus::Flagged);
            assert_eq!(notes.negative_content, Some(true));
        }
        other => panic!("expected moderation_update second, got {other:?}"),
    }

    // 有界等待命中"被标记"裁决时会加速补发同一份更新；重复投递是预期行为
    let third = next_event(&mut observer_rx).await;
    assert_eq!(third, second);

    let stored = h.messages.find_by_id(message_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ModerationStatus::Flagged);
    assert!(stored.is_flagged);
}

#[tokio::test]
async fn approved_messages_produce_exactly_one_moderation_update() {
    let h = harness(ModerationPolicy::SENSITIVE, Duration::from_secs(2));
    let room = h.rooms.create("lounge").await.unwrap();
    h.users
        .create(&Username::parse("bob").unwrap())
        .await
        .unwrap();

    let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
    h.broadcaster
        .join(room.id, ConnectionId::generate(), observer_tx)
        .await;

    let mut session = ChatSession::new(h.session_deps.clone());
    let (sender_tx, _sender_rx) = mpsc::unbounded_channel();
    assert!(session.connect("lounge", sender_tx).await.unwrap());

    session
        .receive(InboundFrame {
            message: "what a wonderful and happy day".into(),
            username: "bob".into(),
        })
        .await
        .unwrap();

    assert!(matches!(
        next_event(&mut observer_rx).await,
        RoomEvent::ChatMessage { .. }
    ));
    match next_event(&mut observer_rx).await {
        RoomEvent::ModerationUpdate { status, .. } => {
            assert_eq!(status, ModerationStatus::Approved);
        }
        other => panic!("expected moderation_update, got {other:?}"),
    }

    // 放行的消息不触发加速补发
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(observer_rx.try_recv().is_err());
}

#[tokio::test]
async fn expired_bounded_wait_still_gets_the_authoritative_update() {
    // 等待时长为零，必然超时；权威路径照常广播
    let h = harness(ModerationPolicy::SENSITIVE, Duration::ZERO);
    let room = h.rooms.create("lounge").await.unwrap();
    h.users
        .create(&Username::parse("alice").unwrap())
        .await
        .unwrap();

    let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
    h.broadcaster
        .join(room.id, ConnectionId::generate(), observer_tx)
        .await;

    let mut session = ChatSession::new(h.session_deps.clone());
    let (sender_tx, _sender_rx) = mpsc::unbounded_channel();
    assert!(session.connect("lounge", sender_tx).await.unwrap());

    session
        .receive(InboundFrame {
            message: "you are stupid and pathetic".into(),
            username: "alice".into(),
        })
        .await
        .unwrap();

    assert!(matches!(
        next_event(&mut observer_rx).await,
        RoomEvent::ChatMessage { .. }
    ));
    match next_event(&mut observer_rx).await {
        RoomEvent::ModerationUpdate { status, .. } => {
            assert_eq!(status, ModerationStatus::Flagged);
        }
        other => panic!("expected moderation_update, got {other:?}"),
    }
}

#[tokio::test]
async fn connection_to_an_unknown_room_is_rejected() {
    let h = harness(ModerationPolicy::SENSITIVE, Duration::from_secs(2));

    let mut session = ChatSession::new(h.session_deps.clone());
    let (sender_tx, _sender_rx) = mpsc::unbounded_channel();

    assert!(!session.connect("missing", sender_tx).await.unwrap());
    assert_eq!(session.state(), SessionState::Disconnected);

    // 从未成功加入的连接断开是 no-op，且可重复
    session.disconnect().await;
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn room_resolution_falls_back_to_normalized_names() {
    let h = harness(ModerationPolicy::SENSITIVE, Duration::from_secs(2));
    h.rooms.create("General Chat").await.unwrap();

    let mut session = ChatSession::new(h.session_deps.clone());
    let (sender_tx, _sender_rx) = mpsc::unbounded_channel();
    assert!(session.connect("general-chat", sender_tx).await.unwrap());
    assert_eq!(session.state(), SessionState::Joined);
    assert_eq!(session.room().unwrap().name, "General Chat");
}

#[tokio::test]
async fn messages_from_unknown_users_are_dropped_silently() {
    let h = harness(ModerationPolicy::SENSITIVE, Duration::from_secs(2));
    let room = h.rooms.create("lounge").await.unwrap();

    let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
    h.broadcaster
        .join(room.id, ConnectionId::generate(), observer_tx)
        .await;

    let mut session = ChatSession::new(h.session_deps.clone());
    let (sender_tx, _sender_rx) = mpsc::unbounded_channel();
    assert!(session.connect("lounge", sender_tx).await.unwrap());

    session
        .receive(InboundFrame {
            message: "hello?".into(),
            username: "ghost".into(),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(observer_rx.try_recv().is_err());
    assert_eq!(
        h.messages
            .count(room.id, &domain::MessageFilter::default())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn moderating_a_vanished_message_reports_not_found() {
    let h = harness(ModerationPolicy::SENSITIVE, Duration::from_secs(2));

    let job = h.queue.submit(MessageId::new(404));
    let outcome = job.await_result(Duration::from_secs(2)).await.unwrap();
    assert_eq!(outcome, ModerationOutcome::NotFound);
}

#[tokio::test]
async fn concurrent_jobs_settle_every_message_exactly_once() {
    let h = harness(ModerationPolicy::SENSITIVE, Duration::from_secs(2));
    let room = h.rooms.create("lounge").await.unwrap();
    let user = domain::UserId::new(1);

    let mut jobs = Vec::new();
    for i in 0..8 {
        let content = if i % 2 == 0 {
            "what a wonderful and happy day"
        } else {
            "I hate this, it is awful and terrible"
        };
        let message = h.messages.create(room.id, user, content).await.unwrap();
        jobs.push((message.id, h.queue.submit(message.id)));
    }

    for (message_id, job) in jobs {
        let outcome = job.await_result(Duration::from_secs(2)).await.unwrap();
        let result = match outcome {
            ModerationOutcome::Completed(result) => result,
            ModerationOutcome::NotFound => panic!("message vanished"),
        };

        // 每条消息的最终持久化状态正好对应一次完成的审核
        let stored = h.messages.find_by_id(message_id).await.unwrap().unwrap();
        assert_eq!(stored.status, result.status);
        assert_eq!(stored.is_flagged, result.is_flagged);
        assert_eq!(stored.notes, result.notes);
        assert!(stored.moderated_at.is_some());
        assert!(stored.notes.sentiment.is_some());
    }
}
