//! Fakes shared by the unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{Notify, mpsc};

use crate::bus::{BusStream, LocalBus, MessageBus};
use crate::content::{ContentSummary, Owner};
use crate::hub::{ChatMessage, MessageHandler};
use crate::store::{MemoryRoomStore, Room, RoomId, RoomStore};
use crate::utils::{ChatError, Result};

fn refused() -> ChatError {
    ChatError::StoreUnavailable("connection refused".into())
}

/// A store whose backend is unreachable.
pub struct DownStore;

#[async_trait]
impl RoomStore for DownStore {
    async fn get_room(&self, _room_id: &str) -> Result<Option<Room>> {
        Err(refused())
    }
    async fn put_room(&self, _room: &Room) -> Result<()> {
        Err(refused())
    }
    async fn delete_room(&self, _room_id: &str) -> Result<()> {
        Err(refused())
    }
    async fn list_room_ids(&self) -> Result<HashSet<RoomId>> {
        Err(refused())
    }
    async fn get_membership(&self, _session_id: &str) -> Result<Option<RoomId>> {
        Err(refused())
    }
    async fn set_membership(&self, _session_id: &str, _room_id: &str) -> Result<()> {
        Err(refused())
    }
    async fn set_membership_if_absent(&self, _session_id: &str, _room_id: &str) -> Result<bool> {
        Err(refused())
    }
    async fn clear_membership(&self, _session_id: &str) -> Result<bool> {
        Err(refused())
    }
    async fn get_count(&self, _room_id: &str) -> Result<u64> {
        Err(refused())
    }
    async fn increment(&self, _room_id: &str) -> Result<u64> {
        Err(refused())
    }
    async fn decrement(&self, _room_id: &str) -> Result<u64> {
        Err(refused())
    }
    async fn delete_counter(&self, _room_id: &str) -> Result<()> {
        Err(refused())
    }
}

/// A memory store with two hooks: it can hold one session's membership
/// claim until released, and it can refuse `delete_room`.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryRoomStore,
    held_session: Option<String>,
    /// Notified when the held session's claim arrives.
    pub claim_reached: Notify,
    /// Notify to let the held claim through.
    pub claim_release: Notify,
    fail_room_deletes: bool,
}

impl ScriptedStore {
    pub fn holding_claim_of(session_id: &str) -> Arc<Self> {
        Arc::new(Self {
            held_session: Some(session_id.to_string()),
            ..Self::default()
        })
    }

    pub fn failing_room_deletes() -> Arc<Self> {
        Arc::new(Self {
            fail_room_deletes: true,
            ..Self::default()
        })
    }
}

#[async_trait]
impl RoomStore for ScriptedStore {
    async fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        self.inner.get_room(room_id).await
    }
    async fn put_room(&self, room: &Room) -> Result<()> {
        self.inner.put_room(room).await
    }
    async fn delete_room(&self, room_id: &str) -> Result<()> {
        if self.fail_room_deletes {
            return Err(refused());
        }
        self.inner.delete_room(room_id).await
    }
    async fn list_room_ids(&self) -> Result<HashSet<RoomId>> {
        self.inner.list_room_ids().await
    }
    async fn get_membership(&self, session_id: &str) -> Result<Option<RoomId>> {
        self.inner.get_membership(session_id).await
    }
    async fn set_membership(&self, session_id: &str, room_id: &str) -> Result<()> {
        self.inner.set_membership(session_id, room_id).await
    }
    async fn set_membership_if_absent(&self, session_id: &str, room_id: &str) -> Result<bool> {
        if self.held_session.as_deref() == Some(session_id) {
            self.claim_reached.notify_one();
            self.claim_release.notified().await;
        }
        self.inner.set_membership_if_absent(session_id, room_id).await
    }
    async fn clear_membership(&self, session_id: &str) -> Result<bool> {
        self.inner.clear_membership(session_id).await
    }
    async fn get_count(&self, room_id: &str) -> Result<u64> {
        self.inner.get_count(room_id).await
    }
    async fn increment(&self, room_id: &str) -> Result<u64> {
        self.inner.increment(room_id).await
    }
    async fn decrement(&self, room_id: &str) -> Result<u64> {
        self.inner.decrement(room_id).await
    }
    async fn delete_counter(&self, room_id: &str) -> Result<()> {
        self.inner.delete_counter(room_id).await
    }
}

/// A bus that refuses every call.
pub struct DownBus;

#[async_trait]
impl MessageBus for DownBus {
    async fn subscribe(&self, _topic: &str) -> Result<BusStream> {
        Err(ChatError::BusUnavailable("connection refused".into()))
    }

    async fn publish(&self, _topic: &str, _payload: String) -> Result<()> {
        Err(ChatError::BusUnavailable("connection refused".into()))
    }
}

/// Counts subscribe calls reaching the underlying local bus.
pub struct CountingBus {
    pub inner: LocalBus,
    pub subscribes: AtomicUsize,
}

impl CountingBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalBus::default(),
            subscribes: AtomicUsize::new(0),
        })
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageBus for CountingBus {
    async fn subscribe(&self, topic: &str) -> Result<BusStream> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribe(topic).await
    }

    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.inner.publish(topic, payload).await
    }
}

/// Forwards delivered messages into a channel.
pub struct Inbox(mpsc::UnboundedSender<ChatMessage>);

impl MessageHandler for Inbox {
    fn on_message(&self, _room_id: &str, message: &ChatMessage) {
        let _ = self.0.send(message.clone());
    }
}

pub fn inbox() -> (Arc<Inbox>, mpsc::UnboundedReceiver<ChatMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Inbox(tx)), rx)
}

pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<ChatMessage>) -> ChatMessage {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("handler channel closed")
}

pub fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(i64::from(n))
}

pub fn summary(content_id: u64, created_date: DateTime<Utc>) -> ContentSummary {
    ContentSummary {
        content_id,
        title: format!("post {content_id}"),
        owner: Owner {
            member_id: content_id * 10,
            nickname: format!("member{content_id}"),
        },
        tags: vec!["daily".into()],
        created_date,
        popularity_date: None,
    }
}
