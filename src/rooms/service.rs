//! Chat service
//!
//! The call surface transport adapters use. Each store or bus call made
//! here is bounded by `op_timeout` so one stalled dependency cannot pin a
//! connection handler; expiry surfaces as `ChatError::Timeout`.
//!
//! `enter`/`exit` are the connection-level operations: `enter` subscribes
//! the session's handler before acknowledging the join, and `exit` releases
//! membership and subscriptions together, which is what a disconnect does.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::content::ContentCatalog;
use crate::hub::{BroadcastHub, ChatMessage, MessageHandler, MessageKind};
use crate::presence::{Presence, PresenceTracker};
use crate::store::{ContentId, RoomStore, room_id_for};
use crate::utils::{ChatError, Result};

use super::{RoomDirectory, RoomLifecycleManager, RoomPage};

#[derive(Clone)]
pub struct ChatService {
    presence: PresenceTracker,
    lifecycle: RoomLifecycleManager,
    directory: RoomDirectory,
    hub: Arc<BroadcastHub>,
    op_timeout: Duration,
    default_page_size: usize,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn RoomStore>,
        hub: Arc<BroadcastHub>,
        content: Arc<dyn ContentCatalog>,
    ) -> Self {
        Self {
            presence: PresenceTracker::new(store.clone()),
            lifecycle: RoomLifecycleManager::new(store.clone(), hub.clone(), content.clone()),
            directory: RoomDirectory::new(store, content),
            hub,
            op_timeout: Duration::from_secs(3),
            default_page_size: 10,
        }
    }

    /// Applies the store timeout, close grace window and page size from
    /// `settings`.
    pub fn configure(mut self, settings: &Settings) -> Self {
        self.op_timeout = settings.store.op_timeout();
        self.default_page_size = settings.rooms.default_page_size.max(1);
        self.lifecycle = self
            .lifecycle
            .with_close_grace(settings.rooms.close_grace());
        self
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.lifecycle = self.lifecycle.with_close_grace(grace);
        self
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn lifecycle(&self) -> &RoomLifecycleManager {
        &self.lifecycle
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.op_timeout, call)
            .await
            .unwrap_or_else(|_| Err(ChatError::Timeout(self.op_timeout)))
    }

    /// Joins the session to the chat of `content_id`, creating the room on
    /// first use.
    pub async fn join(&self, session_id: &str, content_id: ContentId) -> Result<Presence> {
        let room_id = room_id_for(content_id);
        let _gate = self.lifecycle.admit(&room_id).await;

        self.bounded(self.lifecycle.ensure_room(content_id)).await?;
        let occupancy = self.bounded(self.presence.join(session_id, &room_id)).await?;
        self.confirm_room(content_id).await;

        Ok(Presence { room_id, occupancy })
    }

    /// Removes the session from its room, releasing the room once empty.
    /// `None` when the session was in no room.
    ///
    /// A failed release does not fail the leave: the membership is already
    /// gone, and the room stays until the next release or an explicit close.
    pub async fn leave(&self, session_id: &str) -> Result<Option<Presence>> {
        let left = self.bounded(self.presence.leave(session_id)).await?;

        if let Some(presence) = &left {
            if presence.occupancy == 0 {
                match self
                    .bounded(self.lifecycle.release_if_empty(&presence.room_id))
                    .await
                {
                    Ok(outcome) => {
                        tracing::debug!(room = %presence.room_id, ?outcome, "Released empty room");
                    }
                    Err(e) => tracing::warn!(
                        room = %presence.room_id,
                        error = %e,
                        "Failed to release empty room"
                    ),
                }
            }
        }

        Ok(left)
    }

    pub async fn list_rooms(&self, page_number: usize, page_size: usize) -> Result<RoomPage> {
        self.bounded(self.directory.list(page_number, page_size))
            .await
    }

    /// Publishes `payload` to the session's current room.
    pub async fn send_message(&self, session_id: &str, payload: &str) -> Result<ChatMessage> {
        let room_id = self
            .bounded(self.presence.room_of(session_id))
            .await?
            .ok_or_else(|| ChatError::NotInRoom(session_id.to_string()))?;

        let message = ChatMessage::talk(&room_id, session_id, payload);
        self.bounded(self.hub.publish(&message)).await?;
        Ok(message)
    }

    /// Joins and subscribes `handler` (registered under the session id) in
    /// one step. The handler is subscribed before the join is acknowledged;
    /// if the join fails the subscription is rolled back.
    pub async fn enter(
        &self,
        session_id: &str,
        content_id: ContentId,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Presence> {
        let room_id = room_id_for(content_id);
        let gate = self.lifecycle.admit(&room_id).await;

        self.bounded(self.lifecycle.ensure_room(content_id)).await?;
        if let Err(e) = self
            .bounded(self.hub.subscribe(&room_id, session_id, handler))
            .await
        {
            drop(gate);
            self.abandon(&room_id).await;
            return Err(e);
        }

        let occupancy = match self.bounded(self.presence.join(session_id, &room_id)).await {
            Ok(occupancy) => occupancy,
            Err(e) => {
                self.hub.unsubscribe(&room_id, session_id).await;
                drop(gate);
                self.abandon(&room_id).await;
                return Err(e);
            }
        };
        self.confirm_room(content_id).await;
        drop(gate);

        self.notify(&room_id, session_id, MessageKind::Enter).await;
        Ok(Presence { room_id, occupancy })
    }

    /// Drops the session's handler from every room, then leaves the current
    /// room. Subscriptions are released even when the leave itself fails.
    pub async fn exit(&self, session_id: &str) -> Result<Option<Presence>> {
        self.hub.cleanup_handler(session_id).await;
        let left = self.leave(session_id).await;

        if let Ok(Some(presence)) = &left {
            if presence.occupancy > 0 {
                self.notify(&presence.room_id, session_id, MessageKind::Leave)
                    .await;
            }
        }

        left
    }

    /// Whether the content item has an active chat room.
    pub async fn is_chat_active(&self, content_id: ContentId) -> Result<bool> {
        self.bounded(self.lifecycle.is_active(content_id)).await
    }

    pub async fn occupancy(&self, room_id: &str) -> Result<u64> {
        self.bounded(self.presence.occupancy(room_id)).await
    }

    /// Administrative close. Idempotent.
    pub async fn close_room(&self, room_id: &str) -> Result<()> {
        self.bounded(self.lifecycle.close_room(room_id)).await
    }

    /// Another process may close the room between `ensure_room` and the
    /// join being counted; put the room record back if so.
    async fn confirm_room(&self, content_id: ContentId) {
        if let Err(e) = self.bounded(self.lifecycle.ensure_room(content_id)).await {
            tracing::warn!(content = content_id, error = %e, "Failed to confirm room after join");
        }
    }

    /// Closes a room a failed `enter` may have left empty.
    async fn abandon(&self, room_id: &str) {
        if let Err(e) = self.bounded(self.lifecycle.release_if_empty(room_id)).await {
            tracing::warn!(room = room_id, error = %e, "Release after failed enter failed");
        }
    }

    /// Enter/leave notices are best effort: the membership change already
    /// happened, so a failed publish is only logged.
    async fn notify(&self, room_id: &str, session_id: &str, kind: MessageKind) {
        let notice = ChatMessage::new(room_id, session_id, kind, "");
        if let Err(e) = self.bounded(self.hub.publish(&notice)).await {
            tracing::warn!(
                room = room_id,
                session = session_id,
                error = %e,
                "Failed to publish room notice"
            );
        }
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("op_timeout", &self.op_timeout)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}
