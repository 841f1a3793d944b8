//! Room directory
//!
//! Lists active rooms joined with their content summaries, newest content
//! first. Every call scans all room ids and sorts them, which is fine for
//! small and moderate room counts; a sorted index would be needed beyond
//! that.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{ContentCatalog, Owner};
use crate::store::{ContentId, RoomId, RoomStore};
use crate::utils::{ChatError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub content_id: ContentId,
    pub title: String,
    pub owner: Owner,
    pub tags: Vec<String>,
    pub created_date: DateTime<Utc>,
    pub popularity_date: Option<DateTime<Utc>>,
    pub room_created_at: DateTime<Utc>,
    pub occupancy: u64,
}

/// One page of the room listing. `page_number` is 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPage {
    pub rooms: Vec<RoomSummary>,
    pub page_number: usize,
    pub page_size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
    pub is_last: bool,
}

impl RoomPage {
    fn slice(all: Vec<RoomSummary>, page_number: usize, page_size: usize) -> Self {
        let total_elements = all.len();
        let total_pages = total_elements.div_ceil(page_size);
        let rooms = all
            .into_iter()
            .skip(page_number.saturating_mul(page_size))
            .take(page_size)
            .collect();

        Self {
            rooms,
            page_number,
            page_size,
            total_elements,
            total_pages,
            is_last: page_number.saturating_add(1) >= total_pages,
        }
    }
}

#[derive(Clone)]
pub struct RoomDirectory {
    store: Arc<dyn RoomStore>,
    content: Arc<dyn ContentCatalog>,
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn RoomStore>, content: Arc<dyn ContentCatalog>) -> Self {
        Self { store, content }
    }

    /// Returns page `page_number` of the active rooms. A room whose content
    /// item is gone fails the whole listing with `ContentNotFound`.
    pub async fn list(&self, page_number: usize, page_size: usize) -> Result<RoomPage> {
        if page_size == 0 {
            return Err(ChatError::InvalidPage("page size must be positive".into()));
        }

        let room_ids = self.store.list_room_ids().await?;
        let mut summaries = Vec::with_capacity(room_ids.len());

        for room_id in room_ids {
            // closed between the scan and this read
            let Some(room) = self.store.get_room(&room_id).await? else {
                continue;
            };
            let content = self
                .content
                .summary(room.content_id)
                .await?
                .ok_or(ChatError::ContentNotFound(room.content_id))?;
            let occupancy = self.store.get_count(&room_id).await?;

            summaries.push(RoomSummary {
                room_id,
                content_id: room.content_id,
                title: content.title,
                owner: content.owner,
                tags: content.tags,
                created_date: content.created_date,
                popularity_date: content.popularity_date,
                room_created_at: room.created_at,
                occupancy,
            });
        }

        summaries.sort_by(|a, b| {
            b.created_date
                .cmp(&a.created_date)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });

        let page = RoomPage::slice(summaries, page_number, page_size);
        tracing::debug!(
            page = page_number,
            size = page_size,
            total = page.total_elements,
            "Listed rooms"
        );
        Ok(page)
    }
}

impl std::fmt::Debug for RoomDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomDirectory").finish_non_exhaustive()
    }
}
