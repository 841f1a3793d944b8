//! Content catalog
//!
//! The chat core only needs two things from the content (post) service:
//! whether an item exists, and a summary of it for room listings. This
//! module defines that contract and an in-memory catalog, optionally seeded
//! from a JSON file, for tests and standalone runs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::ContentId;
use crate::utils::{ChatError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub member_id: u64,
    pub nickname: String,
}

/// What a room listing shows about the content item behind a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub content_id: ContentId,
    pub title: String,
    pub owner: Owner,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_date: DateTime<Utc>,
    pub popularity_date: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ContentCatalog: Send + Sync {
    async fn exists(&self, content_id: ContentId) -> Result<bool>;

    async fn summary(&self, content_id: ContentId) -> Result<Option<ContentSummary>>;
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: RwLock<HashMap<ContentId, ContentSummary>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of `ContentSummary` values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ChatError::CatalogUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let items: Vec<ContentSummary> = serde_json::from_str(&raw)?;

        let catalog = Self::new();
        for item in items {
            catalog.insert(item);
        }
        tracing::info!(path = %path.display(), items = catalog.len(), "Loaded content catalog");
        Ok(catalog)
    }

    pub fn insert(&self, summary: ContentSummary) {
        self.write().insert(summary.content_id, summary);
    }

    pub fn remove(&self, content_id: ContentId) -> Option<ContentSummary> {
        self.write().remove(&content_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ContentId, ContentSummary>> {
        self.items.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ContentId, ContentSummary>> {
        self.items.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ContentCatalog for MemoryCatalog {
    async fn exists(&self, content_id: ContentId) -> Result<bool> {
        Ok(self.read().contains_key(&content_id))
    }

    async fn summary(&self, content_id: ContentId) -> Result<Option<ContentSummary>> {
        Ok(self.read().get(&content_id).cloned())
    }
}
