//! Memory store contract
//!
//! One trait per backing store. Writes go through transactions in the
//! Postgres backend; reads may use snapshot isolation. `cleanup_expired`
//! is idempotent and safe to run alongside reads.

use async_trait::async_trait;
use newsloom_core::Result;
use uuid::Uuid;

use crate::types::{MemoryKind, MemoryRecord};

/// Payload for storing a new memory
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub kind: MemoryKind,
    pub content: String,
    /// Importance in [0, 1]
    pub importance: f64,
    pub ttl_days: u32,
    pub user_id: Option<String>,
    pub refs: Vec<String>,
    pub tags: Vec<String>,
}

impl NewMemory {
    /// Semantic memory with library defaults
    #[must_use]
    pub fn semantic(content: impl Into<String>) -> Self {
        Self {
            kind: MemoryKind::Semantic,
            content: content.into(),
            importance: 0.5,
            ttl_days: 180,
            user_id: None,
            refs: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Episodic memory with library defaults
    #[must_use]
    pub fn episodic(content: impl Into<String>) -> Self {
        Self {
            kind: MemoryKind::Episodic,
            content: content.into(),
            importance: 0.5,
            ttl_days: 90,
            user_id: None,
            refs: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Scope to a user
    #[must_use]
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Override importance
    #[must_use]
    pub const fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    /// Override TTL
    #[must_use]
    pub const fn with_ttl_days(mut self, ttl_days: u32) -> Self {
        self.ttl_days = ttl_days;
        self
    }
}

/// A recall match
#[derive(Debug, Clone, PartialEq)]
pub struct RecallHit {
    pub record: MemoryRecord,
    /// Cosine similarity to the query, in [0, 1] for unit vectors
    pub similarity: f64,
}

/// Persistent memory store
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Embed and persist a new record
    ///
    /// Computes `expires_at = created_at + ttl_days` and unit-normalizes
    /// the embedding before insert.
    async fn store(&self, memory: NewMemory) -> Result<MemoryRecord>;

    /// Semantic search over active records
    ///
    /// Results are sorted by similarity descending and filtered to
    /// `similarity ≥ min_similarity`. When `user_id` is given, only
    /// records scoped to that user (or unscoped) are considered.
    /// Matching records get their access counters bumped.
    async fn recall(
        &self,
        query: &str,
        user_id: Option<&str>,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RecallHit>>;

    /// Fetch one record regardless of lifecycle state
    async fn get_by_id(&self, id: Uuid) -> Result<Option<MemoryRecord>>;

    /// Soft-delete one record; returns whether it existed and was live
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Soft-delete every expired record; returns how many transitioned
    async fn cleanup_expired(&self) -> Result<u64>;
}
