//! In-memory store backend
//!
//! Backs tests and embedded runs. Shares the exact lifecycle semantics
//! of the Postgres backend: unit-normalized embeddings, soft deletes,
//! TTL expiry, user scoping, monotonic access counters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use newsloom_core::embedding::{cosine, normalize, Embedder};
use newsloom_core::Result;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{MemoryStore, NewMemory, RecallHit};
use crate::types::MemoryRecord;

/// Vector-indexed memory store held entirely in process memory
pub struct InMemoryMemoryStore {
    embedder: Arc<dyn Embedder>,
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryMemoryStore {
    /// Empty store over the given embedder
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Records currently held, any lifecycle state
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when the store holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn store(&self, memory: NewMemory) -> Result<MemoryRecord> {
        let mut embedding = self.embedder.embed(&memory.content).await?;
        normalize(&mut embedding);
        let now = Utc::now();
        let record = MemoryRecord {
            id: Uuid::new_v4(),
            kind: memory.kind,
            content: memory.content,
            embedding,
            importance: memory.importance.clamp(0.0, 1.0),
            ttl_days: memory.ttl_days,
            created_at: now,
            expires_at: MemoryRecord::expiry_for(now, memory.ttl_days),
            accessed_at: now,
            access_count: 0,
            refs: memory.refs,
            user_id: memory.user_id,
            tags: memory.tags,
            deleted_at: None,
        };
        info!(id = %record.id, kind = record.kind.as_str(), "memory stored");
        self.records.write().push(record.clone());
        Ok(record)
    }

    async fn recall(
        &self,
        query: &str,
        user_id: Option<&str>,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RecallHit>> {
        let mut query_embedding = self.embedder.embed(query).await?;
        normalize(&mut query_embedding);
        let now = Utc::now();

        let mut hits: Vec<(Uuid, f64)> = {
            let records = self.records.read();
            records
                .iter()
                .filter(|r| r.is_active(now))
                .filter(|r| match user_id {
                    Some(user) => r.user_id.as_deref().is_none_or(|owner| owner == user),
                    None => true,
                })
                .map(|r| (r.id, f64::from(cosine(&query_embedding, &r.embedding))))
                .filter(|(_, similarity)| *similarity >= min_similarity)
                .collect()
        };
        hits.sort_by(|(ida, sa), (idb, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ida.cmp(idb))
        });
        hits.truncate(top_k);

        // bump access counters for returned records
        let mut out = Vec::with_capacity(hits.len());
        let mut records = self.records.write();
        for (id, similarity) in hits {
            if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                record.access_count += 1;
                record.accessed_at = now;
                out.push(RecallHit {
                    record: record.clone(),
                    similarity,
                });
            }
        }
        debug!(query, returned = out.len(), "memory recall");
        Ok(out)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<MemoryRecord>> {
        Ok(self.records.read().iter().find(|r| r.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.write();
        match records
            .iter_mut()
            .find(|r| r.id == id && r.deleted_at.is_none())
        {
            Some(record) => {
                record.deleted_at = Some(Utc::now());
                debug!(id = %id, "memory soft-deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut count = 0u64;
        let mut records = self.records.write();
        for record in records.iter_mut() {
            if record.is_expired(now) {
                record.deleted_at = Some(now);
                count += 1;
            }
        }
        info!(count, "expired memories cleaned up");
        Ok(count)
    }
}
