//! Postgres memory store backend
//!
//! Schema: `memory_records` with a pgvector embedding column, an ANN
//! index for cosine recall, a B-tree on `(user_id, type, expires_at)`,
//! and a GIN index on `tags`. A trigger keeps `expires_at` consistent
//! with `created_at + ttl_days` on insert and update.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use newsloom_core::embedding::{normalize, Embedder};
use newsloom_core::{NewsloomError, Result};
use pgvector::Vector;
use tokio_postgres::NoTls;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{MemoryStore, NewMemory, RecallHit};
use crate::types::{MemoryKind, MemoryRecord};

/// Schema migration, idempotent
///
/// `{dim}` is substituted with the configured embedding dimension.
const MIGRATION_SQL: &str = r"
CREATE EXTENSION IF NOT EXISTS vector;

CREATE TABLE IF NOT EXISTS memory_records (
    id           uuid PRIMARY KEY,
    type         varchar NOT NULL,
    content      text NOT NULL,
    embedding    vector({dim}) NOT NULL,
    importance   float8 NOT NULL,
    ttl_days     int NOT NULL,
    created_at   timestamptz NOT NULL DEFAULT now(),
    expires_at   timestamptz NOT NULL,
    accessed_at  timestamptz NOT NULL DEFAULT now(),
    access_count int NOT NULL DEFAULT 0,
    refs         text[] NOT NULL DEFAULT '{}',
    user_id      varchar,
    tags         text[] NOT NULL DEFAULT '{}',
    deleted_at   timestamptz
);

CREATE INDEX IF NOT EXISTS memory_records_embedding_idx
    ON memory_records USING ivfflat (embedding vector_cosine_ops) WITH (lists = 100);
CREATE INDEX IF NOT EXISTS memory_records_scope_idx
    ON memory_records (user_id, type, expires_at);
CREATE INDEX IF NOT EXISTS memory_records_tags_idx
    ON memory_records USING gin (tags);

CREATE OR REPLACE FUNCTION memory_records_set_expiry() RETURNS trigger AS $$
BEGIN
    NEW.expires_at := NEW.created_at + make_interval(days => NEW.ttl_days);
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS memory_records_expiry ON memory_records;
CREATE TRIGGER memory_records_expiry
    BEFORE INSERT OR UPDATE OF created_at, ttl_days ON memory_records
    FOR EACH ROW EXECUTE FUNCTION memory_records_set_expiry();
";

/// Postgres-backed memory store
pub struct PostgresMemoryStore {
    pool: Pool,
    embedder: Arc<dyn Embedder>,
}

impl PostgresMemoryStore {
    /// Connect a pooled store
    ///
    /// # Errors
    /// Returns a storage error when the pool cannot be created.
    pub fn connect(database_url: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let mut config = PoolConfig::new();
        config.url = Some(database_url.to_string());
        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| NewsloomError::storage(format!("pool creation failed: {e}")))?;
        Ok(Self { pool, embedder })
    }

    /// Apply the schema migration
    ///
    /// # Errors
    /// Returns a storage error when DDL fails.
    pub async fn run_migrations(&self) -> Result<()> {
        let client = self.client().await?;
        let sql = MIGRATION_SQL.replace("{dim}", &self.embedder.dim().to_string());
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| NewsloomError::storage(format!("migration failed: {e}")))?;
        info!(dim = self.embedder.dim(), "memory schema migrated");
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| NewsloomError::storage(format!("pool checkout failed: {e}")))
    }

    #[allow(clippy::cast_sign_loss)]
    fn row_to_record(row: &tokio_postgres::Row) -> Result<MemoryRecord> {
        let kind_raw: String = row.get("type");
        let kind = MemoryKind::parse(&kind_raw)
            .ok_or_else(|| NewsloomError::storage(format!("unknown memory type {kind_raw}")))?;
        let embedding: Vector = row.get("embedding");
        Ok(MemoryRecord {
            id: row.get("id"),
            kind,
            content: row.get("content"),
            embedding: embedding.to_vec(),
            importance: row.get("importance"),
            ttl_days: row.get::<_, i32>("ttl_days") as u32,
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            accessed_at: row.get("accessed_at"),
            access_count: row.get::<_, i32>("access_count") as u32,
            refs: row.get("refs"),
            user_id: row.get("user_id"),
            tags: row.get("tags"),
            deleted_at: row.get::<_, Option<DateTime<Utc>>>("deleted_at"),
        })
    }
}

#[async_trait]
impl MemoryStore for PostgresMemoryStore {
    async fn store(&self, memory: NewMemory) -> Result<MemoryRecord> {
        let mut embedding = self.embedder.embed(&memory.content).await?;
        normalize(&mut embedding);
        let id = Uuid::new_v4();
        let importance = memory.importance.clamp(0.0, 1.0);
        let ttl_days = i32::try_from(memory.ttl_days)
            .map_err(|_| NewsloomError::validation("ttl_days out of range"))?;

        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO memory_records \
                     (id, type, content, embedding, importance, ttl_days, expires_at, \
                      refs, user_id, tags) \
                 VALUES ($1, $2, $3, $4, $5, $6, now(), $7, $8, $9) \
                 RETURNING *",
                &[
                    &id,
                    &memory.kind.as_str(),
                    &memory.content,
                    &Vector::from(embedding),
                    &importance,
                    &ttl_days,
                    &memory.refs,
                    &memory.user_id,
                    &memory.tags,
                ],
            )
            .await
            .map_err(|e| NewsloomError::storage(format!("memory insert failed: {e}")))?;
        info!(id = %id, "memory stored");
        Self::row_to_record(&row)
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
        let vector = Vector::from(query_embedding);
        let limit = i64::try_from(top_k).unwrap_or(i64::MAX);

        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT *, (1 - (embedding <=> $1))::float8 AS similarity \
                 FROM memory_records \
                 WHERE deleted_at IS NULL \
                   AND expires_at > now() \
                   AND ($2::varchar IS NULL OR user_id IS NULL OR user_id = $2) \
                   AND (1 - (embedding <=> $1)) >= $3 \
                 ORDER BY embedding <=> $1 ASC, id ASC \
                 LIMIT $4",
                &[&vector, &user_id, &min_similarity, &limit],
            )
            .await
            .map_err(|e| NewsloomError::storage(format!("recall query failed: {e}")))?;

        let mut hits = Vec::with_capacity(rows.len());
        let mut returned_ids: Vec<Uuid> = Vec::with_capacity(rows.len());
        for row in &rows {
            let similarity: f64 = row.get("similarity");
            let record = Self::row_to_record(row)?;
            returned_ids.push(record.id);
            hits.push(RecallHit { record, similarity });
        }

        if !returned_ids.is_empty() {
            client
                .execute(
                    "UPDATE memory_records \
                     SET access_count = access_count + 1, accessed_at = now() \
                     WHERE id = ANY($1)",
                    &[&returned_ids],
                )
                .await
                .map_err(|e| NewsloomError::storage(format!("access bump failed: {e}")))?;
        }
        debug!(query, returned = hits.len(), "memory recall");
        Ok(hits)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<MemoryRecord>> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT * FROM memory_records WHERE id = $1", &[&id])
            .await
            .map_err(|e| NewsloomError::storage(format!("get query failed: {e}")))?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE memory_records SET deleted_at = now() \
                 WHERE id = $1 AND deleted_at IS NULL",
                &[&id],
            )
            .await
            .map_err(|e| NewsloomError::storage(format!("delete failed: {e}")))?;
        Ok(updated > 0)
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE memory_records SET deleted_at = now() \
                 WHERE expires_at < now() AND deleted_at IS NULL",
                &[],
            )
            .await
            .map_err(|e| NewsloomError::storage(format!("cleanup failed: {e}")))?;
        info!(count = updated, "expired memories cleaned up");
        Ok(updated)
    }
}
