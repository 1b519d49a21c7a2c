//! Postgres document index
//!
//! Production backend over the ingestion pipeline's `article_chunks`
//! table: full-text ranking via `tsvector` and vector ranking via a
//! pgvector cosine index. Both queries push the window/language/source
//! pre-filter down into SQL.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use newsloom_core::embedding::Embedder;
use newsloom_core::{Document, NewsloomError, Result};
use pgvector::Vector;
use tokio_postgres::NoTls;
use tracing::{debug, instrument};

use crate::store::{DocumentIndex, SearchFilter};

/// Postgres-backed document index
pub struct PostgresIndex {
    pool: Pool,
    embedder: Arc<dyn Embedder>,
}

impl PostgresIndex {
    /// Connect a pooled index
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

    fn filter_clauses(filter: &SearchFilter, args_offset: usize) -> (String, Vec<FilterArg>) {
        let mut clauses = String::new();
        let mut args: Vec<FilterArg> = Vec::new();
        let mut n = args_offset;
        if let Some(since) = filter.since {
            n += 1;
            clauses.push_str(&format!(" AND published_date >= ${n}"));
            args.push(FilterArg::Date(since));
        }
        if let Some(until) = filter.until {
            n += 1;
            clauses.push_str(&format!(" AND published_date <= ${n}"));
            args.push(FilterArg::Date(until));
        }
        if let Some(lang) = filter.language {
            n += 1;
            clauses.push_str(&format!(" AND language = ${n}"));
            args.push(FilterArg::Text(lang.as_str().to_string()));
        }
        if let Some(sources) = &filter.sources {
            n += 1;
            clauses.push_str(&format!(" AND source_domain = ANY(${n})"));
            args.push(FilterArg::TextList(sources.clone()));
        }
        (clauses, args)
    }

    fn row_to_document(row: &tokio_postgres::Row) -> Document {
        Document::new(
            row.get::<_, Option<String>>("article_id"),
            row.get::<_, String>("title"),
            row.get::<_, Option<String>>("url"),
            row.get::<_, Option<NaiveDate>>("published_date"),
            &row.get::<_, String>("language"),
            row.get::<_, f64>("rank_score"),
            row.get::<_, String>("snippet"),
        )
    }
}

enum FilterArg {
    Date(NaiveDate),
    Text(String),
    TextList(Vec<String>),
}

impl FilterArg {
    fn as_sql(&self) -> &(dyn tokio_postgres::types::ToSql + Sync) {
        match self {
            Self::Date(v) => v,
            Self::Text(v) => v,
            Self::TextList(v) => v,
        }
    }
}

#[async_trait]
impl DocumentIndex for PostgresIndex {
    #[instrument(skip(self, filter))]
    async fn lexical_top(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| NewsloomError::storage(format!("pool checkout failed: {e}")))?;
        let (clauses, args) = Self::filter_clauses(filter, 1);
        let sql = format!(
            "SELECT article_id, title, url, published_date, language, \
                    LEFT(content, 240) AS snippet, \
                    ts_rank(text_search, websearch_to_tsquery('simple', $1))::float8 AS rank_score \
             FROM article_chunks \
             WHERE text_search @@ websearch_to_tsquery('simple', $1){clauses} \
             ORDER BY rank_score DESC, published_date DESC, article_id ASC \
             LIMIT {limit}"
        );
        let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = vec![&query];
        params.extend(args.iter().map(FilterArg::as_sql));
        let rows = client
            .query(sql.as_str(), &params)
            .await
            .map_err(|e| NewsloomError::storage(format!("lexical query failed: {e}")))?;
        debug!(rows = rows.len(), "lexical index answered");
        Ok(rows.iter().map(Self::row_to_document).collect())
    }

    #[instrument(skip(self, filter))]
    async fn vector_top(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let embedding = Vector::from(self.embedder.embed(query).await?);
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| NewsloomError::storage(format!("pool checkout failed: {e}")))?;
        let (clauses, args) = Self::filter_clauses(filter, 1);
        let sql = format!(
            "SELECT article_id, title, url, published_date, language, \
                    LEFT(content, 240) AS snippet, \
                    (1 - (embedding <=> $1))::float8 AS rank_score \
             FROM article_chunks \
             WHERE embedding IS NOT NULL{clauses} \
             ORDER BY embedding <=> $1 ASC, published_date DESC, article_id ASC \
             LIMIT {limit}"
        );
        let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = vec![&embedding];
        params.extend(args.iter().map(FilterArg::as_sql));
        let rows = client
            .query(sql.as_str(), &params)
            .await
            .map_err(|e| NewsloomError::storage(format!("vector query failed: {e}")))?;
        debug!(rows = rows.len(), "vector index answered");
        Ok(rows.iter().map(Self::row_to_document).collect())
    }
}
