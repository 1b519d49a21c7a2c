//! Hybrid retriever
//!
//! The four-step retrieval algorithm shared by every command: pre-filter
//! by window/language/sources, run lexical and vector search in
//! parallel, fuse with RRF, then optionally rerank, dedup, and truncate.
//! Results are deterministic for identical inputs over an unchanged
//! corpus.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use newsloom_core::types::{LangPref, Window};
use newsloom_core::{Document, Result};
use tracing::{debug, info};

use crate::cache::RetrievalCache;
use crate::fusion::{dedup_by_article, reciprocal_rank_fusion};
use crate::rerank::{apply_rerank, Reranker};
use crate::store::{DocumentIndex, SearchFilter};

/// Candidates taken from each sub-index before fusion
const CANDIDATES_PER_INDEX: usize = 30;
/// Candidates surviving fusion into the rerank stage
const FUSED_CANDIDATES: usize = 30;
/// Allowed final result size
pub const K_FINAL_MIN: usize = 5;
pub const K_FINAL_MAX: usize = 10;

/// One retrieval request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalParams {
    pub query: String,
    pub window: Window,
    pub lang: LangPref,
    /// Domain allow-list; `None` skips the filter
    pub sources: Option<Vec<String>>,
    /// Clamped into `[5, 10]`
    pub k_final: usize,
    pub use_rerank: bool,
}

impl RetrievalParams {
    /// Request with library defaults for the optional knobs
    #[must_use]
    pub fn new(query: impl Into<String>, window: Window) -> Self {
        Self {
            query: query.into(),
            window,
            lang: LangPref::Auto,
            sources: None,
            k_final: 6,
            use_rerank: true,
        }
    }

    fn cache_key(&self) -> String {
        format!(
            "{}|{}|{:?}|{:?}|{}|{}",
            self.query, self.window, self.lang, self.sources, self.k_final, self.use_rerank
        )
    }

    fn filter(&self) -> SearchFilter {
        let now = Utc::now();
        SearchFilter {
            since: Some((now - self.window.duration()).date_naive()),
            until: None,
            language: self.lang.filter(),
            sources: self.sources.clone(),
        }
    }
}

/// Hybrid full-text + vector retriever
pub struct Retriever {
    index: Arc<dyn DocumentIndex>,
    reranker: Option<Arc<dyn Reranker>>,
    cache: RetrievalCache,
}

impl Retriever {
    /// Build a retriever over a document index
    #[must_use]
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        reranker: Option<Arc<dyn Reranker>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            index,
            reranker,
            cache: RetrievalCache::new(cache_ttl),
        }
    }

    /// Run one retrieval
    ///
    /// Returns at most `k_final` documents with no duplicate article id,
    /// ordered deterministically.
    ///
    /// # Errors
    /// Propagates backend failures; an empty result is not an error.
    pub async fn retrieve(&self, params: &RetrievalParams) -> Result<Vec<Document>> {
        let k_final = params.k_final.clamp(K_FINAL_MIN, K_FINAL_MAX);
        let key = params.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let filter = params.filter();
        let (lexical, vector) = tokio::join!(
            self.index
                .lexical_top(&params.query, &filter, CANDIDATES_PER_INDEX),
            self.index
                .vector_top(&params.query, &filter, CANDIDATES_PER_INDEX),
        );
        let lexical = lexical?;
        let vector = vector?;
        debug!(
            lexical = lexical.len(),
            vector = vector.len(),
            window = %params.window,
            "index queries finished"
        );

        let mut fused = reciprocal_rank_fusion(&[lexical, vector]);
        fused.truncate(FUSED_CANDIDATES);

        if params.use_rerank {
            if let Some(reranker) = &self.reranker {
                apply_rerank(reranker.as_ref(), &params.query, &mut fused);
                debug!(reranker = reranker.name(), "rerank applied");
            }
        }

        let mut result = dedup_by_article(fused);
        result.truncate(k_final);

        info!(
            query = %params.query,
            window = %params.window,
            returned = result.len(),
            k_final,
            "retrieval complete"
        );
        self.cache.put(key, result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rerank::TermOverlapReranker;
    use crate::store::{InMemoryIndex, StoredArticle};
    use newsloom_core::types::Language;

    fn seeded_index(n: usize) -> Arc<InMemoryIndex> {
        let index = InMemoryIndex::new(256);
        for i in 0..n {
            index.insert(StoredArticle {
                article_id: format!("a{i:03}"),
                title: format!("AI adoption report {i}"),
                url: Some(format!("https://news.example/{i}")),
                published_date: Utc::now().date_naive() - chrono::Duration::days((i % 3) as i64),
                language: Language::En,
                content: format!("ai adoption enterprise deployment study number {i}"),
                source_domain: Some("news.example".to_string()),
            });
        }
        Arc::new(index)
    }

    fn retriever(index: Arc<InMemoryIndex>) -> Retriever {
        Retriever::new(
            index,
            Some(Arc::new(TermOverlapReranker::default())),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_size_bound_and_no_duplicates() {
        let r = retriever(seeded_index(40));
        let mut params = RetrievalParams::new("ai adoption", Window::W1);
        params.k_final = 7;
        let docs = r.retrieve(&params).await.unwrap();
        assert!(docs.len() <= 7);
        let mut ids: Vec<_> = docs.iter().filter_map(|d| d.article_id.clone()).collect();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[tokio::test]
    async fn test_idempotent_over_unchanged_corpus() {
        let index = seeded_index(25);
        let r = retriever(index);
        let params = RetrievalParams::new("ai adoption", Window::W1);
        let one = r.retrieve(&params).await.unwrap();
        let two = r.retrieve(&params).await.unwrap();
        assert_eq!(one, two);
    }

    #[tokio::test]
    async fn test_k_final_clamped() {
        let r = retriever(seeded_index(40));
        let mut params = RetrievalParams::new("ai adoption", Window::W1);
        params.k_final = 50;
        let docs = r.retrieve(&params).await.unwrap();
        assert!(docs.len() <= K_FINAL_MAX);
    }

    #[tokio::test]
    async fn test_rerank_monotonic_mean_score() {
        let index = seeded_index(30);
        let r = retriever(index.clone());
        let mut with = RetrievalParams::new("ai adoption", Window::W1);
        with.use_rerank = true;
        let mut without = with.clone();
        without.use_rerank = false;
        let mean = |docs: &[Document]| {
            docs.iter().map(|d| d.score).sum::<f64>() / docs.len().max(1) as f64
        };
        let reranked = r.retrieve(&with).await.unwrap();
        let plain = r.retrieve(&without).await.unwrap();
        assert!(mean(&reranked) >= mean(&plain) - 1e-12);
    }

    #[tokio::test]
    async fn test_missing_vector_index_falls_back_to_lexical() {
        let index = InMemoryIndex::new(256).without_vector();
        index.insert(StoredArticle {
            article_id: "only".to_string(),
            title: "AI news".to_string(),
            url: None,
            published_date: Utc::now().date_naive(),
            language: Language::En,
            content: "ai adoption".to_string(),
            source_domain: None,
        });
        let r = retriever(Arc::new(index));
        let docs = r
            .retrieve(&RetrievalParams::new("ai", Window::H24))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_returns_snapshot() {
        let index = seeded_index(10);
        let r = Retriever::new(index.clone(), None, Duration::from_secs(300));
        let params = RetrievalParams::new("ai adoption", Window::W1);
        let first = r.retrieve(&params).await.unwrap();
        // grow the corpus; the cached snapshot must win within the TTL
        index.insert(StoredArticle {
            article_id: "new".to_string(),
            title: "AI adoption surge".to_string(),
            url: None,
            published_date: Utc::now().date_naive(),
            language: Language::En,
            content: "ai adoption".to_string(),
            source_domain: None,
        });
        let second = r.retrieve(&params).await.unwrap();
        assert_eq!(first, second);
    }
}
