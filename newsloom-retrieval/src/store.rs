//! Document index abstraction and the in-memory backend
//!
//! A backend answers two independent ranked queries — lexical and vector
//! — over a pre-filtered corpus slice. Backends report which of the two
//! indexes they actually have; the fusion layer treats a missing index
//! as an empty ranking.

use async_trait::async_trait;
use chrono::NaiveDate;
use newsloom_core::embedding::{cosine, HashEmbedder};
use newsloom_core::text::tokenize;
use newsloom_core::{Document, Language, Result};
use parking_lot::RwLock;
use tracing::debug;

/// Corpus pre-filter applied before either ranking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Inclusive lower bound on publication date
    pub since: Option<NaiveDate>,
    /// Inclusive upper bound on publication date
    pub until: Option<NaiveDate>,
    /// Skip the filter when `None` (auto)
    pub language: Option<Language>,
    /// Domain allow-list; skip when `None`
    pub sources: Option<Vec<String>>,
}

impl SearchFilter {
    fn matches(&self, article: &StoredArticle) -> bool {
        if let Some(since) = self.since {
            if article.published_date < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if article.published_date > until {
                return false;
            }
        }
        if let Some(lang) = self.language {
            if article.language != lang {
                return false;
            }
        }
        if let Some(sources) = &self.sources {
            match &article.source_domain {
                Some(domain) => {
                    if !sources.iter().any(|s| s == domain) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

/// Backend contract for ranked corpus queries
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Top documents by lexical relevance, best first
    async fn lexical_top(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// Top documents by vector similarity, best first
    async fn vector_top(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// Whether a lexical index exists
    fn has_lexical(&self) -> bool {
        true
    }

    /// Whether a vector index exists
    fn has_vector(&self) -> bool {
        true
    }
}

/// One article chunk as held by the in-memory index
#[derive(Debug, Clone)]
pub struct StoredArticle {
    pub article_id: String,
    pub title: String,
    pub url: Option<String>,
    pub published_date: NaiveDate,
    pub language: Language,
    pub content: String,
    pub source_domain: Option<String>,
}

impl StoredArticle {
    fn to_document(&self, score: f64) -> Document {
        Document::new(
            Some(self.article_id.clone()),
            self.title.clone(),
            self.url.clone(),
            Some(self.published_date),
            self.language.as_str(),
            score,
            self.content.clone(),
        )
    }
}

struct IndexedArticle {
    article: StoredArticle,
    tokens: Vec<String>,
    embedding: Vec<f32>,
}

/// In-memory document index
///
/// Lexical ranking is term-frequency overlap; vector ranking is cosine
/// over hashed embeddings computed at insert. Both are deterministic,
/// which the retriever's ordering guarantees rely on.
pub struct InMemoryIndex {
    embedder: HashEmbedder,
    articles: RwLock<Vec<IndexedArticle>>,
    lexical_enabled: bool,
    vector_enabled: bool,
}

impl InMemoryIndex {
    /// Empty index with both sub-indexes available
    #[must_use]
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedder: HashEmbedder::new(embedding_dim),
            articles: RwLock::new(Vec::new()),
            lexical_enabled: true,
            vector_enabled: true,
        }
    }

    /// Disable the vector index (exercises the lexical-only fallback)
    #[must_use]
    pub fn without_vector(mut self) -> Self {
        self.vector_enabled = false;
        self
    }

    /// Disable the lexical index (exercises the vector-only fallback)
    #[must_use]
    pub fn without_lexical(mut self) -> Self {
        self.lexical_enabled = false;
        self
    }

    /// Insert one article chunk
    pub fn insert(&self, article: StoredArticle) {
        let text = format!("{} {}", article.title, article.content);
        let entry = IndexedArticle {
            tokens: tokenize(&text),
            embedding: self.embedder.embed_sync(&text),
            article,
        };
        self.articles.write().push(entry);
    }

    /// Bulk insert
    pub fn insert_all(&self, articles: impl IntoIterator<Item = StoredArticle>) {
        for article in articles {
            self.insert(article);
        }
    }

    /// Number of indexed chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.articles.read().len()
    }

    /// True when the index holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.articles.read().is_empty()
    }

    fn ranked<F>(&self, filter: &SearchFilter, limit: usize, score_fn: F) -> Vec<Document>
    where
        F: Fn(&IndexedArticle) -> f64,
    {
        let articles = self.articles.read();
        let mut scored: Vec<(f64, &IndexedArticle)> = articles
            .iter()
            .filter(|entry| filter.matches(&entry.article))
            .map(|entry| (score_fn(entry), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        // stable order on equal scores: newest first, then id
        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.article.published_date.cmp(&a.article.published_date))
                .then_with(|| a.article.article_id.cmp(&b.article.article_id))
        });
        scored
            .into_iter()
            .take(limit)
            .map(|(score, entry)| entry.article.to_document(score))
            .collect()
    }
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    async fn lexical_top(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Document>> {
        if !self.lexical_enabled {
            return Ok(Vec::new());
        }
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        #[allow(clippy::cast_precision_loss)]
        let score_fn = |entry: &IndexedArticle| {
            let mut hits = 0usize;
            for qt in &query_tokens {
                hits += entry.tokens.iter().filter(|t| *t == qt).count();
            }
            if hits == 0 {
                return 0.0;
            }
            hits as f64 / (entry.tokens.len().max(1) as f64).sqrt()
        };
        let results = self.ranked(filter, limit, score_fn);
        debug!(query, results = results.len(), "lexical search");
        Ok(results)
    }

    async fn vector_top(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Document>> {
        if !self.vector_enabled {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed_sync(query);
        let results = self.ranked(filter, limit, |entry| {
            f64::from(cosine(&query_embedding, &entry.embedding))
        });
        debug!(query, results = results.len(), "vector search");
        Ok(results)
    }

    fn has_lexical(&self) -> bool {
        self.lexical_enabled
    }

    fn has_vector(&self) -> bool {
        self.vector_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(id: &str, days_ago: i64, lang: Language, text: &str) -> StoredArticle {
        StoredArticle {
            article_id: id.to_string(),
            title: format!("Article {id}"),
            url: Some(format!("https://news.example/{id}")),
            published_date: Utc::now().date_naive() - chrono::Duration::days(days_ago),
            language: lang,
            content: text.to_string(),
            source_domain: Some("news.example".to_string()),
        }
    }

    #[tokio::test]
    async fn test_lexical_ranks_by_term_frequency() {
        let index = InMemoryIndex::new(256);
        index.insert(article("a", 0, Language::En, "ai ai ai adoption"));
        index.insert(article("b", 0, Language::En, "ai mentioned once here"));
        index.insert(article("c", 0, Language::En, "nothing relevant at all"));
        let top = index
            .lexical_top("ai", &SearchFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].article_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_filter_by_language_and_date() {
        let index = InMemoryIndex::new(256);
        index.insert(article("en-new", 0, Language::En, "ai news"));
        index.insert(article("ru-new", 0, Language::Ru, "ai news"));
        index.insert(article("en-old", 30, Language::En, "ai news"));
        let filter = SearchFilter {
            since: Some(Utc::now().date_naive() - chrono::Duration::days(7)),
            language: Some(Language::En),
            ..SearchFilter::default()
        };
        let top = index.lexical_top("ai", &filter, 10).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].article_id.as_deref(), Some("en-new"));
    }

    #[tokio::test]
    async fn test_source_filter() {
        let index = InMemoryIndex::new(256);
        let mut other = article("x", 0, Language::En, "ai news");
        other.source_domain = Some("rival.example".to_string());
        index.insert(article("kept", 0, Language::En, "ai news"));
        index.insert(other);
        let filter = SearchFilter {
            sources: Some(vec!["news.example".to_string()]),
            ..SearchFilter::default()
        };
        let top = index.lexical_top("ai", &filter, 10).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].article_id.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_disabled_vector_returns_empty() {
        let index = InMemoryIndex::new(256).without_vector();
        index.insert(article("a", 0, Language::En, "ai adoption"));
        assert!(!index.has_vector());
        let top = index
            .vector_top("ai", &SearchFilter::default(), 10)
            .await
            .unwrap();
        assert!(top.is_empty());
    }
}
