//! Second-stage reranking
//!
//! A reranker re-scores the fused top candidates against the query. The
//! shipped implementation adds a non-negative term-overlap bonus on top
//! of the fusion score, so reranked scores never fall below the fused
//! ones and the ordering stays deterministic.

use newsloom_core::text::{stem, tokenize};
use newsloom_core::Document;
use tracing::debug;

use crate::fusion::sort_documents;

/// Second-stage scorer over fused candidates
pub trait Reranker: Send + Sync {
    /// Re-score `docs` against `query` in place; callers resort after
    fn rescore(&self, query: &str, docs: &mut [Document]);

    /// Identifier for logs
    fn name(&self) -> &'static str;
}

/// Stemmed term-overlap reranker
///
/// Bonus = overlap fraction of stemmed query terms found in the
/// document, scaled by `weight`.
#[derive(Debug, Clone)]
pub struct TermOverlapReranker {
    weight: f64,
}

impl TermOverlapReranker {
    /// Reranker with the given bonus weight
    #[must_use]
    pub const fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for TermOverlapReranker {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl Reranker for TermOverlapReranker {
    fn rescore(&self, query: &str, docs: &mut [Document]) {
        let query_stems: Vec<String> = tokenize(query).iter().map(|t| stem(t)).collect();
        if query_stems.is_empty() {
            return;
        }
        for doc in docs.iter_mut() {
            let text = format!("{} {}", doc.title, doc.snippet);
            let doc_stems: Vec<String> = tokenize(&text).iter().map(|t| stem(t)).collect();
            let hits = query_stems
                .iter()
                .filter(|qs| doc_stems.contains(qs))
                .count();
            #[allow(clippy::cast_precision_loss)]
            let overlap = hits as f64 / query_stems.len() as f64;
            doc.score += overlap * self.weight;
        }
        debug!(query, docs = docs.len(), "rerank rescored candidates");
    }

    fn name(&self) -> &'static str {
        "term_overlap"
    }
}

/// Apply a reranker and restore deterministic ordering
pub fn apply_rerank(reranker: &dyn Reranker, query: &str, docs: &mut Vec<Document>) {
    reranker.rescore(query, docs.as_mut_slice());
    sort_documents(docs);
}
