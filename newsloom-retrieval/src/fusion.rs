//! Reciprocal-rank fusion and deterministic ordering
//!
//! Merges independently ranked lists without needing calibrated scores:
//! `rrf(d) = Σ 1 / (k + rank_i(d))` with `k = 60`. Documents missing
//! from one list simply contribute nothing for it (rank +∞). Ordering is
//! fully deterministic: score, then recency, then shorter snippet, then
//! lexicographic article id.

use std::cmp::Ordering;
use std::collections::HashMap;

use newsloom_core::Document;
use tracing::trace;

/// RRF smoothing constant
pub const K_RRF: f64 = 60.0;

/// Fuse ranked lists into one RRF-scored list, best first
///
/// Each input list must be ordered best-first; ranks are 1-based. A
/// document appearing in several lists accumulates one term per list.
/// Identity is `article_id` when present, otherwise title+date.
#[must_use]
pub fn reciprocal_rank_fusion(lists: &[Vec<Document>]) -> Vec<Document> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut first_seen: HashMap<String, Document> = HashMap::new();

    for list in lists {
        for (rank0, doc) in list.iter().enumerate() {
            let key = identity(doc);
            #[allow(clippy::cast_precision_loss)]
            let term = 1.0 / (K_RRF + (rank0 + 1) as f64);
            *scores.entry(key.clone()).or_insert(0.0) += term;
            first_seen.entry(key).or_insert_with(|| doc.clone());
        }
    }

    let mut fused: Vec<Document> = first_seen
        .into_iter()
        .map(|(key, mut doc)| {
            doc.score = scores[&key];
            doc
        })
        .collect();
    sort_documents(&mut fused);
    trace!(fused = fused.len(), "rrf fusion complete");
    fused
}

/// Deterministic ordering: score desc, recency desc, snippet asc, id asc
pub fn sort_documents(docs: &mut [Document]) {
    docs.sort_by(compare);
}

fn compare(a: &Document, b: &Document) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.published_date.cmp(&a.published_date))
        .then_with(|| a.snippet.chars().count().cmp(&b.snippet.chars().count()))
        .then_with(|| {
            a.article_id
                .as_deref()
                .unwrap_or("")
                .cmp(b.article_id.as_deref().unwrap_or(""))
        })
}

/// Drop duplicate `article_id`s, keeping the highest-ranked occurrence
///
/// Input must already be ordered best-first. Documents without an id
/// are never considered duplicates of each other.
#[must_use]
pub fn dedup_by_article(docs: Vec<Document>) -> Vec<Document> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match &doc.article_id {
            Some(id) => {
                if !seen.contains(id) {
                    seen.push(id.clone());
                    out.push(doc);
                }
            }
            None => out.push(doc),
        }
    }
    out
}

fn identity(doc: &Document) -> String {
    doc.article_id.clone().unwrap_or_else(|| {
        format!("{}@{}", doc.title, doc.published_date.format("%Y-%m-%d"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn doc(id: &str, date: (i32, u32, u32), snippet: &str) -> Document {
        Document::new(
            Some(id.to_string()),
            format!("t-{id}"),
            None,
            NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            "en",
            0.0,
            snippet,
        )
    }

    #[test]
    fn test_rrf_prefers_documents_in_both_lists() {
        let lexical = vec![doc("a", (2025, 1, 1), "s"), doc("b", (2025, 1, 1), "s")];
        let vector = vec![doc("b", (2025, 1, 1), "s"), doc("c", (2025, 1, 1), "s")];
        let fused = reciprocal_rank_fusion(&[lexical, vector]);
        assert_eq!(fused[0].article_id.as_deref(), Some("b"));
        // b: 1/62 + 1/61; a: 1/61; c: 1/62
        assert!((fused[0].score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
    }

    #[test]
    fn test_single_list_fallback_preserves_order() {
        let lexical = vec![doc("a", (2025, 1, 1), "s"), doc("b", (2025, 1, 1), "s")];
        let fused = reciprocal_rank_fusion(&[lexical, Vec::new()]);
        assert_eq!(fused[0].article_id.as_deref(), Some("a"));
        assert_eq!(fused[1].article_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_tie_break_recency_then_snippet_then_id() {
        let mut docs = vec![
            doc("z", (2025, 1, 1), "longer snippet here"),
            doc("a", (2025, 1, 1), "longer snippet here"),
            doc("m", (2025, 1, 2), "longer snippet here"),
            doc("s", (2025, 1, 1), "short"),
        ];
        for d in &mut docs {
            d.score = 0.5;
        }
        sort_documents(&mut docs);
        let order: Vec<_> = docs.iter().map(|d| d.article_id.clone().unwrap()).collect();
        // newest first; among same-date, shorter snippet; then id
        assert_eq!(order, vec!["m", "s", "a", "z"]);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let docs = vec![
            doc("a", (2025, 1, 2), "best"),
            doc("b", (2025, 1, 1), "s"),
            doc("a", (2025, 1, 1), "worse"),
        ];
        let deduped = dedup_by_article(docs);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].snippet, "best");
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let make = || {
            vec![
                vec![doc("a", (2025, 1, 1), "s"), doc("b", (2025, 1, 2), "s")],
                vec![doc("c", (2025, 1, 3), "s"), doc("a", (2025, 1, 1), "s")],
            ]
        };
        let one = reciprocal_rank_fusion(&make());
        let two = reciprocal_rank_fusion(&make());
        assert_eq!(one, two);
    }
}
