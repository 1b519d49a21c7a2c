//! Property tests for fusion determinism and bounds

use chrono::NaiveDate;
use newsloom_core::Document;
use newsloom_retrieval::fusion::{dedup_by_article, reciprocal_rank_fusion, sort_documents};
use proptest::prelude::*;

fn doc_strategy() -> impl Strategy<Value = Document> {
    (
        0u32..40,
        1u32..28,
        0usize..200,
    )
        .prop_map(|(id, day, snippet_len)| {
            Document::new(
                Some(format!("a{id:02}")),
                format!("title {id}"),
                None,
                NaiveDate::from_ymd_opt(2025, 6, day),
                "en",
                0.0,
                "s".repeat(snippet_len),
            )
        })
}

proptest! {
    #[test]
    fn fusion_is_deterministic(
        lexical in prop::collection::vec(doc_strategy(), 0..30),
        vector in prop::collection::vec(doc_strategy(), 0..30)
    ) {
        let one = reciprocal_rank_fusion(&[lexical.clone(), vector.clone()]);
        let two = reciprocal_rank_fusion(&[lexical, vector]);
        prop_assert_eq!(one, two);
    }

    #[test]
    fn fused_scores_are_non_increasing(
        lexical in prop::collection::vec(doc_strategy(), 0..30),
        vector in prop::collection::vec(doc_strategy(), 0..30)
    ) {
        let fused = reciprocal_rank_fusion(&[lexical, vector]);
        for pair in fused.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn dedup_removes_all_duplicate_ids(
        docs in prop::collection::vec(doc_strategy(), 0..60)
    ) {
        let mut sorted = docs;
        sort_documents(&mut sorted);
        let deduped = dedup_by_article(sorted);
        let mut ids: Vec<String> = deduped
            .iter()
            .filter_map(|d| d.article_id.clone())
            .collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), before);
    }
}
