//! Paged retrieval API
//!
//! The surface other subsystems call (the search command, dashboards).
//! Pagination is stateless: the cursor is opaque base64 of an offset,
//! so any replica can serve the next page.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use newsloom_core::types::LangPref;
use newsloom_core::{NewsloomError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::fusion::{dedup_by_article, reciprocal_rank_fusion};
use crate::store::{DocumentIndex, SearchFilter};

/// Largest page a caller may request
pub const MAX_PAGE_K: usize = 50;

/// Filters of a paged retrieval request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieveFilters {
    pub sources: Vec<String>,
    pub lang: LangPref,
}

/// Paged retrieval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    /// Look-back horizon in hours
    pub hours: u32,
    /// Page size, clamped to `[1, 50]`
    pub k: usize,
    #[serde(default)]
    pub filters: RetrieveFilters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

/// One page item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub snippet: String,
    /// Publication date, ISO `YYYY-MM-DD`
    pub ts: String,
    pub source: String,
    pub score: f64,
}

/// Freshness summary of a page
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FreshnessStats {
    pub median_sec: u64,
}

/// Paged retrieval response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub items: Vec<RetrieveItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Fraction of the requested page actually filled, in [0, 1]
    pub coverage: f64,
    pub freshness_stats: FreshnessStats,
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    offset: usize,
}

/// Encode a pagination offset into an opaque cursor
#[must_use]
pub fn encode_cursor(offset: usize) -> String {
    let payload = serde_json::to_vec(&CursorPayload { offset }).unwrap_or_default();
    BASE64.encode(payload)
}

/// Decode an opaque cursor back into an offset
///
/// # Errors
/// Returns a validation error on malformed cursors.
pub fn decode_cursor(cursor: &str) -> Result<usize> {
    let bytes = BASE64
        .decode(cursor)
        .map_err(|e| NewsloomError::validation(format!("malformed cursor: {e}")))?;
    let payload: CursorPayload = serde_json::from_slice(&bytes)
        .map_err(|e| NewsloomError::validation(format!("malformed cursor payload: {e}")))?;
    Ok(payload.offset)
}

/// Serve one page of hybrid search results
///
/// # Errors
/// Returns validation errors for bad arguments or cursors and
/// propagates backend failures.
pub async fn search_page(
    index: &Arc<dyn DocumentIndex>,
    request: &RetrieveRequest,
) -> Result<RetrieveResponse> {
    if request.query.trim().is_empty() {
        return Err(NewsloomError::validation("query must not be empty"));
    }
    let k = request.k.clamp(1, MAX_PAGE_K);
    let offset = match &request.cursor {
        Some(cursor) => decode_cursor(cursor)?,
        None => 0,
    };

    let now = Utc::now();
    let filter = SearchFilter {
        since: Some((now - chrono::Duration::hours(i64::from(request.hours))).date_naive()),
        until: None,
        language: request.filters.lang.filter(),
        sources: if request.filters.sources.is_empty() {
            None
        } else {
            Some(request.filters.sources.clone())
        },
    };

    // fetch enough from each index to cover the requested page
    let fetch = offset + k + 1;
    let (lexical, vector) = tokio::join!(
        index.lexical_top(&request.query, &filter, fetch),
        index.vector_top(&request.query, &filter, fetch),
    );
    let fused = dedup_by_article(reciprocal_rank_fusion(&[lexical?, vector?]));

    let has_more = fused.len() > offset + k;
    let today = now.date_naive();
    let mut staleness: Vec<u64> = Vec::new();
    let items: Vec<RetrieveItem> = fused
        .into_iter()
        .skip(offset)
        .take(k)
        .map(|doc| {
            let age_days = (today - doc.published_date).num_days().max(0);
            #[allow(clippy::cast_sign_loss)]
            staleness.push(age_days as u64 * 86_400);
            RetrieveItem {
                id: doc
                    .article_id
                    .clone()
                    .unwrap_or_else(|| doc.title.clone()),
                title: doc.title.clone(),
                url: doc.url.clone(),
                snippet: doc.snippet.clone(),
                ts: doc.published_date.format("%Y-%m-%d").to_string(),
                source: doc.domain().unwrap_or_else(|| "unknown".to_string()),
                score: doc.score,
            }
        })
        .collect();

    staleness.sort_unstable();
    let median_sec = staleness
        .get(staleness.len() / 2)
        .copied()
        .unwrap_or_default();

    #[allow(clippy::cast_precision_loss)]
    let coverage = (items.len() as f64 / k as f64).clamp(0.0, 1.0);
    debug!(
        query = %request.query,
        offset,
        returned = items.len(),
        has_more,
        "search page served"
    );

    Ok(RetrieveResponse {
        next_cursor: has_more.then(|| encode_cursor(offset + k)),
        coverage,
        freshness_stats: FreshnessStats { median_sec },
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryIndex, StoredArticle};
    use newsloom_core::types::Language;

    fn seeded() -> Arc<dyn DocumentIndex> {
        let index = InMemoryIndex::new(128);
        for i in 0..12 {
            index.insert(StoredArticle {
                article_id: format!("a{i:02}"),
                title: format!("AI update {i}"),
                url: Some(format!("https://feed.example/{i}")),
                published_date: Utc::now().date_naive(),
                language: Language::En,
                content: "ai adoption update".to_string(),
                source_domain: Some("feed.example".to_string()),
            });
        }
        Arc::new(index)
    }

    fn request(k: usize, cursor: Option<String>) -> RetrieveRequest {
        RetrieveRequest {
            query: "ai".to_string(),
            hours: 48,
            k,
            filters: RetrieveFilters::default(),
            cursor,
            correlation_id: None,
        }
    }

    #[test]
    fn test_cursor_roundtrip() {
        let cursor = encode_cursor(17);
        assert_eq!(decode_cursor(&cursor).unwrap(), 17);
        assert!(decode_cursor("not-base64!").is_err());
    }

    #[tokio::test]
    async fn test_pagination_no_overlap() {
        let index = seeded();
        let page1 = search_page(&index, &request(5, None)).await.unwrap();
        assert_eq!(page1.items.len(), 5);
        let cursor = page1.next_cursor.clone().expect("more pages");
        let page2 = search_page(&index, &request(5, Some(cursor))).await.unwrap();
        let ids1: Vec<_> = page1.items.iter().map(|i| i.id.clone()).collect();
        for item in &page2.items {
            assert!(!ids1.contains(&item.id));
        }
    }

    #[tokio::test]
    async fn test_last_page_has_no_cursor() {
        let index = seeded();
        let page = search_page(&index, &request(50, None)).await.unwrap();
        assert!(page.next_cursor.is_none());
        assert!(page.coverage < 1.0);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let index = seeded();
        let mut bad = request(5, None);
        bad.query = "   ".to_string();
        assert!(search_page(&index, &bad).await.is_err());
    }

    #[tokio::test]
    async fn test_freshness_today_is_zero() {
        let index = seeded();
        let page = search_page(&index, &request(5, None)).await.unwrap();
        assert_eq!(page.freshness_stats.median_sec, 0);
    }
}
