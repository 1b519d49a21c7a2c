//! Storage suggestion heuristics
//!
//! Scores a candidate text for whether (and how) it is worth keeping:
//! importance from content features, a suggested memory kind from the
//! dominant language pattern, and the TTL default for that kind.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::types::MemoryKind;

/// TTL default for episodic suggestions, days
pub const EPISODIC_TTL_DAYS: u32 = 90;
/// TTL default for semantic suggestions, days
pub const SEMANTIC_TTL_DAYS: u32 = 180;

/// Verbs and markers that indicate a dated event
static EVENT_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(announced|launched|released|acquired|signed|reported|filed|yesterday|today|this (?:week|month|morning)|breaking|on \d{4}-\d{2}-\d{2})\b",
    )
    .expect("event marker pattern compiles")
});

/// Rough date mentions, which also push toward episodic
static DATE_MENTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b(19|20)\d{2}\b").expect("date pattern compiles"));

/// A storage recommendation for a candidate memory
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSuggestion {
    /// Importance in [0, 1]
    pub importance: f64,
    pub kind: MemoryKind,
    pub ttl_days: u32,
}

/// Suggest whether and how to store a candidate text
///
/// Importance combines length (longer texts up to a cap), entity
/// density (capitalized-token ratio), and recency markers. Kind is
/// episodic when event language dominates, semantic otherwise.
#[must_use]
pub fn suggest_storage(content: &str, _user_id: Option<&str>) -> StorageSuggestion {
    let tokens: Vec<&str> = content.split_whitespace().collect();
    let token_count = tokens.len();

    // length component: saturates at 60 tokens
    #[allow(clippy::cast_precision_loss)]
    let length_score = (token_count as f64 / 60.0).min(1.0);

    // entity density: capitalized non-initial tokens
    let capitalized = tokens
        .iter()
        .skip(1)
        .filter(|t| t.chars().next().is_some_and(char::is_uppercase))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let entity_score = if token_count <= 1 {
        0.0
    } else {
        (capitalized as f64 / (token_count - 1) as f64 * 3.0).min(1.0)
    };

    let event_hits = EVENT_MARKERS.find_iter(content).count();
    let recency_score = if event_hits > 0 { 1.0 } else { 0.0 };

    let importance =
        (0.4 * length_score + 0.35 * entity_score + 0.25 * recency_score).clamp(0.0, 1.0);

    let date_hits = DATE_MENTIONS.find_iter(content).count();
    let kind = if event_hits >= 1 || date_hits >= 2 {
        MemoryKind::Episodic
    } else {
        MemoryKind::Semantic
    };
    let ttl_days = match kind {
        MemoryKind::Episodic => EPISODIC_TTL_DAYS,
        MemoryKind::Semantic => SEMANTIC_TTL_DAYS,
    };

    debug!(
        token_count,
        event_hits, importance, kind = kind.as_str(), "storage suggestion computed"
    );
    StorageSuggestion {
        importance,
        kind,
        ttl_days,
    }
}
