//! Intent gate for `/ask`
//!
//! A deterministic classifier that lets pure general-knowledge
//! questions skip retrieval: no news corpus is going to improve
//! "what is a transformer model". News-shaped cues (recency words,
//! dates, market verbs) force retrieval.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static NEWS_CUES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(today|yesterday|this (?:week|month|year)|latest|breaking|announced|launched|acquired|stock|market|earnings|quarter|price|prices|новости|сегодня|вчера|рынок)\b",
    )
    .expect("news cue pattern compiles")
});

static DEFINITION_SHAPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(what is|what are|define|explain|how does|who invented|что такое)\b")
        .expect("definition pattern compiles")
});

/// True when the question is answerable without the news corpus
#[must_use]
pub fn is_general_knowledge(query: &str) -> bool {
    if NEWS_CUES.is_match(query) {
        return false;
    }
    let general = DEFINITION_SHAPES.is_match(query);
    debug!(query, general, "intent classified");
    general
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_questions_skip_retrieval() {
        assert!(is_general_knowledge("what is a transformer model"));
        assert!(is_general_knowledge("explain reciprocal rank fusion"));
        assert!(is_general_knowledge("что такое квантовый компьютер"));
    }

    #[test]
    fn test_news_cues_force_retrieval() {
        assert!(!is_general_knowledge("what is the latest on chip prices"));
        assert!(!is_general_knowledge("explain today's market crash"));
    }

    #[test]
    fn test_plain_topics_force_retrieval() {
        assert!(!is_general_knowledge("chip shortage impact"));
    }
}
