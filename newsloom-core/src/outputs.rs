//! Typed agent output schemas
//!
//! Every agent produces one of the fixed result shapes below; the
//! pipeline never inspects free-form JSON. `CommandResult` is the
//! command-specific payload embedded in the canonical response.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::EvidenceRef;

/// Maximum characters in a synthesis summary
pub const MAX_SUMMARY_CHARS: usize = 400;

/// A scored keyphrase with surface variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyphrase {
    pub phrase: String,
    /// Salience in [0, 1]
    pub score: f64,
    /// Phrase length in words
    pub ngram: u8,
    pub variants: Vec<String>,
}

/// Keyphrase agent result: 5–15 scored phrases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyphraseOutput {
    pub phrases: Vec<Keyphrase>,
}

/// Fixed emotion buckets; values are non-negative and sum to ≤ 1,
/// the residual reads as neutral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct EmotionScores {
    pub joy: f64,
    pub sadness: f64,
    pub anger: f64,
    pub fear: f64,
    pub surprise: f64,
}

impl EmotionScores {
    /// Sum across all buckets
    #[must_use]
    pub fn total(&self) -> f64 {
        self.joy + self.sadness + self.anger + self.fear + self.surprise
    }

    /// Scale buckets down proportionally so the total is ≤ 1
    #[must_use]
    pub fn normalized(self) -> Self {
        let total = self.total();
        if total <= 1.0 || total == 0.0 {
            return self;
        }
        Self {
            joy: self.joy / total,
            sadness: self.sadness / total,
            anger: self.anger / total,
            fear: self.fear / total,
            surprise: self.surprise / total,
        }
    }
}

/// Per-aspect sentiment score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectSentiment {
    pub aspect: String,
    /// Score in [-1, 1]
    pub score: f64,
}

/// Sentiment agent result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentOutput {
    /// Length-weighted mean over per-document scores, in [-1, 1]
    pub overall: f64,
    pub emotions: EmotionScores,
    pub aspects: Vec<AspectSentiment>,
}

/// Per-cluster document-count trend over the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicTrend {
    Rising,
    Falling,
    Stable,
}

/// One topic cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCluster {
    pub label: String,
    pub terms: Vec<String>,
    /// Documents in the cluster
    pub size: usize,
    pub trend: TopicTrend,
}

/// Topics agent result: 3–8 clusters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicsOutput {
    pub topics: Vec<TopicCluster>,
}

/// Query expansion agent result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExpansionOutput {
    pub intents: Vec<String>,
    pub expansions: Vec<String>,
    pub negatives: Vec<String>,
}

/// Forecast direction from the EWMA slope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Up,
    Flat,
    Down,
}

/// A forecast driver backed by evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDriver {
    pub text: String,
    pub evidence_refs: Vec<EvidenceRef>,
}

/// Trend forecaster result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub direction: Momentum,
    /// Slope of the smoothed signal over the last buckets
    pub slope: f64,
    /// 3–5 drivers with evidence
    pub drivers: Vec<ForecastDriver>,
    /// `[lo, hi]` with `lo ≤ hi`, width clamped to [0.1, 0.9]
    pub confidence_interval: [f64; 2],
}

/// Competitive stance of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Leader,
    FastFollower,
    Niche,
}

/// Pairwise topic overlap between two domains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainOverlap {
    pub a: String,
    pub b: String,
    /// Jaccard similarity of top-term sets, in [0, 1]
    pub jaccard: f64,
}

/// Positioning of one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainPositioning {
    pub domain: String,
    pub stance: Stance,
    /// Articles observed in the window
    pub coverage: usize,
}

/// Competitor news agent result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorOutput {
    pub domains: Vec<String>,
    pub overlap: Vec<DomainOverlap>,
    pub positioning: Vec<DomainPositioning>,
    /// Topics covered by rivals but absent for a domain
    pub gaps: Vec<String>,
}

/// A detected cross-agent conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConflict {
    pub description: String,
    /// Names of the agents whose outputs disagree
    pub agents: Vec<String>,
}

/// Recommendation impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// A recommended action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisAction {
    pub text: String,
    pub impact: Impact,
}

/// Synthesis agent result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    /// Cross-agent summary, ≤ 400 chars
    pub summary: String,
    pub conflicts: Vec<SynthesisConflict>,
    /// 1–5 recommendations
    pub actions: Vec<SynthesisAction>,
}

/// One iteration of the iterative answering loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskStep {
    pub iteration: u8,
    /// Query used for this iteration's retrieval
    pub query: String,
    /// Whether the self-check judged the evidence sufficient
    pub sufficient: bool,
    /// Documents added by this iteration's retrieval
    pub new_docs: usize,
}

/// Iterative answering result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskOutput {
    pub answer: String,
    pub steps: Vec<AskStep>,
    pub followups: Vec<String>,
}

/// Knowledge-graph node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

/// Knowledge-graph edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub src: String,
    pub tgt: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub weight: f64,
}

/// Graph agent result: a size-bounded subgraph plus traversal paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphOutput {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Node-id paths found by traversal
    pub paths: Vec<Vec<String>>,
    pub answer: String,
}

/// One extracted event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub id: String,
    pub title: String,
    /// `[start_date, end_date]`
    pub time_range: [NaiveDate; 2],
    pub entities: Vec<String>,
    pub source_doc_ids: Vec<String>,
}

/// An inferred causal link between two events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalLink {
    pub cause: String,
    pub effect: String,
    /// Link confidence in [0, 1]
    pub confidence: f64,
}

/// Events agent result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsOutput {
    pub events: Vec<NewsEvent>,
    /// Event ids in timeline order
    pub timeline: Vec<String>,
    pub causal_links: Vec<CausalLink>,
}

/// Memory operation performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryOp {
    Suggest,
    Store,
    Recall,
}

/// A record surfaced by semantic recall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalledRecord {
    pub id: String,
    pub content: String,
    /// Cosine similarity to the query, in [0, 1]
    pub similarity: f64,
    pub record_type: String,
    pub importance: f64,
}

/// Storage suggestion for a candidate memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSuggestion {
    pub importance: f64,
    pub suggested_type: String,
    pub ttl_days: u32,
}

/// Memory operations agent result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryOutput {
    pub op: MemoryOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_id: Option<String>,
    pub records: Vec<RecalledRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<StorageSuggestion>,
}

/// One page item of the raw search command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub snippet: String,
    pub ts: String,
    pub source: String,
    pub score: f64,
}

/// Median-freshness statistics for a search page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreshnessStats {
    pub median_sec: u64,
}

/// Search command result: one retrieval page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutput {
    pub items: Vec<SearchItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Fraction of the request satisfied, in [0, 1]
    pub coverage: f64,
    pub freshness_stats: FreshnessStats,
}

/// Union of every agent's output, tagged by agent name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "agent", rename_all = "snake_case")]
pub enum AgentOutput {
    Keyphrase(KeyphraseOutput),
    Sentiment(SentimentOutput),
    Topics(TopicsOutput),
    QueryExpansion(QueryExpansionOutput),
    TrendForecaster(ForecastOutput),
    CompetitorNews(CompetitorOutput),
    Synthesis(SynthesisOutput),
    AgenticRag(AskOutput),
    Graph(GraphOutput),
    Events(EventsOutput),
    MemoryOps(MemoryOutput),
}

impl AgentOutput {
    /// Producing agent's name
    #[must_use]
    pub const fn agent_name(&self) -> &'static str {
        match self {
            Self::Keyphrase(_) => "keyphrase",
            Self::Sentiment(_) => "sentiment",
            Self::Topics(_) => "topics",
            Self::QueryExpansion(_) => "query_expansion",
            Self::TrendForecaster(_) => "trend_forecaster",
            Self::CompetitorNews(_) => "competitor_news",
            Self::Synthesis(_) => "synthesis",
            Self::AgenticRag(_) => "agentic_rag",
            Self::Graph(_) => "graph",
            Self::Events(_) => "events",
            Self::MemoryOps(_) => "memory_ops",
        }
    }
}

/// Command-specific typed payload of the canonical response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandResult {
    Trends {
        topics: TopicsOutput,
        sentiment: SentimentOutput,
    },
    Keywords {
        keyphrases: KeyphraseOutput,
        #[serde(skip_serializing_if = "Option::is_none")]
        expansion: Option<QueryExpansionOutput>,
    },
    Sentiment(SentimentOutput),
    Topics(TopicsOutput),
    Competitors(CompetitorOutput),
    Forecast(ForecastOutput),
    Synthesis(SynthesisOutput),
    Ask(AskOutput),
    Events(EventsOutput),
    Graph(GraphOutput),
    Memory(MemoryOutput),
    Search(SearchOutput),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotions_normalize_to_unit_budget() {
        let raw = EmotionScores {
            joy: 0.8,
            sadness: 0.6,
            anger: 0.4,
            fear: 0.2,
            surprise: 0.0,
        };
        let norm = raw.normalized();
        assert!(norm.total() <= 1.0 + 1e-9);
        assert!(norm.joy > norm.sadness);
    }

    #[test]
    fn test_emotions_under_budget_untouched() {
        let raw = EmotionScores {
            joy: 0.3,
            sadness: 0.1,
            ..EmotionScores::default()
        };
        assert_eq!(raw.normalized(), raw);
    }

    #[test]
    fn test_agent_output_tag_roundtrip() {
        let out = AgentOutput::Sentiment(SentimentOutput {
            overall: -0.2,
            emotions: EmotionScores::default(),
            aspects: vec![],
        });
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["agent"], "sentiment");
        let back: AgentOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn test_command_result_tagging() {
        let result = CommandResult::Search(SearchOutput {
            items: vec![],
            next_cursor: None,
            coverage: 1.0,
            freshness_stats: FreshnessStats { median_sec: 120 },
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "search");
        assert_eq!(json["coverage"], 1.0);
    }

    #[test]
    fn test_graph_node_type_field_name() {
        let node = GraphNode {
            id: "n1".into(),
            label: "OpenAI".into(),
            node_type: "org".into(),
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "org");
    }
}
