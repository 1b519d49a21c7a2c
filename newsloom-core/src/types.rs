//! Canonical request/response data model
//!
//! Value types exchanged between the retriever, the agents, and the
//! orchestrator. Field caps follow the response contract: `header` ≤ 100,
//! `tldr` ≤ 220, insight text ≤ 180, evidence snippets ≤ 240, evidence
//! titles ≤ 200, at most 5 evidence cards per response.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outputs::CommandResult;
use crate::text::truncate_chars;

/// Maximum characters in a response header
pub const MAX_HEADER_CHARS: usize = 100;
/// Maximum characters in a response tl;dr
pub const MAX_TLDR_CHARS: usize = 220;
/// Maximum characters in a single insight text
pub const MAX_INSIGHT_CHARS: usize = 180;
/// Maximum characters in an evidence title
pub const MAX_EVIDENCE_TITLE_CHARS: usize = 200;
/// Maximum characters in a document or evidence snippet
pub const MAX_SNIPPET_CHARS: usize = 240;
/// Maximum evidence cards per response
pub const MAX_EVIDENCE_CARDS: usize = 5;

/// Corpus language, normalized at ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ru,
}

impl Language {
    /// Normalize a raw language tag (`en`, `en-US`, `ru`, `rus`, ...)
    ///
    /// Unknown tags normalize to English, matching how the ingestion
    /// pipeline labels mixed-language feeds.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        if lower == "ru" || lower.starts_with("ru-") || lower == "rus" || lower == "russian" {
            Self::Ru
        } else {
            Self::En
        }
    }

    /// Canonical two-letter tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-declared language preference for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LangPref {
    #[default]
    Auto,
    En,
    Ru,
}

impl LangPref {
    /// Parse the `lang=` argument value
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "en" => Some(Self::En),
            "ru" => Some(Self::Ru),
            _ => None,
        }
    }

    /// Concrete corpus language to filter by, if any
    #[must_use]
    pub const fn filter(self) -> Option<Language> {
        match self {
            Self::Auto => None,
            Self::En => Some(Language::En),
            Self::Ru => Some(Language::Ru),
        }
    }

    /// Language used for user-facing text (auto renders English)
    #[must_use]
    pub const fn display_language(self) -> Language {
        match self {
            Self::Ru => Language::Ru,
            Self::Auto | Self::En => Language::En,
        }
    }
}

/// Retrieval time window
///
/// The variants form the auto-expansion ladder in ascending order;
/// `24h` and `1d` are the same window and parse to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Window {
    H6,
    H12,
    H24,
    D3,
    W1,
    W2,
    M1,
    M3,
    M6,
    Y1,
}

impl Window {
    /// The expansion ladder, narrowest first
    pub const LADDER: [Self; 10] = [
        Self::H6,
        Self::H12,
        Self::H24,
        Self::D3,
        Self::W1,
        Self::W2,
        Self::M1,
        Self::M3,
        Self::M6,
        Self::Y1,
    ];

    /// Parse the `window=` argument value
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "6h" => Some(Self::H6),
            "12h" => Some(Self::H12),
            "24h" | "1d" => Some(Self::H24),
            "3d" => Some(Self::D3),
            "1w" => Some(Self::W1),
            "2w" => Some(Self::W2),
            "1m" => Some(Self::M1),
            "3m" => Some(Self::M3),
            "6m" => Some(Self::M6),
            "1y" => Some(Self::Y1),
            _ => None,
        }
    }

    /// Canonical token as accepted on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::H6 => "6h",
            Self::H12 => "12h",
            Self::H24 => "24h",
            Self::D3 => "3d",
            Self::W1 => "1w",
            Self::W2 => "2w",
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M6 => "6m",
            Self::Y1 => "1y",
        }
    }

    /// Wall-clock span covered by the window
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::H6 => Duration::hours(6),
            Self::H12 => Duration::hours(12),
            Self::H24 => Duration::hours(24),
            Self::D3 => Duration::days(3),
            Self::W1 => Duration::weeks(1),
            Self::W2 => Duration::weeks(2),
            Self::M1 => Duration::days(30),
            Self::M3 => Duration::days(90),
            Self::M6 => Duration::days(182),
            Self::Y1 => Duration::days(365),
        }
    }

    /// Next wider window on the ladder, if any
    #[must_use]
    pub fn widen(self) -> Option<Self> {
        let idx = Self::LADDER.iter().position(|w| *w == self)?;
        Self::LADDER.get(idx + 1).copied()
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Window {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Window {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown window token: {raw}")))
    }
}

/// Canonical command token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Trends,
    AnalyzeKeywords,
    AnalyzeSentiment,
    AnalyzeTopics,
    AnalyzeCompetitors,
    PredictTrends,
    Synthesize,
    Ask,
    EventsLink,
    GraphQuery,
    MemorySuggest,
    MemoryStore,
    MemoryRecall,
    Search,
}

impl CommandKind {
    /// User-facing command spelling
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trends => "/trends",
            Self::AnalyzeKeywords => "/analyze keywords",
            Self::AnalyzeSentiment => "/analyze sentiment",
            Self::AnalyzeTopics => "/analyze topics",
            Self::AnalyzeCompetitors => "/analyze competitors",
            Self::PredictTrends => "/predict trends",
            Self::Synthesize => "/synthesize",
            Self::Ask => "/ask",
            Self::EventsLink => "/events link",
            Self::GraphQuery => "/graph query",
            Self::MemorySuggest => "/memory suggest",
            Self::MemoryStore => "/memory store",
            Self::MemoryRecall => "/memory recall",
            Self::Search => "/search",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieved corpus chunk
///
/// Immutable after retrieval; agents share these as read-only snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub article_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    /// Publication date; synthesized to today when the feed omits it
    pub published_date: NaiveDate,
    pub language: Language,
    /// Relevance score, higher is better
    pub score: f64,
    /// Display snippet, truncated to 240 chars
    pub snippet: String,
}

impl Document {
    /// Build a document, normalizing language and truncating the snippet
    #[must_use]
    pub fn new(
        article_id: Option<String>,
        title: impl Into<String>,
        url: Option<String>,
        published_date: Option<NaiveDate>,
        language: &str,
        score: f64,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            article_id,
            title: title.into(),
            url,
            published_date: published_date.unwrap_or_else(|| Utc::now().date_naive()),
            language: Language::normalize(language),
            score,
            snippet: truncate_chars(&snippet.into(), MAX_SNIPPET_CHARS),
        }
    }

    /// Source domain of the document URL, if any
    #[must_use]
    pub fn domain(&self) -> Option<String> {
        self.url.as_deref().map(crate::text::normalize_domain)
    }
}

/// Pointer into the source corpus backing a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Strict `YYYY-MM-DD`
    pub date: String,
}

impl EvidenceRef {
    /// Reference a retrieved document
    #[must_use]
    pub fn from_document(doc: &Document) -> Self {
        Self {
            article_id: doc.article_id.clone(),
            url: doc.url.clone(),
            date: doc.published_date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Claim type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Fact,
    Hypothesis,
    Recommendation,
    Conflict,
}

/// A single claim with its supporting evidence
///
/// Every insight carries at least one evidence reference; the policy
/// validator rejects responses violating this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub text: String,
    pub evidence_refs: Vec<EvidenceRef>,
}

impl Insight {
    /// Build an insight, truncating text to the 180-char cap
    #[must_use]
    pub fn new(kind: InsightKind, text: impl Into<String>, evidence_refs: Vec<EvidenceRef>) -> Self {
        Self {
            kind,
            text: truncate_chars(&text.into(), MAX_INSIGHT_CHARS),
            evidence_refs,
        }
    }
}

/// A displayed source card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub date: String,
    pub snippet: String,
}

impl Evidence {
    /// Build a source card from a retrieved document
    #[must_use]
    pub fn from_document(doc: &Document) -> Self {
        Self {
            title: truncate_chars(&doc.title, MAX_EVIDENCE_TITLE_CHARS),
            article_id: doc.article_id.clone(),
            url: doc.url.clone(),
            date: doc.published_date.format("%Y-%m-%d").to_string(),
            snippet: truncate_chars(&doc.snippet, MAX_SNIPPET_CHARS),
        }
    }
}

/// Response provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Identifier of the model that produced the primary result
    pub model: String,
    pub version: String,
    pub correlation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm: Option<String>,
}

impl Meta {
    /// Build metadata with a fresh correlation id
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            confidence: 0.5,
            model: model.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            correlation_id: Uuid::new_v4(),
            experiment: None,
            arm: None,
        }
    }
}

/// Canonical successful response
///
/// Exactly these top-level fields; the policy validator rejects any
/// payload carrying extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisResponse {
    pub header: String,
    pub tldr: String,
    pub insights: Vec<Insight>,
    pub evidence: Vec<Evidence>,
    pub result: CommandResult,
    pub meta: Meta,
    pub warnings: Vec<String>,
}

/// Wire-level error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    NoData,
    BudgetExceeded,
    ModelUnavailable,
    Internal,
}

impl ErrorCode {
    /// Whether an immediate client retry is reasonable
    #[must_use]
    pub const fn retryable(self) -> bool {
        match self {
            Self::ValidationFailed | Self::BudgetExceeded => false,
            Self::NoData | Self::ModelUnavailable | Self::Internal => true,
        }
    }
}

/// Canonical failure response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    /// Short message in the user's language
    pub user_message: String,
    /// Detailed message for logs
    pub tech_message: String,
    pub retryable: bool,
    pub meta: Meta,
}

impl ErrorResponse {
    /// Build an error response with retryability derived from the code
    #[must_use]
    pub fn new(
        code: ErrorCode,
        user_message: impl Into<String>,
        tech_message: impl Into<String>,
        meta: Meta,
    ) -> Self {
        Self {
            code,
            user_message: user_message.into(),
            tech_message: tech_message.into(),
            retryable: code.retryable(),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_normalize() {
        assert_eq!(Language::normalize("ru"), Language::Ru);
        assert_eq!(Language::normalize("RU-ru"), Language::Ru);
        assert_eq!(Language::normalize("en-US"), Language::En);
        assert_eq!(Language::normalize("de"), Language::En);
    }

    #[test]
    fn test_window_parse_aliases() {
        assert_eq!(Window::parse("24h"), Some(Window::H24));
        assert_eq!(Window::parse("1d"), Some(Window::H24));
        assert_eq!(Window::parse("2 weeks"), None);
    }

    #[test]
    fn test_window_ladder_widens_in_order() {
        let mut w = Window::H6;
        let mut seen = vec![w];
        while let Some(next) = w.widen() {
            assert!(next.duration() > w.duration());
            seen.push(next);
            w = next;
        }
        assert_eq!(seen, Window::LADDER.to_vec());
        assert_eq!(Window::Y1.widen(), None);
    }

    #[test]
    fn test_document_synthesizes_date_and_truncates() {
        let long = "x".repeat(500);
        let doc = Document::new(None, "t", None, None, "en", 1.0, long);
        assert_eq!(doc.published_date, Utc::now().date_naive());
        assert_eq!(doc.snippet.chars().count(), MAX_SNIPPET_CHARS);
    }

    #[test]
    fn test_evidence_ref_date_format() {
        let doc = Document::new(
            Some("a1".into()),
            "t",
            None,
            NaiveDate::from_ymd_opt(2025, 3, 7),
            "en",
            1.0,
            "s",
        );
        let r = EvidenceRef::from_document(&doc);
        assert_eq!(r.date, "2025-03-07");
    }

    #[test]
    fn test_error_code_serde_shape() {
        let json = serde_json::to_string(&ErrorCode::BudgetExceeded).unwrap();
        assert_eq!(json, "\"BUDGET_EXCEEDED\"");
    }

    #[test]
    fn test_analysis_response_rejects_unknown_fields() {
        let json = r#"{
            "header": "h", "tldr": "t", "insights": [], "evidence": [],
            "result": {"kind": "sentiment", "overall": 0.0,
                       "emotions": {"joy":0,"sadness":0,"anger":0,"fear":0,"surprise":0},
                       "aspects": []},
            "meta": {"confidence": 0.5, "model": "m", "version": "1",
                     "correlation_id": "6f7dd5d4-7b2d-4f5a-9d44-0a7a1a1f2b3c"},
            "warnings": [],
            "extra": true
        }"#;
        let parsed: std::result::Result<AnalysisResponse, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_lang_pref_filter() {
        assert_eq!(LangPref::Auto.filter(), None);
        assert_eq!(LangPref::Ru.filter(), Some(Language::Ru));
        assert_eq!(LangPref::parse("EN"), Some(LangPref::En));
        assert_eq!(LangPref::parse("uk"), None);
    }
}
