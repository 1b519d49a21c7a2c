//! Query expansion agent
//!
//! Derives search intents, expansion queries, and negative terms from
//! the query shape and the corpus vocabulary. Expansions append the
//! strongest co-occurring corpus terms to the original query; negatives
//! are the explicit `-term` exclusions plus boilerplate noise.

use std::collections::HashMap;

use async_trait::async_trait;
use newsloom_core::outputs::{AgentOutput, QueryExpansionOutput};
use newsloom_core::routes::TaskKind;
use newsloom_core::text::{stem, tokenize};
use tracing::debug;

use crate::context::{Agent, AgentContext, AgentError, AgentResult};
use crate::lexicon::is_stopword;

/// Expansion queries produced
const MAX_EXPANSIONS: usize = 5;

/// Intent patterns by leading phrase shape
const INTENT_RULES: &[(&str, &str)] = &[
    ("how", "how_to"),
    ("why", "explanation"),
    ("what", "definition"),
    ("who", "entity_lookup"),
    ("when", "timeline"),
    ("compare", "comparison"),
    ("vs", "comparison"),
    ("latest", "fresh_news"),
    ("новости", "fresh_news"),
    ("почему", "explanation"),
];

/// Boilerplate terms excluded from expanded queries
const NOISE_NEGATIVES: &[&str] = &["advertisement", "sponsored", "newsletter", "subscribe"];

/// Intent and expansion derivation
#[derive(Debug, Default)]
pub struct QueryExpansionAgent;

#[async_trait]
impl Agent for QueryExpansionAgent {
    fn name(&self) -> &'static str {
        "query_expansion"
    }

    fn task(&self) -> TaskKind {
        TaskKind::QueryExpansion
    }

    fn parallel_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        let query = ctx.params.query.trim();
        if query.is_empty() {
            return Err(AgentError::no_data(self.name(), "empty query"));
        }
        let query_tokens = tokenize(query);

        let mut intents: Vec<String> = Vec::new();
        for (marker, intent) in INTENT_RULES {
            if query_tokens.iter().any(|t| t == marker)
                && !intents.iter().any(|i| i == intent)
            {
                intents.push((*intent).to_string());
            }
        }
        if intents.is_empty() {
            intents.push("topic_news".to_string());
        }

        // negatives: explicit -term exclusions, then noise boilerplate
        let mut negatives: Vec<String> = query
            .split_whitespace()
            .filter_map(|w| w.strip_prefix('-'))
            .map(str::to_lowercase)
            .collect();
        for noise in NOISE_NEGATIVES {
            negatives.push((*noise).to_string());
        }

        // expansions: strongest corpus terms not already in the query
        let query_stems: Vec<String> = query_tokens.iter().map(|t| stem(t)).collect();
        let mut co: HashMap<String, usize> = HashMap::new();
        for doc in ctx.docs.iter() {
            for token in tokenize(&format!("{} {}", doc.title, doc.snippet)) {
                if is_stopword(&token) || token.chars().count() <= 2 {
                    continue;
                }
                let stemmed = stem(&token);
                if query_stems.contains(&stemmed) {
                    continue;
                }
                *co.entry(token).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = co.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let expansions: Vec<String> = ranked
            .into_iter()
            .take(MAX_EXPANSIONS)
            .map(|(term, _)| format!("{query} {term}"))
            .collect();

        debug!(
            intents = intents.len(),
            expansions = expansions.len(),
            "query expansion complete"
        );
        Ok(AgentOutput::QueryExpansion(QueryExpansionOutput {
            intents,
            expansions,
            negatives,
        }))
    }
}
