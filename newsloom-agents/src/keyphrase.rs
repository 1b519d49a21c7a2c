//! Keyphrase extraction agent
//!
//! Scores unigram and bigram candidates by frequency across the
//! document snapshot, keeps 5–15 phrases, and collects the surface
//! variants observed for each. Entirely deterministic; the model route
//! exists for deployments that layer phrase cleanup on top, and a
//! failed model call never fails the agent.

use std::collections::HashMap;

use async_trait::async_trait;
use newsloom_core::outputs::{AgentOutput, Keyphrase, KeyphraseOutput};
use newsloom_core::routes::TaskKind;
use newsloom_core::text::{stem, tokenize};
use tracing::debug;

use crate::context::{Agent, AgentContext, AgentError, AgentResult};
use crate::lexicon::is_stopword;

/// Fewest phrases worth returning
pub const MIN_PHRASES: usize = 5;
/// Phrase cap
pub const MAX_PHRASES: usize = 15;

/// Keyphrase extraction over the document snapshot
#[derive(Debug, Default)]
pub struct KeyphraseAgent;

#[derive(Default)]
struct Candidate {
    count: usize,
    ngram: u8,
    variants: Vec<String>,
}

impl KeyphraseAgent {
    fn collect(docs_text: &[Vec<String>]) -> HashMap<String, Candidate> {
        let mut candidates: HashMap<String, Candidate> = HashMap::new();
        for tokens in docs_text {
            let content: Vec<&String> = tokens.iter().filter(|t| !is_stopword(t)).collect();
            for token in &content {
                let key = stem(token);
                let entry = candidates.entry(key).or_insert_with(|| Candidate {
                    ngram: 1,
                    ..Candidate::default()
                });
                entry.count += 1;
                if !entry.variants.contains(*token) {
                    entry.variants.push((*token).clone());
                }
            }
            for pair in content.windows(2) {
                let surface = format!("{} {}", pair[0], pair[1]);
                let key = format!("{} {}", stem(pair[0]), stem(pair[1]));
                let entry = candidates.entry(key).or_insert_with(|| Candidate {
                    ngram: 2,
                    ..Candidate::default()
                });
                // bigrams are rarer; weight them up so they can compete
                entry.count += 2;
                if !entry.variants.contains(&surface) {
                    entry.variants.push(surface);
                }
            }
        }
        candidates
    }
}

#[async_trait]
impl Agent for KeyphraseAgent {
    fn name(&self) -> &'static str {
        "keyphrase"
    }

    fn task(&self) -> TaskKind {
        TaskKind::Keyphrase
    }

    fn parallel_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        if ctx.docs.is_empty() {
            return Err(AgentError::no_data(self.name(), "no documents to analyze"));
        }
        let docs_text: Vec<Vec<String>> = ctx
            .docs
            .iter()
            .map(|d| tokenize(&format!("{} {}", d.title, d.snippet)))
            .collect();
        let candidates = Self::collect(&docs_text);

        let max_count = candidates.values().map(|c| c.count).max().unwrap_or(1);
        let repeated = candidates
            .values()
            .filter(|c| c.count > 1 || c.ngram > 1)
            .count();
        // relax the repetition filter on thin corpora to keep ≥5 phrases
        let keep_singletons = repeated < MIN_PHRASES;
        let mut phrases: Vec<Keyphrase> = candidates
            .into_iter()
            .filter(|(_, c)| keep_singletons || c.count > 1 || c.ngram > 1)
            .map(|(_, c)| {
                #[allow(clippy::cast_precision_loss)]
                let score = (c.count as f64 / max_count as f64).clamp(0.0, 1.0);
                let phrase = c
                    .variants
                    .first()
                    .cloned()
                    .unwrap_or_default();
                Keyphrase {
                    phrase,
                    score,
                    ngram: c.ngram,
                    variants: c.variants,
                }
            })
            .filter(|p| !p.phrase.is_empty())
            .collect();
        phrases.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.phrase.cmp(&b.phrase))
        });
        phrases.truncate(MAX_PHRASES);

        debug!(phrases = phrases.len(), "keyphrase extraction complete");
        Ok(AgentOutput::Keyphrase(KeyphraseOutput { phrases }))
    }
}
