//! Sentiment agent
//!
//! Lexicon-based scoring: per-document score from positive/negative cue
//! counts, combined into a length-weighted mean; emotion buckets from
//! cue tables, normalized so the total stays within the unit budget
//! (the residual reads as neutral); per-aspect scores over the most
//! frequent content terms.

use std::collections::HashMap;

use async_trait::async_trait;
use newsloom_core::outputs::{
    AgentOutput, AspectSentiment, EmotionScores, SentimentOutput,
};
use newsloom_core::routes::TaskKind;
use newsloom_core::text::tokenize;
use tracing::debug;

use crate::context::{Agent, AgentContext, AgentError, AgentResult};
use crate::lexicon::{self, is_stopword};

/// Aspects reported per response
const MAX_ASPECTS: usize = 3;

/// Lexicon-driven sentiment scoring
#[derive(Debug, Default)]
pub struct SentimentAgent;

#[allow(clippy::cast_precision_loss)]
fn doc_score(tokens: &[String]) -> f64 {
    let positive = tokens
        .iter()
        .filter(|t| lexicon::POSITIVE.contains(&t.as_str()))
        .count();
    let negative = tokens
        .iter()
        .filter(|t| lexicon::NEGATIVE.contains(&t.as_str()))
        .count();
    if positive + negative == 0 {
        return 0.0;
    }
    ((positive as f64 - negative as f64) / (positive + negative) as f64).clamp(-1.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn emotion_hits(tokens: &[String]) -> EmotionScores {
    let count = |table: &[&str]| {
        tokens
            .iter()
            .filter(|t| table.contains(&t.as_str()))
            .count() as f64
    };
    EmotionScores {
        joy: count(lexicon::JOY),
        sadness: count(lexicon::SADNESS),
        anger: count(lexicon::ANGER),
        fear: count(lexicon::FEAR),
        surprise: count(lexicon::SURPRISE),
    }
}

#[async_trait]
impl Agent for SentimentAgent {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    fn task(&self) -> TaskKind {
        TaskKind::Sentiment
    }

    fn parallel_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        if ctx.docs.is_empty() {
            return Err(AgentError::no_data(self.name(), "no documents to analyze"));
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut emotions = EmotionScores::default();
        let mut term_sentiment: HashMap<String, (f64, usize)> = HashMap::new();

        for doc in ctx.docs.iter() {
            let tokens = tokenize(&format!("{} {}", doc.title, doc.snippet));
            #[allow(clippy::cast_precision_loss)]
            let weight = tokens.len().max(1) as f64;
            let score = doc_score(&tokens);
            weighted_sum += score * weight;
            weight_total += weight;

            let hits = emotion_hits(&tokens);
            emotions.joy += hits.joy;
            emotions.sadness += hits.sadness;
            emotions.anger += hits.anger;
            emotions.fear += hits.fear;
            emotions.surprise += hits.surprise;

            for token in tokens.iter().filter(|t| {
                !is_stopword(t)
                    && !lexicon::POSITIVE.contains(&t.as_str())
                    && !lexicon::NEGATIVE.contains(&t.as_str())
                    && t.chars().count() > 3
            }) {
                let entry = term_sentiment.entry(token.clone()).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }

        let overall = if weight_total > 0.0 {
            (weighted_sum / weight_total).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        // scale the raw hit counts down into the unit emotion budget
        let emotions = emotions.normalized();

        let mut aspects: Vec<(String, f64, usize)> = term_sentiment
            .into_iter()
            .filter(|(_, (_, count))| *count > 1)
            .map(|(term, (sum, count))| {
                #[allow(clippy::cast_precision_loss)]
                let mean = (sum / count as f64).clamp(-1.0, 1.0);
                (term, mean, count)
            })
            .collect();
        aspects.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
        let aspects: Vec<AspectSentiment> = aspects
            .into_iter()
            .take(MAX_ASPECTS)
            .map(|(aspect, score, _)| AspectSentiment { aspect, score })
            .collect();

        debug!(overall, aspects = aspects.len(), "sentiment computed");
        Ok(AgentOutput::Sentiment(SentimentOutput {
            overall,
            emotions,
            aspects,
        }))
    }
}
