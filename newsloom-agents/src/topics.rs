//! Topic clustering agent
//!
//! Greedy term-anchored clustering: repeatedly take the most frequent
//! unclaimed content term, gather the documents containing it, and
//! label the cluster with its top co-occurring terms. Cluster trend
//! compares document counts in the first vs last third of the window:
//! +20% is rising, −20% is falling, anything between is stable.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use newsloom_core::outputs::{AgentOutput, TopicCluster, TopicTrend, TopicsOutput};
use newsloom_core::routes::TaskKind;
use newsloom_core::text::{stem, tokenize};
use newsloom_core::types::Document;
use tracing::debug;

use crate::context::{Agent, AgentContext, AgentError, AgentResult};
use crate::lexicon::is_stopword;

/// Cluster count bounds
pub const MIN_TOPICS: usize = 3;
pub const MAX_TOPICS: usize = 8;
/// Terms listed per cluster
const TERMS_PER_TOPIC: usize = 6;
/// Relative change treated as a trend
const TREND_THRESHOLD: f64 = 0.2;

/// Term-anchored topic clustering
#[derive(Debug, Default)]
pub struct TopicsAgent;

impl TopicsAgent {
    /// Trend of a cluster's documents across the window thirds
    fn trend(dates: &[NaiveDate], window_start: NaiveDate, window_end: NaiveDate) -> TopicTrend {
        let span_days = (window_end - window_start).num_days().max(1);
        let third = span_days / 3;
        let first_cutoff = window_start + chrono::Duration::days(third);
        let last_cutoff = window_end - chrono::Duration::days(third);

        let first = dates.iter().filter(|d| **d <= first_cutoff).count();
        let last = dates.iter().filter(|d| **d >= last_cutoff).count();

        #[allow(clippy::cast_precision_loss)]
        let (first, last) = (first as f64, last as f64);
        if first == 0.0 && last == 0.0 {
            return TopicTrend::Stable;
        }
        if last >= first * (1.0 + TREND_THRESHOLD) {
            TopicTrend::Rising
        } else if last <= first * (1.0 - TREND_THRESHOLD) {
            TopicTrend::Falling
        } else {
            TopicTrend::Stable
        }
    }
}

#[async_trait]
impl Agent for TopicsAgent {
    fn name(&self) -> &'static str {
        "topics"
    }

    fn task(&self) -> TaskKind {
        TaskKind::Topics
    }

    fn parallel_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        if ctx.docs.is_empty() {
            return Err(AgentError::no_data(self.name(), "no documents to cluster"));
        }
        let docs: &[Document] = &ctx.docs;

        let doc_terms: Vec<HashSet<String>> = docs
            .iter()
            .map(|d| {
                tokenize(&format!("{} {}", d.title, d.snippet))
                    .into_iter()
                    .filter(|t| !is_stopword(t) && t.chars().count() > 2)
                    .map(|t| stem(&t))
                    .collect()
            })
            .collect();

        let mut term_freq: HashMap<&String, usize> = HashMap::new();
        for terms in &doc_terms {
            for term in terms {
                *term_freq.entry(term).or_insert(0) += 1;
            }
        }
        let mut anchors: Vec<(&String, usize)> = term_freq.into_iter().collect();
        anchors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let window_end = chrono::Utc::now().date_naive();
        let window_start = (chrono::Utc::now() - ctx.params.window.duration()).date_naive();

        let mut claimed: HashSet<usize> = HashSet::new();
        let mut topics: Vec<TopicCluster> = Vec::new();
        for (anchor, _) in anchors {
            if topics.len() >= MAX_TOPICS {
                break;
            }
            let members: Vec<usize> = doc_terms
                .iter()
                .enumerate()
                .filter(|(i, terms)| !claimed.contains(i) && terms.contains(anchor))
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                continue;
            }

            // top co-occurring terms across the member docs
            let mut co: HashMap<&String, usize> = HashMap::new();
            for &i in &members {
                for term in &doc_terms[i] {
                    *co.entry(term).or_insert(0) += 1;
                }
            }
            let mut co: Vec<(&String, usize)> = co.into_iter().collect();
            co.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            let terms: Vec<String> = co
                .into_iter()
                .take(TERMS_PER_TOPIC)
                .map(|(t, _)| t.clone())
                .collect();

            let dates: Vec<NaiveDate> = members.iter().map(|&i| docs[i].published_date).collect();
            let trend = Self::trend(&dates, window_start, window_end);

            for &i in &members {
                claimed.insert(i);
            }
            topics.push(TopicCluster {
                label: anchor.clone(),
                size: members.len(),
                terms,
                trend,
            });
            if claimed.len() == docs.len() {
                break;
            }
        }

        if topics.is_empty() {
            return Err(AgentError::no_data(self.name(), "no content terms found"));
        }
        debug!(topics = topics.len(), "topic clustering complete");
        Ok(AgentOutput::Topics(TopicsOutput { topics }))
    }
}
