//! Competitor news agent
//!
//! Compares coverage across source domains: top-20 stemmed term sets
//! per domain, pairwise Jaccard overlap, a stance per domain from its
//! coverage share, and the topics each domain leaves to its rivals.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use newsloom_core::outputs::{
    AgentOutput, CompetitorOutput, DomainOverlap, DomainPositioning, Stance,
};
use newsloom_core::routes::TaskKind;
use newsloom_core::text::{normalize_domain, stem, tokenize};
use tracing::debug;

use crate::context::{Agent, AgentContext, AgentError, AgentResult};
use crate::lexicon::is_stopword;

/// Stemmed terms compared per domain
pub const TERMS_PER_DOMAIN: usize = 20;
/// Coverage share (vs the leader) above which a domain is a fast follower
const FAST_FOLLOWER_SHARE: f64 = 0.5;
/// Gap terms reported
const MAX_GAPS: usize = 8;

/// Domain-level competitive comparison
#[derive(Debug, Default)]
pub struct CompetitorNewsAgent;

/// Jaccard similarity of two sets
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

#[async_trait]
impl Agent for CompetitorNewsAgent {
    fn name(&self) -> &'static str {
        "competitor_news"
    }

    fn task(&self) -> TaskKind {
        TaskKind::Competitors
    }

    fn parallel_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        if ctx.docs.is_empty() {
            return Err(AgentError::no_data(self.name(), "no documents to compare"));
        }

        // requested domains first; otherwise whatever the corpus has
        let requested: Vec<String> = ctx
            .params
            .domains
            .iter()
            .map(|d| normalize_domain(d))
            .collect();

        // BTreeMap keeps domain iteration deterministic
        let mut coverage: BTreeMap<String, usize> = BTreeMap::new();
        let mut terms: BTreeMap<String, Vec<(String, usize)>> = BTreeMap::new();
        for doc in ctx.docs.iter() {
            let Some(domain) = doc.domain() else { continue };
            if !requested.is_empty() && !requested.contains(&domain) {
                continue;
            }
            *coverage.entry(domain.clone()).or_insert(0) += 1;
            let counts = terms.entry(domain).or_default();
            for token in tokenize(&format!("{} {}", doc.title, doc.snippet)) {
                if is_stopword(&token) || token.chars().count() <= 2 {
                    continue;
                }
                let stemmed = stem(&token);
                match counts.iter_mut().find(|(t, _)| *t == stemmed) {
                    Some(entry) => entry.1 += 1,
                    None => counts.push((stemmed, 1)),
                }
            }
        }

        if coverage.is_empty() {
            return Err(AgentError::no_data(
                self.name(),
                "no documents with source domains",
            ));
        }

        let top_terms: BTreeMap<String, HashSet<String>> = terms
            .into_iter()
            .map(|(domain, mut counts)| {
                counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                let set: HashSet<String> = counts
                    .into_iter()
                    .take(TERMS_PER_DOMAIN)
                    .map(|(t, _)| t)
                    .collect();
                (domain, set)
            })
            .collect();

        let domains: Vec<String> = coverage.keys().cloned().collect();
        let mut overlap = Vec::new();
        for (i, a) in domains.iter().enumerate() {
            for b in domains.iter().skip(i + 1) {
                overlap.push(DomainOverlap {
                    a: a.clone(),
                    b: b.clone(),
                    jaccard: jaccard(&top_terms[a], &top_terms[b]),
                });
            }
        }

        let leader_coverage = coverage.values().copied().max().unwrap_or(1);
        let positioning: Vec<DomainPositioning> = coverage
            .iter()
            .map(|(domain, &count)| {
                #[allow(clippy::cast_precision_loss)]
                let share = count as f64 / leader_coverage as f64;
                let stance = if count == leader_coverage {
                    Stance::Leader
                } else if share >= FAST_FOLLOWER_SHARE {
                    Stance::FastFollower
                } else {
                    Stance::Niche
                };
                DomainPositioning {
                    domain: domain.clone(),
                    stance,
                    coverage: count,
                }
            })
            .collect();

        // gaps: terms covered by at least two rivals but missed by some domain
        let mut gaps: Vec<String> = Vec::new();
        for (domain, own_terms) in &top_terms {
            let mut rival_terms: Vec<&String> = Vec::new();
            for (other, other_terms) in &top_terms {
                if other != domain {
                    rival_terms.extend(other_terms.iter());
                }
            }
            for term in rival_terms {
                let rivals_covering = top_terms
                    .iter()
                    .filter(|(d, ts)| *d != domain && ts.contains(term))
                    .count();
                if rivals_covering >= 2 && !own_terms.contains(term) && !gaps.contains(term) {
                    gaps.push(term.clone());
                }
            }
        }
        gaps.sort();
        gaps.truncate(MAX_GAPS);

        debug!(
            domains = domains.len(),
            pairs = overlap.len(),
            gaps = gaps.len(),
            "competitor comparison complete"
        );
        Ok(AgentOutput::CompetitorNews(CompetitorOutput {
            domains,
            overlap,
            positioning,
            gaps,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentParams;
    use chrono::NaiveDate;
    use newsloom_core::budget::{BudgetLedger, BudgetLimits};
    use newsloom_core::routes::RouteTable;
    use newsloom_core::types::Document;
    use newsloom_providers::{CostTable, ModelRouter, StubProvider};
    use std::sync::Arc;

    fn ctx(docs: Vec<Document>, domains: Vec<String>) -> AgentContext {
        let params = AgentParams {
            domains,
            ..AgentParams::default()
        };
        AgentContext::new(
            docs,
            params,
            Arc::new(ModelRouter::new(
                vec![Arc::new(StubProvider::answering("claude-3-5-sonnet", "ok"))],
                CostTable::empty(),
            )),
            Arc::new(RouteTable::default()),
            Arc::new(BudgetLedger::new(BudgetLimits::default())),
        )
    }

    fn doc(domain: &str, text: &str) -> Document {
        Document::new(
            Some(uuid::Uuid::new_v4().to_string()),
            text,
            Some(format!("https://{domain}/item")),
            NaiveDate::from_ymd_opt(2025, 6, 1),
            "en",
            1.0,
            text,
        )
    }

    #[test]
    fn test_jaccard_bounds() {
        let a: HashSet<String> = ["x", "y"].iter().map(|s| (*s).to_string()).collect();
        let b: HashSet<String> = ["y", "z"].iter().map(|s| (*s).to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
        assert!((jaccard(&a, &a) - 1.0).abs() < 1e-12);
        assert!((jaccard(&HashSet::new(), &HashSet::new())).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_leader_and_niche_stances() {
        let mut docs = Vec::new();
        for i in 0..6 {
            docs.push(doc("big.example", &format!("chip market coverage {i}")));
        }
        docs.push(doc("small.example", "chip market note"));
        let out = CompetitorNewsAgent.run(&ctx(docs, vec![])).await.unwrap();
        let AgentOutput::CompetitorNews(result) = out else {
            panic!("wrong output")
        };
        let stance_of = |d: &str| {
            result
                .positioning
                .iter()
                .find(|p| p.domain == d)
                .map(|p| p.stance)
                .unwrap()
        };
        assert_eq!(stance_of("big.example"), Stance::Leader);
        assert_eq!(stance_of("small.example"), Stance::Niche);
    }

    #[tokio::test]
    async fn test_overlap_matrix_pairs() {
        let docs = vec![
            doc("a.example", "chip shortage factory output"),
            doc("b.example", "chip shortage supply chain"),
            doc("c.example", "celebrity film festival gossip"),
        ];
        let out = CompetitorNewsAgent.run(&ctx(docs, vec![])).await.unwrap();
        let AgentOutput::CompetitorNews(result) = out else {
            panic!("wrong output")
        };
        assert_eq!(result.overlap.len(), 3);
        let ab = result
            .overlap
            .iter()
            .find(|o| o.a == "a.example" && o.b == "b.example")
            .unwrap();
        let ac = result
            .overlap
            .iter()
            .find(|o| o.a == "a.example" && o.b == "c.example")
            .unwrap();
        assert!(ab.jaccard > ac.jaccard);
    }

    #[tokio::test]
    async fn test_requested_domains_filter() {
        let docs = vec![
            doc("keep.example", "chip news"),
            doc("drop.example", "chip news"),
        ];
        let out = CompetitorNewsAgent
            .run(&ctx(docs, vec!["keep.example".to_string()]))
            .await
            .unwrap();
        let AgentOutput::CompetitorNews(result) = out else {
            panic!("wrong output")
        };
        assert_eq!(result.domains, vec!["keep.example".to_string()]);
    }

    #[tokio::test]
    async fn test_docs_without_urls_is_no_data() {
        let mut d = doc("x.example", "text");
        d.url = None;
        assert!(CompetitorNewsAgent.run(&ctx(vec![d], vec![])).await.is_err());
    }
}
