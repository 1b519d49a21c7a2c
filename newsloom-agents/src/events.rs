//! Event extraction and causal linking
//!
//! Per-document event candidates are clustered by temporal proximity
//! and shared entities, ordered into a timeline, and linked causally:
//! adjacent events sharing entities get a deterministic confidence from
//! entity overlap and temporal distance. Non-adjacent candidate links
//! ("alternative interpretations") are only kept when the model assist
//! confirms the batch — degradation or a failed route drops them.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use newsloom_core::outputs::{AgentOutput, CausalLink, EventsOutput, NewsEvent};
use newsloom_core::routes::TaskKind;
use newsloom_core::types::Document;
use tracing::{debug, info};

use crate::competitor::jaccard;
use crate::context::{Agent, AgentContext, AgentError, AgentResult};
use crate::graph::GraphAgent;

/// Events kept per query
const MAX_EVENTS: usize = 10;
/// Output token cap for the link-assist call
const ASSIST_MAX_TOKENS: u32 = 128;
/// Confidence discount for non-adjacent (alternative) links
const ALTERNATIVE_DISCOUNT: f64 = 0.5;

/// Temporal event clustering with causal inference
#[derive(Debug, Default)]
pub struct EventsAgent;

struct RawEvent {
    date: NaiveDate,
    title: String,
    entities: Vec<String>,
    doc_id: String,
}

impl EventsAgent {
    fn cluster(mut raw: Vec<RawEvent>, merge_gap_days: i64) -> Vec<NewsEvent> {
        raw.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.doc_id.cmp(&b.doc_id)));
        let mut events: Vec<NewsEvent> = Vec::new();
        for candidate in raw {
            let joined = events.iter().position(|event| {
                let gap = (candidate.date - event.time_range[1]).num_days().abs();
                gap <= merge_gap_days
                    && candidate
                        .entities
                        .iter()
                        .any(|e| event.entities.contains(e))
            });
            match joined {
                Some(index) => {
                    let event = &mut events[index];
                    event.time_range[0] = event.time_range[0].min(candidate.date);
                    event.time_range[1] = event.time_range[1].max(candidate.date);
                    for entity in candidate.entities {
                        if !event.entities.contains(&entity) {
                            event.entities.push(entity);
                        }
                    }
                    event.source_doc_ids.push(candidate.doc_id);
                }
                None => {
                    let id = format!("ev{}", events.len() + 1);
                    events.push(NewsEvent {
                        id,
                        title: candidate.title,
                        time_range: [candidate.date, candidate.date],
                        entities: candidate.entities,
                        source_doc_ids: vec![candidate.doc_id],
                    });
                }
            }
        }
        events
    }

    fn link_confidence(a: &NewsEvent, b: &NewsEvent) -> f64 {
        let set_a: HashSet<String> = a.entities.iter().cloned().collect();
        let set_b: HashSet<String> = b.entities.iter().cloned().collect();
        let overlap = jaccard(&set_a, &set_b);
        let gap_days = (b.time_range[0] - a.time_range[1]).num_days().max(0);
        #[allow(clippy::cast_precision_loss)]
        let proximity = 1.0 / (1.0 + gap_days as f64);
        (overlap * proximity).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl Agent for EventsAgent {
    fn name(&self) -> &'static str {
        "events"
    }

    fn task(&self) -> TaskKind {
        TaskKind::Events
    }

    fn parallel_safe(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        if ctx.docs.is_empty() {
            return Err(AgentError::no_data(self.name(), "no documents to extract from"));
        }

        let docs: &[Document] = &ctx.docs;
        let entities = GraphAgent::extract_entities(docs);
        let raw: Vec<RawEvent> = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| RawEvent {
                date: doc.published_date,
                title: doc.title.clone(),
                entities: entities
                    .iter()
                    .filter(|(_, in_docs)| in_docs.contains(&i))
                    .map(|(e, _)| e.clone())
                    .collect(),
                doc_id: doc
                    .article_id
                    .clone()
                    .unwrap_or_else(|| format!("doc{i}")),
            })
            .collect();

        let span_days = ctx.params.window.duration().num_days().max(1);
        let merge_gap_days = (span_days / 10).max(1);
        let mut events = Self::cluster(raw, merge_gap_days);
        events.truncate(MAX_EVENTS);

        // timeline: start date, then id
        let mut timeline: Vec<(NaiveDate, String)> = events
            .iter()
            .map(|e| (e.time_range[0], e.id.clone()))
            .collect();
        timeline.sort();
        let timeline: Vec<String> = timeline.into_iter().map(|(_, id)| id).collect();

        // adjacent causal links
        let mut causal_links: Vec<CausalLink> = Vec::new();
        for pair in events.windows(2) {
            let confidence = Self::link_confidence(&pair[0], &pair[1]);
            if confidence > 0.0 {
                causal_links.push(CausalLink {
                    cause: pair[0].id.clone(),
                    effect: pair[1].id.clone(),
                    confidence,
                });
            }
        }

        // alternative interpretations: non-adjacent pairs, kept only
        // when the model assist confirms the batch
        if !ctx.params.skip_alternatives && events.len() > 2 {
            let mut alternatives: Vec<CausalLink> = Vec::new();
            for (i, a) in events.iter().enumerate() {
                for b in events.iter().skip(i + 2) {
                    let confidence = Self::link_confidence(a, b) * ALTERNATIVE_DISCOUNT;
                    if confidence > 0.0 {
                        alternatives.push(CausalLink {
                            cause: a.id.clone(),
                            effect: b.id.clone(),
                            confidence,
                        });
                    }
                }
            }
            if !alternatives.is_empty() {
                let route = ctx.route(TaskKind::Events);
                let prompt = format!(
                    "Could these news events be causally related? {}",
                    alternatives
                        .iter()
                        .map(|l| format!("{}→{}", l.cause, l.effect))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                match ctx
                    .router
                    .call(&route, &prompt, docs, ASSIST_MAX_TOKENS, &ctx.ledger)
                    .await
                {
                    Ok(_) => causal_links.extend(alternatives),
                    Err(err) => {
                        debug!(error = %err, "link assist unavailable, dropping alternatives");
                    }
                }
            }
        }

        info!(
            events = events.len(),
            links = causal_links.len(),
            "event extraction complete"
        );
        Ok(AgentOutput::Events(EventsOutput {
            events,
            timeline,
            causal_links,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentParams;
    use chrono::Utc;
    use newsloom_core::budget::{BudgetLedger, BudgetLimits};
    use newsloom_core::routes::RouteTable;
    use newsloom_core::types::Window;
    use newsloom_providers::{CostTable, ModelRouter, StubProvider};
    use std::sync::Arc;

    fn doc(id: &str, title: &str, days_ago: i64) -> Document {
        Document::new(
            Some(id.to_string()),
            title,
            None,
            Some(Utc::now().date_naive() - chrono::Duration::days(days_ago)),
            "en",
            1.0,
            title,
        )
    }

    fn ctx(docs: Vec<Document>, skip_alternatives: bool) -> AgentContext {
        let params = AgentParams {
            window: Window::M1,
            skip_alternatives,
            ..AgentParams::default()
        };
        AgentContext::new(
            docs,
            params,
            Arc::new(ModelRouter::new(
                vec![Arc::new(StubProvider::answering("gpt-4o", "plausible"))],
                CostTable::empty(),
            )),
            Arc::new(RouteTable::default()),
            Arc::new(BudgetLedger::new(BudgetLimits::default())),
        )
    }

    fn merger_corpus() -> Vec<Document> {
        vec![
            doc("a1", "Acme announces merger with Initech", 20),
            doc("a2", "Acme merger approved by Initech board", 19),
            doc("a3", "Acme stock surges after merger news", 10),
            doc("a4", "Initech customers react to Acme deal", 2),
        ]
    }

    #[tokio::test]
    async fn test_clustering_merges_nearby_shared_entity_docs() {
        let out = EventsAgent.run(&ctx(merger_corpus(), true)).await.unwrap();
        let AgentOutput::Events(result) = out else {
            panic!("wrong output")
        };
        // a1+a2 are one day apart sharing Acme/Initech: one event
        assert!(result.events.len() < 4);
        let first = &result.events[0];
        assert!(first.source_doc_ids.len() >= 2);
        assert!(first.time_range[0] <= first.time_range[1]);
    }

    #[tokio::test]
    async fn test_timeline_is_date_ordered() {
        let out = EventsAgent.run(&ctx(merger_corpus(), true)).await.unwrap();
        let AgentOutput::Events(result) = out else {
            panic!("wrong output")
        };
        let start_of = |id: &String| {
            result
                .events
                .iter()
                .find(|e| &e.id == id)
                .unwrap()
                .time_range[0]
        };
        for pair in result.timeline.windows(2) {
            assert!(start_of(&pair[0]) <= start_of(&pair[1]));
        }
    }

    #[tokio::test]
    async fn test_causal_confidence_in_unit_range() {
        let out = EventsAgent.run(&ctx(merger_corpus(), true)).await.unwrap();
        let AgentOutput::Events(result) = out else {
            panic!("wrong output")
        };
        assert!(!result.causal_links.is_empty());
        for link in &result.causal_links {
            assert!((0.0..=1.0).contains(&link.confidence));
        }
    }

    #[tokio::test]
    async fn test_alternatives_dropped_when_degraded() {
        let with = EventsAgent.run(&ctx(merger_corpus(), false)).await.unwrap();
        let without = EventsAgent.run(&ctx(merger_corpus(), true)).await.unwrap();
        let (AgentOutput::Events(with), AgentOutput::Events(without)) = (with, without) else {
            panic!("wrong output")
        };
        assert!(with.causal_links.len() >= without.causal_links.len());
    }

    #[tokio::test]
    async fn test_empty_docs_is_no_data() {
        assert!(EventsAgent.run(&ctx(vec![], true)).await.is_err());
    }
}
