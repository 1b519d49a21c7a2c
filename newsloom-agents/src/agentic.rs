//! Iterative retrieval-augmented answering
//!
//! Up to N iterations (N ∈ 1..=3): generate an answer over the current
//! evidence, self-check whether the evidence actually covers the
//! question, and if not reformulate the query and retrieve again.
//! Re-retrieval may introduce documents that were not in the original
//! snapshot; the seen-set dedups by article id across iterations. The
//! loop stops on the first of: sufficiency, the iteration cap, or the
//! ledger refusing the next call.

use std::collections::HashSet;

use async_trait::async_trait;
use newsloom_core::outputs::{AgentOutput, AskOutput, AskStep};
use newsloom_core::routes::TaskKind;
use newsloom_core::text::{stem, tokenize};
use newsloom_core::types::Document;
use newsloom_providers::estimate_tokens;
use newsloom_retrieval::RetrievalParams;
use tracing::{debug, info};

use crate::context::{Agent, AgentContext, AgentError, AgentResult};
use crate::lexicon::is_stopword;

/// Evidence coverage above which the self-check reads sufficient
pub const SUFFICIENCY_THRESHOLD: f64 = 0.6;
/// Output token cap per answer attempt
const ANSWER_MAX_TOKENS: u32 = 512;
/// Follow-up questions offered
const MAX_FOLLOWUPS: usize = 3;

/// Iterative answering over re-retrieved evidence
#[derive(Debug, Default)]
pub struct AgenticRagAgent;

impl AgenticRagAgent {
    /// Fraction of query stems present anywhere in the evidence
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn evidence_coverage(query: &str, docs: &[Document]) -> f64 {
        let stems: Vec<String> = tokenize(query)
            .iter()
            .filter(|t| !is_stopword(t))
            .map(|t| stem(t))
            .collect();
        if stems.is_empty() {
            return 1.0;
        }
        let mut corpus: HashSet<String> = HashSet::new();
        for doc in docs {
            for token in tokenize(&format!("{} {}", doc.title, doc.snippet)) {
                corpus.insert(stem(&token));
            }
        }
        let covered = stems.iter().filter(|s| corpus.contains(*s)).count();
        covered as f64 / stems.len() as f64
    }

    /// Deterministic query reformulation for the next iteration
    fn reformulate(query: &str, docs: &[Document], used: &HashSet<String>) -> String {
        // drop question boilerplate, then widen with the strongest
        // corpus term not already in the query
        let kept: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| !matches!(t.as_str(), "what" | "why" | "how" | "when" | "who" | "did"))
            .collect();
        let base = if kept.is_empty() {
            query.to_string()
        } else {
            kept.join(" ")
        };
        let base_stems: Vec<String> = tokenize(&base).iter().map(|t| stem(t)).collect();

        let mut counts: Vec<(String, usize)> = Vec::new();
        for doc in docs {
            for token in tokenize(&doc.title) {
                if is_stopword(&token)
                    || token.chars().count() <= 2
                    || base_stems.contains(&stem(&token))
                    || used.contains(&token)
                {
                    continue;
                }
                match counts.iter_mut().find(|(t, _)| *t == token) {
                    Some(entry) => entry.1 += 1,
                    None => counts.push((token, 1)),
                }
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        match counts.first() {
            Some((term, _)) => format!("{base} {term}"),
            None => base,
        }
    }
}

#[async_trait]
impl Agent for AgenticRagAgent {
    fn name(&self) -> &'static str {
        "agentic_rag"
    }

    fn task(&self) -> TaskKind {
        TaskKind::Ask
    }

    fn parallel_safe(&self) -> bool {
        false
    }

    #[allow(clippy::too_many_lines)]
    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        let route = ctx.route(TaskKind::Ask);
        let depth = ctx.params.depth.clamp(1, 3);
        let mut docs: Vec<Document> = ctx.docs.as_ref().clone();
        let mut seen: HashSet<String> = docs
            .iter()
            .filter_map(|d| d.article_id.clone())
            .collect();
        let mut used_terms: HashSet<String> = HashSet::new();
        let mut query = ctx.params.query.clone();
        let mut steps: Vec<AskStep> = Vec::new();
        let mut answer = String::new();

        for iteration in 1..=depth {
            if ctx.cancelled() {
                return Err(AgentError::internal(self.name(), "request cancelled"));
            }

            let prompt = format!(
                "Answer the question using only the provided sources. \
                 Question: {query}"
            );
            let call = ctx
                .router
                .call(&route, &prompt, &docs, ANSWER_MAX_TOKENS, &ctx.ledger)
                .await
                .map_err(|e| AgentError::from_engine(self.name(), &e))?;
            answer = call.text;

            let sufficient = ctx.params.self_check
                && Self::evidence_coverage(&query, &docs) >= SUFFICIENCY_THRESHOLD;
            let mut new_docs = 0usize;

            let stop = sufficient || iteration == depth;
            if !stop {
                // the next iteration needs one more model call at least
                let next_estimate = estimate_tokens(&query) + u64::from(ANSWER_MAX_TOKENS);
                if !ctx.ledger.can_afford(next_estimate, 0.5) {
                    ctx.ledger.add_warning("degradation_depth_reduced");
                    info!(iteration, "budget stops the answering loop early");
                    steps.push(AskStep {
                        iteration,
                        query: query.clone(),
                        sufficient,
                        new_docs: 0,
                    });
                    break;
                }

                let next_query = Self::reformulate(&query, &docs, &used_terms);
                for token in tokenize(&next_query) {
                    used_terms.insert(token);
                }
                if let Some(retriever) = &ctx.retriever {
                    let mut params =
                        RetrievalParams::new(next_query.clone(), ctx.params.window);
                    params.lang = ctx.params.lang;
                    params.sources = ctx.params.sources.clone();
                    params.k_final = ctx.params.k_final;
                    params.use_rerank = ctx.params.use_rerank;
                    match retriever.retrieve(&params).await {
                        Ok(found) => {
                            for doc in found {
                                let fresh = doc
                                    .article_id
                                    .as_ref()
                                    .is_none_or(|id| seen.insert(id.clone()));
                                if fresh {
                                    docs.push(doc);
                                    new_docs += 1;
                                }
                            }
                        }
                        Err(err) => {
                            debug!(error = %err, "re-retrieval failed, keeping current evidence");
                        }
                    }
                }
                steps.push(AskStep {
                    iteration,
                    query: query.clone(),
                    sufficient,
                    new_docs,
                });
                query = next_query;
                continue;
            }

            steps.push(AskStep {
                iteration,
                query: query.clone(),
                sufficient,
                new_docs,
            });
            break;
        }

        // follow-ups from the freshest evidence
        let mut followups: Vec<String> = Vec::new();
        let mut titles: Vec<&Document> = docs.iter().collect();
        titles.sort_by(|a, b| {
            b.published_date
                .cmp(&a.published_date)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        for doc in titles.iter().take(MAX_FOLLOWUPS) {
            followups.push(format!("What changed since \"{}\"?", doc.title));
        }

        info!(
            iterations = steps.len(),
            evidence = docs.len(),
            "iterative answering finished"
        );
        Ok(AgentOutput::AgenticRag(AskOutput {
            answer,
            steps,
            followups,
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
    use newsloom_core::types::{Language, Window};
    use newsloom_providers::{CostTable, ModelRouter, StubProvider};
    use newsloom_retrieval::{InMemoryIndex, Retriever, StoredArticle};
    use std::sync::Arc;
    use std::time::Duration;

    fn doc(id: &str, text: &str) -> Document {
        Document::new(
            Some(id.to_string()),
            text,
            None,
            Some(Utc::now().date_naive()),
            "en",
            1.0,
            text,
        )
    }

    fn ctx(docs: Vec<Document>, depth: u8, self_check: bool) -> AgentContext {
        let params = AgentParams {
            query: "chip shortage impact".to_string(),
            depth,
            self_check,
            window: Window::W1,
            ..AgentParams::default()
        };
        AgentContext::new(
            docs,
            params,
            Arc::new(ModelRouter::new(
                vec![Arc::new(StubProvider::answering("gpt-4o", "the answer"))],
                CostTable::empty(),
            )),
            Arc::new(RouteTable::default()),
            Arc::new(BudgetLedger::new(BudgetLimits::default())),
        )
    }

    fn retriever_with(extra: &[(&str, &str)]) -> Arc<Retriever> {
        let index = InMemoryIndex::new(128);
        for (id, text) in extra {
            index.insert(StoredArticle {
                article_id: (*id).to_string(),
                title: (*text).to_string(),
                url: None,
                published_date: Utc::now().date_naive(),
                language: Language::En,
                content: (*text).to_string(),
                source_domain: None,
            });
        }
        Arc::new(Retriever::new(Arc::new(index), None, Duration::ZERO))
    }

    #[test]
    fn test_coverage_full_and_partial() {
        let docs = vec![doc("a", "chip shortage hits factories")];
        let full = AgenticRagAgent::evidence_coverage("chip shortage", &docs);
        assert!((full - 1.0).abs() < 1e-12);
        let partial = AgenticRagAgent::evidence_coverage("chip shortage pricing impact", &docs);
        assert!(partial < 1.0);
    }

    #[tokio::test]
    async fn test_stops_first_iteration_when_sufficient() {
        let docs = vec![doc("a", "chip shortage impact on factories")];
        let out = AgenticRagAgent.run(&ctx(docs, 3, true)).await.unwrap();
        let AgentOutput::AgenticRag(result) = out else {
            panic!("wrong output")
        };
        assert_eq!(result.steps.len(), 1);
        assert!(result.steps[0].sufficient);
        assert_eq!(result.answer, "the answer");
    }

    #[tokio::test]
    async fn test_iterates_and_reretrieves_when_insufficient() {
        let docs = vec![doc("a", "unrelated celebrity coverage")];
        let mut context = ctx(docs, 3, true);
        context = context.with_retriever(retriever_with(&[
            ("b", "chip shortage impact widens"),
            ("c", "chip makers respond to shortage"),
        ]));
        let out = AgenticRagAgent.run(&context).await.unwrap();
        let AgentOutput::AgenticRag(result) = out else {
            panic!("wrong output")
        };
        assert!(result.steps.len() >= 2);
        assert!(!result.steps[0].sufficient);
        let added: usize = result.steps.iter().map(|s| s.new_docs).sum();
        assert!(added >= 1, "re-retrieval should add documents");
    }

    #[tokio::test]
    async fn test_depth_caps_iterations() {
        let docs = vec![doc("a", "unrelated coverage entirely")];
        let out = AgenticRagAgent.run(&ctx(docs, 1, true)).await.unwrap();
        let AgentOutput::AgenticRag(result) = out else {
            panic!("wrong output")
        };
        assert_eq!(result.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_stops_loop_with_warning() {
        let docs = vec![doc("a", "unrelated coverage entirely")];
        let params = AgentParams {
            query: "chip shortage impact".to_string(),
            depth: 3,
            self_check: true,
            ..AgentParams::default()
        };
        // the first answer fits; its reported usage leaves too little
        // for a second iteration
        let ledger = Arc::new(BudgetLedger::new(BudgetLimits {
            max_tokens: 2000,
            max_cost_cents: 100.0,
            max_duration: Duration::from_secs(30),
        }));
        let context = AgentContext::new(
            docs,
            params,
            Arc::new(ModelRouter::new(
                vec![Arc::new(StubProvider::with_usage(
                    "gpt-4o",
                    "partial answer",
                    40,
                    1500,
                ))],
                CostTable::empty(),
            )),
            Arc::new(RouteTable::default()),
            ledger.clone(),
        );
        let out = AgenticRagAgent.run(&context).await.unwrap();
        let AgentOutput::AgenticRag(result) = out else {
            panic!("wrong output")
        };
        assert_eq!(result.steps.len(), 1);
        assert!(ledger
            .warnings()
            .contains(&"degradation_depth_reduced".to_string()));
    }

    #[tokio::test]
    async fn test_router_failure_is_agent_error() {
        let context = AgentContext::new(
            vec![doc("a", "chip shortage impact")],
            AgentParams {
                query: "chip shortage".to_string(),
                ..AgentParams::default()
            },
            Arc::new(ModelRouter::new(
                vec![Arc::new(StubProvider::failing("gpt-4o"))],
                CostTable::empty(),
            )),
            Arc::new(RouteTable::default()),
            Arc::new(BudgetLedger::new(BudgetLimits::default())),
        );
        let err = AgenticRagAgent.run(&context).await.unwrap_err();
        assert_eq!(err.agent, "agentic_rag");
    }
}
