//! Knowledge-graph agent
//!
//! Builds a transient per-query graph: entity extraction (model-assisted
//! when the budget allows, regex otherwise), co-occurrence edges, BFS
//! traversal from query-matched seeds with a hop cap of 4, and a
//! size-bounded subgraph. The answer text comes from the model route;
//! when every candidate fails, a deterministic fallback sentence keeps
//! the graph usable.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use async_trait::async_trait;
use newsloom_core::outputs::{AgentOutput, GraphEdge, GraphNode, GraphOutput};
use newsloom_core::routes::TaskKind;
use newsloom_core::text::tokenize;
use newsloom_core::types::Document;
use regex::Regex;
use tracing::{debug, info};

use crate::context::{Agent, AgentContext, AgentError, AgentResult};
use crate::lexicon::is_stopword;

/// Hard cap on traversal depth
pub const MAX_HOPS: u8 = 4;
/// Paths reported per query
const MAX_PATHS: usize = 10;
/// Output token cap for the answer synthesis call
const ANSWER_MAX_TOKENS: u32 = 256;

static ENTITY_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-ZА-ЯЁ][A-Za-zА-Яа-яЁё0-9]+(?:\s+[A-ZА-ЯЁ][A-Za-zА-Яа-яЁё0-9]+){0,3}\b")
        .expect("entity pattern compiles")
});

static ORG_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Inc|Corp|Ltd|Group|Bank|Labs|AG)$").expect("org suffix pattern compiles")
});

/// Co-occurrence knowledge graph over the document snapshot
#[derive(Debug, Default)]
pub struct GraphAgent;

impl GraphAgent {
    /// Regex entity extraction, the always-available fallback extractor
    #[must_use]
    pub fn extract_entities(docs: &[Document]) -> Vec<(String, Vec<usize>)> {
        // entity → docs it appears in, insertion-ordered by BTreeMap
        let mut mentions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (doc_idx, doc) in docs.iter().enumerate() {
            let text = format!("{}. {}", doc.title, doc.snippet);
            for m in ENTITY_SHAPE.find_iter(&text) {
                let candidate = m.as_str().trim().to_string();
                let lower = candidate.to_lowercase();
                if is_stopword(&lower) || candidate.chars().count() < 3 {
                    continue;
                }
                let entry = mentions.entry(candidate).or_default();
                if !entry.contains(&doc_idx) {
                    entry.push(doc_idx);
                }
            }
        }
        // keep entities seen in more than one place, or any when sparse
        let repeated: Vec<(String, Vec<usize>)> = mentions
            .iter()
            .filter(|(_, docs)| docs.len() > 1)
            .map(|(e, d)| (e.clone(), d.clone()))
            .collect();
        if repeated.len() >= 3 {
            repeated
        } else {
            mentions.into_iter().collect()
        }
    }

    fn node_type(label: &str) -> &'static str {
        if ORG_SUFFIX.is_match(label) || label.chars().all(|c| c.is_uppercase() || c.is_numeric())
        {
            "org"
        } else {
            "entity"
        }
    }

    /// BFS from the seed set, bounded by `hop_limit`
    ///
    /// Returns visited node ids and the parent chain for path recovery.
    fn traverse(
        adjacency: &HashMap<String, Vec<String>>,
        seeds: &[String],
        hop_limit: u8,
    ) -> (HashSet<String>, HashMap<String, String>) {
        let mut visited: HashSet<String> = seeds.iter().cloned().collect();
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut frontier: VecDeque<(String, u8)> =
            seeds.iter().map(|s| (s.clone(), 0)).collect();
        while let Some((node, hops)) = frontier.pop_front() {
            if hops >= hop_limit {
                continue;
            }
            let Some(neighbors) = adjacency.get(&node) else {
                continue;
            };
            for neighbor in neighbors {
                if visited.insert(neighbor.clone()) {
                    parent.insert(neighbor.clone(), node.clone());
                    frontier.push_back((neighbor.clone(), hops + 1));
                }
            }
        }
        (visited, parent)
    }
}

#[async_trait]
impl Agent for GraphAgent {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn task(&self) -> TaskKind {
        TaskKind::Graph
    }

    fn parallel_safe(&self) -> bool {
        false
    }

    #[allow(clippy::too_many_lines)]
    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        if ctx.docs.is_empty() {
            return Err(AgentError::no_data(self.name(), "no documents to graph"));
        }
        let hop_limit = ctx.params.hop_limit.clamp(1, MAX_HOPS);

        let entities = Self::extract_entities(&ctx.docs);
        if entities.is_empty() {
            return Err(AgentError::no_data(self.name(), "no entities extracted"));
        }

        // co-occurrence edges, weighted by shared-document count
        let mut edge_counts: BTreeMap<(String, String), usize> = BTreeMap::new();
        for (i, (a, docs_a)) in entities.iter().enumerate() {
            for (b, docs_b) in entities.iter().skip(i + 1) {
                let shared = docs_a.iter().filter(|d| docs_b.contains(d)).count();
                if shared > 0 {
                    edge_counts.insert((a.clone(), b.clone()), shared);
                }
            }
        }
        let max_shared = edge_counts.values().copied().max().unwrap_or(1);

        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for (a, b) in edge_counts.keys() {
            adjacency.entry(a.clone()).or_default().push(b.clone());
            adjacency.entry(b.clone()).or_default().push(a.clone());
        }

        // seeds: entities sharing a token with the query, else top-degree
        let query_tokens: HashSet<String> = tokenize(&ctx.params.query).into_iter().collect();
        let mut seeds: Vec<String> = entities
            .iter()
            .filter(|(label, _)| {
                tokenize(label).iter().any(|t| query_tokens.contains(t))
            })
            .map(|(label, _)| label.clone())
            .collect();
        if seeds.is_empty() {
            let mut by_degree: Vec<&String> = adjacency.keys().collect();
            by_degree.sort_by(|a, b| {
                adjacency[*b]
                    .len()
                    .cmp(&adjacency[*a].len())
                    .then_with(|| a.cmp(b))
            });
            seeds = by_degree.into_iter().take(1).cloned().collect();
        }
        if seeds.is_empty() {
            seeds.push(entities[0].0.clone());
        }

        let (visited, parent) = Self::traverse(&adjacency, &seeds, hop_limit);

        // size-bounded subgraph, highest-degree nodes first
        let mut kept: Vec<String> = visited.into_iter().collect();
        kept.sort_by(|a, b| {
            let da = adjacency.get(a).map_or(0, Vec::len);
            let db = adjacency.get(b).map_or(0, Vec::len);
            db.cmp(&da).then_with(|| a.cmp(b))
        });
        kept.truncate(ctx.params.max_nodes);
        let kept_set: HashSet<&String> = kept.iter().collect();

        let nodes: Vec<GraphNode> = kept
            .iter()
            .map(|label| GraphNode {
                id: label.clone(),
                label: label.clone(),
                node_type: Self::node_type(label).to_string(),
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let to_edge = |((a, b), shared): (&(String, String), &usize)| GraphEdge {
            src: a.clone(),
            tgt: b.clone(),
            edge_type: "co_coverage".to_string(),
            weight: *shared as f64 / max_shared as f64,
        };
        let mut edges: Vec<GraphEdge> = edge_counts
            .iter()
            .filter(|((a, b), _)| kept_set.contains(a) && kept_set.contains(b))
            .map(to_edge)
            .collect();
        edges.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.src.cmp(&b.src))
                .then_with(|| a.tgt.cmp(&b.tgt))
        });
        edges.truncate(ctx.params.max_edges);

        // paths: seed → node parent chains, longest-reach first
        let mut paths: Vec<Vec<String>> = Vec::new();
        let mut targets: Vec<&String> = parent.keys().collect();
        targets.sort();
        for target in targets {
            let mut path = vec![target.clone()];
            let mut cursor = target;
            while let Some(prev) = parent.get(cursor) {
                path.push(prev.clone());
                cursor = prev;
            }
            path.reverse();
            if path.len() > 1 && path.iter().all(|n| kept_set.contains(n)) {
                paths.push(path);
            }
            if paths.len() >= MAX_PATHS {
                break;
            }
        }

        // answer synthesis via the model route, deterministic fallback
        let route = ctx.route(TaskKind::Graph);
        let prompt = format!(
            "Answer the question from the entity relationships in the sources. \
             Question: {}. Entities: {}",
            ctx.params.query,
            kept.join(", ")
        );
        let answer = match ctx
            .router
            .call(&route, &prompt, &ctx.docs, ANSWER_MAX_TOKENS, &ctx.ledger)
            .await
        {
            Ok(call) => call.text,
            Err(err) => {
                debug!(error = %err, "answer synthesis failed, using deterministic fallback");
                format!(
                    "{} related entities found around {}; strongest link: {}",
                    nodes.len(),
                    seeds.join(", "),
                    edges
                        .first()
                        .map_or_else(|| "none".to_string(), |e| format!("{} — {}", e.src, e.tgt))
                )
            }
        };

        info!(
            nodes = nodes.len(),
            edges = edges.len(),
            paths = paths.len(),
            hop_limit,
            "graph built"
        );
        Ok(AgentOutput::Graph(GraphOutput {
            nodes,
            edges,
            paths,
            answer,
        }))
    }
}
