//! Memory operations agent
//!
//! Bridges the command surface onto the memory store: `suggest` scores
//! a candidate text, `store` embeds and persists it (downgraded to a
//! suggestion when the budget restricts memory to recall), and `recall`
//! runs semantic search scoped to the requesting user.

use async_trait::async_trait;
use newsloom_core::outputs::{
    AgentOutput, MemoryOp, MemoryOutput, RecalledRecord, StorageSuggestion,
};
use newsloom_core::routes::TaskKind;
use newsloom_memory::{suggest_storage, NewMemory};
use tracing::{debug, info};

use crate::context::{Agent, AgentContext, AgentError, AgentResult};

/// Records returned by recall
pub const RECALL_TOP_K: usize = 5;
/// Similarity floor for recall
pub const RECALL_MIN_SIMILARITY: f64 = 0.5;

/// Suggest / store / recall over the memory store
#[derive(Debug, Default)]
pub struct MemoryOpsAgent;

fn to_suggestion(content: &str, user_id: Option<&str>) -> StorageSuggestion {
    let s = suggest_storage(content, user_id);
    StorageSuggestion {
        importance: s.importance,
        suggested_type: s.kind.as_str().to_string(),
        ttl_days: s.ttl_days,
    }
}

#[async_trait]
impl Agent for MemoryOpsAgent {
    fn name(&self) -> &'static str {
        "memory_ops"
    }

    fn task(&self) -> TaskKind {
        TaskKind::MemoryOps
    }

    fn parallel_safe(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        let Some(memory) = &ctx.memory else {
            return Err(AgentError::internal(self.name(), "no memory store attached"));
        };
        let op = ctx
            .params
            .memory_op
            .ok_or_else(|| AgentError::internal(self.name(), "no memory operation requested"))?;
        let user_id = ctx.params.user_id.as_deref();

        match op {
            MemoryOp::Suggest => {
                let content = ctx.params.memory_content.as_deref().ok_or_else(|| {
                    AgentError::no_data(self.name(), "suggest needs content")
                })?;
                let suggestion = to_suggestion(content, user_id);
                debug!(importance = suggestion.importance, "storage suggested");
                Ok(AgentOutput::MemoryOps(MemoryOutput {
                    op,
                    stored_id: None,
                    records: vec![],
                    suggestion: Some(suggestion),
                }))
            }
            MemoryOp::Store => {
                let content = ctx.params.memory_content.as_deref().ok_or_else(|| {
                    AgentError::no_data(self.name(), "store needs content")
                })?;
                let suggestion = to_suggestion(content, user_id);
                if ctx.params.recall_only {
                    // degraded: report what would have been stored
                    ctx.ledger.add_warning("degradation_memory_recall_only");
                    return Ok(AgentOutput::MemoryOps(MemoryOutput {
                        op,
                        stored_id: None,
                        records: vec![],
                        suggestion: Some(suggestion),
                    }));
                }
                let mut memory_new = match suggestion.suggested_type.as_str() {
                    "episodic" => NewMemory::episodic(content),
                    _ => NewMemory::semantic(content),
                }
                .with_importance(suggestion.importance)
                .with_ttl_days(suggestion.ttl_days);
                if let Some(user) = user_id {
                    memory_new = memory_new.for_user(user);
                }
                let record = memory
                    .store(memory_new)
                    .await
                    .map_err(|e| AgentError::from_engine(self.name(), &e))?;
                info!(id = %record.id, "memory stored via command");
                Ok(AgentOutput::MemoryOps(MemoryOutput {
                    op,
                    stored_id: Some(record.id.to_string()),
                    records: vec![],
                    suggestion: Some(suggestion),
                }))
            }
            MemoryOp::Recall => {
                let query = if ctx.params.query.is_empty() {
                    ctx.params.memory_content.clone().unwrap_or_default()
                } else {
                    ctx.params.query.clone()
                };
                if query.is_empty() {
                    return Err(AgentError::no_data(self.name(), "recall needs a query"));
                }
                let hits = memory
                    .recall(&query, user_id, RECALL_TOP_K, RECALL_MIN_SIMILARITY)
                    .await
                    .map_err(|e| AgentError::from_engine(self.name(), &e))?;
                let records: Vec<RecalledRecord> = hits
                    .into_iter()
                    .map(|hit| RecalledRecord {
                        id: hit.record.id.to_string(),
                        content: hit.record.content,
                        similarity: hit.similarity,
                        record_type: hit.record.kind.as_str().to_string(),
                        importance: hit.record.importance,
                    })
                    .collect();
                debug!(returned = records.len(), "memory recall served");
                Ok(AgentOutput::MemoryOps(MemoryOutput {
                    op,
                    stored_id: None,
                    records,
                    suggestion: None,
                }))
            }
        }
    }
}
