//! Agent contract and execution context
//!
//! One trait for every agent plus the context handed to each run: the
//! immutable document snapshot, resolved parameters, the model router,
//! the shared budget ledger, and a cooperative cancellation token
//! checked at suspension points.

use std::sync::Arc;

use async_trait::async_trait;
use newsloom_core::outputs::{AgentOutput, MemoryOp};
use newsloom_core::routes::{RouteTable, TaskKind};
use newsloom_core::types::{Document, ErrorCode, LangPref, Window};
use newsloom_core::{BudgetLedger, NewsloomError};
use newsloom_memory::MemoryStore;
use newsloom_providers::ModelRouter;
use newsloom_retrieval::Retriever;
use tokio_util::sync::CancellationToken;

/// Structured agent failure
///
/// Agents never panic and never propagate raw errors; the pipeline
/// converts these into response warnings (or a typed error when every
/// agent of a command failed).
#[derive(Debug, Clone, thiserror::Error)]
#[error("agent {agent} failed: {message}")]
pub struct AgentError {
    pub agent: &'static str,
    pub message: String,
    /// Wire code the failure maps onto if it ends up fatal
    pub code: ErrorCode,
}

impl AgentError {
    /// Wrap an engine error, keeping its wire code
    #[must_use]
    pub fn from_engine(agent: &'static str, err: &NewsloomError) -> Self {
        Self {
            agent,
            message: err.to_string(),
            code: err.code(),
        }
    }

    /// Internal agent failure
    #[must_use]
    pub fn internal(agent: &'static str, message: impl Into<String>) -> Self {
        Self {
            agent,
            message: message.into(),
            code: ErrorCode::Internal,
        }
    }

    /// Not enough input to work with
    #[must_use]
    pub fn no_data(agent: &'static str, message: impl Into<String>) -> Self {
        Self {
            agent,
            message: message.into(),
            code: ErrorCode::NoData,
        }
    }
}

/// Agent run outcome
pub type AgentResult = std::result::Result<AgentOutput, AgentError>;

/// Parameters resolved by the context builder for one request
#[derive(Debug, Clone)]
pub struct AgentParams {
    /// Retrieval/analysis query
    pub query: String,
    pub window: Window,
    pub lang: LangPref,
    pub k_final: usize,
    pub use_rerank: bool,
    /// Iteration cap for iterative answering (1..=3)
    pub depth: u8,
    /// Whether the self-check pass may run
    pub self_check: bool,
    /// Graph traversal hop cap (1..=4)
    pub hop_limit: u8,
    pub max_nodes: usize,
    pub max_edges: usize,
    /// Skip alternative event interpretations
    pub skip_alternatives: bool,
    /// Memory writes disabled by degradation
    pub recall_only: bool,
    pub user_id: Option<String>,
    pub memory_op: Option<MemoryOp>,
    /// Content for `memory store`/`suggest`
    pub memory_content: Option<String>,
    /// Competitor domains under comparison
    pub domains: Vec<String>,
    pub sources: Option<Vec<String>>,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            window: Window::H24,
            lang: LangPref::Auto,
            k_final: 6,
            use_rerank: true,
            depth: 2,
            self_check: true,
            hop_limit: 2,
            max_nodes: 200,
            max_edges: 600,
            skip_alternatives: false,
            recall_only: false,
            user_id: None,
            memory_op: None,
            memory_content: None,
            domains: Vec::new(),
            sources: None,
        }
    }
}

/// Everything one agent run may touch
///
/// Documents are an immutable snapshot shared across the fan-out;
/// the ledger is the request's shared budget; the retriever and the
/// memory store are present only for the agents that need them.
#[derive(Clone)]
pub struct AgentContext {
    pub docs: Arc<Vec<Document>>,
    pub params: AgentParams,
    pub router: Arc<ModelRouter>,
    pub routes: Arc<RouteTable>,
    pub ledger: Arc<BudgetLedger>,
    pub cancel: CancellationToken,
    pub retriever: Option<Arc<Retriever>>,
    pub memory: Option<Arc<dyn MemoryStore>>,
    /// Outputs of agents that already ran (consumed by synthesis)
    pub prior_outputs: Arc<Vec<AgentOutput>>,
}

impl AgentContext {
    /// Minimal context over a document snapshot (tests and one-off runs)
    #[must_use]
    pub fn new(
        docs: Vec<Document>,
        params: AgentParams,
        router: Arc<ModelRouter>,
        routes: Arc<RouteTable>,
        ledger: Arc<BudgetLedger>,
    ) -> Self {
        Self {
            docs: Arc::new(docs),
            params,
            router,
            routes,
            ledger,
            cancel: CancellationToken::new(),
            retriever: None,
            memory: None,
            prior_outputs: Arc::new(Vec::new()),
        }
    }

    /// Attach a retriever (iterative answering)
    #[must_use]
    pub fn with_retriever(mut self, retriever: Arc<Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Attach a memory store (memory operations)
    #[must_use]
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach prior agent outputs (synthesis)
    #[must_use]
    pub fn with_prior_outputs(mut self, outputs: Vec<AgentOutput>) -> Self {
        self.prior_outputs = Arc::new(outputs);
        self
    }

    /// Route for a task from this request's route table
    #[must_use]
    pub fn route(&self, task: TaskKind) -> newsloom_core::ModelRoute {
        self.routes.route(task)
    }

    /// True when the request has been told to stop
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Uniform agent contract
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable agent name used in warnings and dispatch
    fn name(&self) -> &'static str;

    /// Task type for model routing
    fn task(&self) -> TaskKind;

    /// Whether the agent may run in the parallel fan-out
    fn parallel_safe(&self) -> bool;

    /// Run over the context's document snapshot
    async fn run(&self, ctx: &AgentContext) -> AgentResult;
}
