//! Analysis agents
//!
//! Small, single-purpose units sharing one contract: read the request's
//! document snapshot, produce a typed result, never panic and never
//! throw past the contract — failures come back as structured
//! [`AgentError`] values the pipeline turns into response warnings.
//!
//! Agents marked parallel-safe run concurrently under a shared deadline;
//! the iterative ones (`agentic_rag`, `graph`, `events`, `memory_ops`)
//! run serially because they own loops or external state.

pub mod agentic;
pub mod competitor;
pub mod context;
pub mod events;
pub mod graph;
pub mod keyphrase;
pub mod lexicon;
pub mod memory_ops;
pub mod query_expansion;
pub mod sentiment;
pub mod synthesis;
pub mod topics;
pub mod trend;

pub use agentic::AgenticRagAgent;
pub use competitor::CompetitorNewsAgent;
pub use context::{Agent, AgentContext, AgentError, AgentParams};
pub use events::EventsAgent;
pub use graph::GraphAgent;
pub use keyphrase::KeyphraseAgent;
pub use memory_ops::MemoryOpsAgent;
pub use query_expansion::QueryExpansionAgent;
pub use sentiment::SentimentAgent;
pub use synthesis::SynthesisAgent;
pub use topics::TopicsAgent;
pub use trend::TrendForecasterAgent;
