//! Core types and contracts shared by every newsloom crate
//!
//! This crate holds the canonical request/response data model, the
//! per-request [`BudgetLedger`], the model route table, and the error
//! taxonomy. It has no I/O of its own; everything here is a value type
//! or a synchronization wrapper around one.

pub mod budget;
pub mod embedding;
pub mod error;
pub mod logging;
pub mod outputs;
pub mod routes;
pub mod text;
pub mod types;

pub use budget::{BudgetLedger, BudgetLimits, BudgetSnapshot, DegradeLevel, DegradePlan};
pub use embedding::{Embedder, HashEmbedder};
pub use error::{NewsloomError, Result};
pub use outputs::{AgentOutput, CommandResult};
pub use routes::{ModelRoute, RouteTable, TaskKind};
pub use types::{
    AnalysisResponse, CommandKind, Document, ErrorCode, ErrorResponse, Evidence, EvidenceRef,
    Insight, InsightKind, LangPref, Language, Meta, Window,
};
