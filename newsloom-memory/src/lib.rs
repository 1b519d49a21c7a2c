//! Long-term memory store
//!
//! Persistent vector-indexed records with TTL expiration, importance
//! scoring, user scoping, and semantic recall. The store is the only
//! legitimately process-wide component of the engine; everything else
//! is request-scoped.
//!
//! A record moves through an explicit lifecycle: `active` (returned by
//! recall) → `expired` (past its TTL) → `deleted` (soft-deleted by
//! cleanup or by request). Hard purging is an offline job outside this
//! crate.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod store;
pub mod suggest;
pub mod types;

pub use in_memory::InMemoryMemoryStore;
pub use store::{MemoryStore, NewMemory, RecallHit};
pub use suggest::suggest_storage;
pub use types::{MemoryKind, MemoryRecord};
