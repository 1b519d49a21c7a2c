//! Provider adapters and the model router
//!
//! Every LLM provider is reached through one narrow adapter trait; the
//! [`ModelRouter`] is the only caller that knows provider identity. The
//! router walks a route's fallback chain under per-call timeouts and
//! records tokens and estimated cost on the request ledger after every
//! attempt, successful or not.

pub mod adapter;
pub mod cost;
pub mod router;

pub use adapter::{ChatProvider, HttpChatProvider, ProviderFamily, ProviderResponse, StubProvider};
pub use cost::{estimate_tokens, CostTable};
pub use router::{CallMeta, ModelRouter, RoutedCall};
