//! Retrieval configuration
//!
//! Window defaults, result sizing, and the auto-recovery switches the
//! context builder consults when a retrieval comes back empty.

use newsloom_core::types::Window;
use serde::{Deserialize, Serialize};

/// Retrieval behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Fallback window when the user omits `window=`
    pub window_default: Window,
    /// Retrieval result size when the user omits `k=`
    pub k_final_default: usize,
    /// Whether to invoke the reranker at all
    pub enable_rerank: bool,
    /// Walk the window ladder when retrieval is empty
    pub auto_expand_window: bool,
    /// Retry with `lang=auto` and no source filter when still empty
    pub relax_filters_on_empty: bool,
    /// Retry with rerank off and `k=10` when still empty
    pub fallback_rerank_off_on_empty: bool,
    /// Retrieval cache lifetime in seconds
    pub cache_ttl_sec: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            window_default: Window::H24,
            k_final_default: 6,
            enable_rerank: true,
            auto_expand_window: true,
            relax_filters_on_empty: true,
            fallback_rerank_off_on_empty: true,
            cache_ttl_sec: 300,
        }
    }
}
