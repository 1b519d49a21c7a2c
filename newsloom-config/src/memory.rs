//! Memory store configuration

use serde::{Deserialize, Serialize};

/// Supported embedding dimensions
pub const SUPPORTED_EMBEDDING_DIMS: [usize; 2] = [1536, 3072];

/// Memory store and embedding configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Embedding provider identifier (`hash` is the offline default)
    pub embedding_provider: String,
    /// Embedding vector dimension (1536 or 3072)
    pub embedding_dim: usize,
    /// Default TTL for episodic records, in days
    pub episodic_ttl_days: u32,
    /// Default TTL for semantic records, in days
    pub semantic_ttl_days: u32,
    /// Postgres connection string; in-memory backend when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_provider: "hash".to_string(),
            embedding_dim: 1536,
            episodic_ttl_days: 90,
            semantic_ttl_days: 180,
            database_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.episodic_ttl_days, 90);
        assert_eq!(config.semantic_ttl_days, 180);
        assert!(SUPPORTED_EMBEDDING_DIMS.contains(&config.embedding_dim));
    }
}
