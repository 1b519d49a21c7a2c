//! Central configuration management for newsloom
//!
//! Handles TOML parsing, validation, and environment variable overrides.
//! All sections carry defaults, so an empty file (or no file at all) is a
//! complete, valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use crate::budget::BudgetConfig;
pub use crate::memory::MemoryConfig;
pub use crate::policy::PolicyConfig;
pub use crate::providers::{ModelEndpoint, ProvidersConfig, RouteOverride};
pub use crate::retrieval::RetrievalConfig;
pub use crate::validation::validate_config;

pub mod budget;
pub mod memory;
pub mod policy;
pub mod providers;
pub mod retrieval;
pub mod validation;

/// Configuration file discovery order
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "newsloom.toml",
    ".newsloom.toml",
    "config/newsloom.toml",
];

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "NEWSLOOM_";

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config validation error ({}): {message}", .field.as_deref().unwrap_or("config"))]
    Validation {
        field: Option<String>,
        message: String,
    },
}

/// Central newsloom configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewsloomConfig {
    /// Retrieval behavior and auto-recovery switches
    pub retrieval: RetrievalConfig,
    /// Per-request and per-user budget limits
    pub budget: BudgetConfig,
    /// Memory store and embedding settings
    pub memory: MemoryConfig,
    /// Response policy: PII masking and domain trust lists
    pub policy: PolicyConfig,
    /// Provider endpoints, cost table, and route overrides
    pub providers: ProvidersConfig,
}

impl NewsloomConfig {
    /// Parse a TOML document and apply environment overrides
    ///
    /// # Errors
    /// Returns an error on malformed TOML or failed validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.apply_env_overrides();
        validate_config(&config)?;
        Ok(config)
    }

    /// Load from an explicit file path
    ///
    /// # Errors
    /// Returns an error when the file is unreadable, malformed, or invalid.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration file");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Discover a config file in the standard search locations, falling
    /// back to defaults (plus env overrides) when none exists
    ///
    /// # Errors
    /// Returns an error when a discovered file is malformed or invalid.
    pub fn discover() -> Result<Self, ConfigError> {
        for candidate in CONFIG_SEARCH_PATHS {
            if Path::new(candidate).is_file() {
                return Self::load_from_file(candidate);
            }
        }
        debug!("no configuration file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        validate_config(&config)?;
        Ok(config)
    }

    /// Overlay `NEWSLOOM_*` environment variables onto the parsed values
    ///
    /// Only scalar switches commonly flipped per deployment are exposed;
    /// structured settings (routes, trust lists) stay file-only.
    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u64>("BUDGET_MAX_TOKENS") {
            self.budget.max_tokens_per_command = v;
        }
        if let Some(v) = env_parse::<f64>("BUDGET_MAX_COST_CENTS") {
            self.budget.max_cost_cents_per_command = v;
        }
        if let Some(v) = env_parse::<u64>("BUDGET_MAX_DURATION_SEC") {
            self.budget.max_duration_sec = v;
        }
        if let Some(v) = env_parse::<bool>("ENABLE_RERANK") {
            self.retrieval.enable_rerank = v;
        }
        if let Some(v) = env_parse::<bool>("AUTO_EXPAND_WINDOW") {
            self.retrieval.auto_expand_window = v;
        }
        if let Some(v) = env_parse::<u64>("CACHE_TTL_SEC") {
            self.retrieval.cache_ttl_sec = v;
        }
        if let Some(v) = env_parse::<usize>("EMBEDDING_DIM") {
            self.memory.embedding_dim = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}EMBEDDING_PROVIDER")) {
            self.memory.embedding_provider = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(suffix: &str) -> Option<T> {
    std::env::var(format!("{ENV_PREFIX}{suffix}"))
        .ok()
        .and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_valid_defaults() {
        let config = NewsloomConfig::from_toml("").unwrap();
        assert_eq!(config.retrieval.k_final_default, 6);
        assert_eq!(config.retrieval.window_default.as_str(), "24h");
        assert_eq!(config.retrieval.cache_ttl_sec, 300);
    }

    #[test]
    fn test_partial_toml_overrides_one_section() {
        let config = NewsloomConfig::from_toml(
            r#"
            [retrieval]
            k_final_default = 8
            enable_rerank = false
            "#,
        )
        .unwrap();
        assert_eq!(config.retrieval.k_final_default, 8);
        assert!(!config.retrieval.enable_rerank);
        // untouched sections keep defaults
        assert!(config.budget.max_tokens_per_command >= 2048);
    }

    #[test]
    fn test_unknown_top_level_section_rejected() {
        let result = NewsloomConfig::from_toml("[telemetry]\nenabled = true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let result = NewsloomConfig::from_toml(
            r#"
            [retrieval]
            k_final_default = 99
            "#,
        );
        assert!(result.is_err());
    }
}
