//! Configuration validation
//!
//! Validates cross-field consistency beyond what serde can express:
//! bound checks, supported dimensions, and minimum budget floors the
//! orchestrator depends on.

use tracing::debug;

use crate::memory::SUPPORTED_EMBEDDING_DIMS;
use crate::{ConfigError, NewsloomConfig};

/// Smallest viable per-command token budget
const MIN_TOKENS_PER_COMMAND: u64 = 2048;
/// Smallest viable per-command cost budget, cents
const MIN_COST_CENTS_PER_COMMAND: f64 = 25.0;
/// Smallest viable per-command duration, seconds
const MIN_DURATION_SEC: u64 = 8;

/// Validate the entire configuration
///
/// # Errors
/// Returns a [`ConfigError::Validation`] naming the offending field.
pub fn validate_config(config: &NewsloomConfig) -> Result<(), ConfigError> {
    debug!("starting configuration validation");

    validate_retrieval(config)?;
    validate_budget(config)?;
    validate_memory(config)?;
    validate_policy(config)?;

    debug!("configuration validation completed");
    Ok(())
}

fn validate_retrieval(config: &NewsloomConfig) -> Result<(), ConfigError> {
    let k = config.retrieval.k_final_default;
    if !(5..=10).contains(&k) {
        return Err(ConfigError::Validation {
            field: Some("retrieval.k_final_default".to_string()),
            message: format!("k_final_default must be within [5, 10], got {k}"),
        });
    }
    Ok(())
}

fn validate_budget(config: &NewsloomConfig) -> Result<(), ConfigError> {
    let budget = &config.budget;
    if budget.max_tokens_per_command < MIN_TOKENS_PER_COMMAND {
        return Err(ConfigError::Validation {
            field: Some("budget.max_tokens_per_command".to_string()),
            message: format!(
                "must be at least {MIN_TOKENS_PER_COMMAND}, got {}",
                budget.max_tokens_per_command
            ),
        });
    }
    if budget.max_cost_cents_per_command < MIN_COST_CENTS_PER_COMMAND {
        return Err(ConfigError::Validation {
            field: Some("budget.max_cost_cents_per_command".to_string()),
            message: format!(
                "must be at least {MIN_COST_CENTS_PER_COMMAND}, got {}",
                budget.max_cost_cents_per_command
            ),
        });
    }
    if budget.max_duration_sec < MIN_DURATION_SEC {
        return Err(ConfigError::Validation {
            field: Some("budget.max_duration_sec".to_string()),
            message: format!(
                "must be at least {MIN_DURATION_SEC}, got {}",
                budget.max_duration_sec
            ),
        });
    }
    if budget.max_cost_cents_per_user_daily < budget.max_cost_cents_per_command {
        return Err(ConfigError::Validation {
            field: Some("budget.max_cost_cents_per_user_daily".to_string()),
            message: "daily user cost cap is below the per-command cap".to_string(),
        });
    }
    Ok(())
}

fn validate_memory(config: &NewsloomConfig) -> Result<(), ConfigError> {
    let dim = config.memory.embedding_dim;
    if !SUPPORTED_EMBEDDING_DIMS.contains(&dim) {
        return Err(ConfigError::Validation {
            field: Some("memory.embedding_dim".to_string()),
            message: format!("unsupported embedding dimension {dim}, expected 1536 or 3072"),
        });
    }
    if config.memory.episodic_ttl_days == 0 || config.memory.semantic_ttl_days == 0 {
        return Err(ConfigError::Validation {
            field: Some("memory".to_string()),
            message: "TTL days must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_policy(config: &NewsloomConfig) -> Result<(), ConfigError> {
    for domain in config
        .policy
        .domain_whitelist
        .iter()
        .chain(&config.policy.domain_blacklist)
    {
        if domain.trim().is_empty() || domain.contains('/') {
            return Err(ConfigError::Validation {
                field: Some("policy".to_string()),
                message: format!("trust lists hold bare domains, got {domain:?}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(validate_config(&NewsloomConfig::default()).is_ok());
    }

    #[test]
    fn test_small_budget_rejected() {
        let mut config = NewsloomConfig::default();
        config.budget.max_duration_sec = 2;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_duration_sec"));
    }

    #[test]
    fn test_bad_embedding_dim_rejected() {
        let mut config = NewsloomConfig::default();
        config.memory.embedding_dim = 768;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_url_in_trust_list_rejected() {
        let mut config = NewsloomConfig::default();
        config
            .policy
            .domain_blacklist
            .push("https://spam.example/path".to_string());
        assert!(validate_config(&config).is_err());
    }
}
