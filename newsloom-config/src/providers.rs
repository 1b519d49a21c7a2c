//! Provider endpoint and routing configuration
//!
//! Maps abstract model identifiers onto concrete provider endpoints with
//! a per-model cost table, and carries optional route overrides that are
//! merged over the default route table at startup.

use std::collections::HashMap;
use std::time::Duration;

use newsloom_core::routes::{ModelRoute, RouteTable, TaskKind};
use serde::{Deserialize, Serialize};

/// One model endpoint with its cost entries
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelEndpoint {
    /// Provider family (`openai`, `anthropic`, `google`, `stub`)
    pub provider: String,
    /// Chat completion URL; provider default when empty
    pub endpoint: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Cents per 1K input tokens
    pub cents_per_1k_input: f64,
    /// Cents per 1K output tokens
    pub cents_per_1k_output: f64,
    /// Maximum outstanding calls to this model's provider
    pub max_concurrent: usize,
}

impl Default for ModelEndpoint {
    fn default() -> Self {
        Self {
            provider: "stub".to_string(),
            endpoint: None,
            api_key_env: None,
            cents_per_1k_input: 0.015,
            cents_per_1k_output: 0.06,
            max_concurrent: 8,
        }
    }
}

/// Route override for one task
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteOverride {
    pub task: TaskKind,
    pub primary: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    pub timeout_secs: u64,
}

/// Providers configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Model id → endpoint + cost entry
    pub models: HashMap<String, ModelEndpoint>,
    /// Route overrides merged over the default table
    pub routes: Vec<RouteOverride>,
}

impl ProvidersConfig {
    /// Materialize the effective route table
    #[must_use]
    pub fn route_table(&self) -> RouteTable {
        let mut table = RouteTable::default();
        for route in &self.routes {
            table.set(ModelRoute::new(
                route.task,
                route.primary.clone(),
                route.fallbacks.clone(),
                Duration::from_secs(route.timeout_secs),
            ));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_override_merge() {
        let config: ProvidersConfig = toml::from_str(
            r#"
            [[routes]]
            task = "ask"
            primary = "gpt-4o-mini"
            fallbacks = ["claude-3-5-sonnet"]
            timeout_secs = 20
            "#,
        )
        .unwrap();
        let table = config.route_table();
        assert_eq!(table.route(TaskKind::Ask).primary, "gpt-4o-mini");
        // default rows survive
        assert!(!table.route(TaskKind::Sentiment).fallbacks.is_empty());
    }

    #[test]
    fn test_model_endpoint_costs_parse() {
        let config: ProvidersConfig = toml::from_str(
            r#"
            [models.gpt-4o]
            provider = "openai"
            api_key_env = "OPENAI_API_KEY"
            cents_per_1k_input = 0.25
            cents_per_1k_output = 1.0
            max_concurrent = 4
            "#,
        )
        .unwrap();
        let entry = config.models.get("gpt-4o").unwrap();
        assert_eq!(entry.provider, "openai");
        assert!((entry.cents_per_1k_output - 1.0).abs() < f64::EPSILON);
    }
}
