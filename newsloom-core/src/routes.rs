//! Model routing table
//!
//! Each agent task type maps to one immutable [`ModelRoute`]: a primary
//! model, an ordered fallback chain, and a per-call timeout. The default
//! table below is the shipping configuration; deployments override it
//! through `newsloom-config`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Task types the router distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Keyphrase,
    QueryExpansion,
    Sentiment,
    Topics,
    Competitors,
    Graph,
    TrendForecast,
    Synthesis,
    Events,
    Ask,
    MemoryOps,
}

impl TaskKind {
    /// Stable identifier used in logs and call metadata
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyphrase => "keyphrase",
            Self::QueryExpansion => "query_expansion",
            Self::Sentiment => "sentiment",
            Self::Topics => "topics",
            Self::Competitors => "competitors",
            Self::Graph => "graph",
            Self::TrendForecast => "trend_forecast",
            Self::Synthesis => "synthesis",
            Self::Events => "events",
            Self::Ask => "ask",
            Self::MemoryOps => "memory_ops",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable routing decision for one task type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRoute {
    pub task: TaskKind,
    /// Model tried first
    pub primary: String,
    /// Models tried in order when the primary fails
    pub fallbacks: Vec<String>,
    /// End-to-end cap for a single model attempt
    pub timeout: Duration,
}

impl ModelRoute {
    /// Build a route
    #[must_use]
    pub fn new(
        task: TaskKind,
        primary: impl Into<String>,
        fallbacks: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            task,
            primary: primary.into(),
            fallbacks,
            timeout,
        }
    }

    /// Primary followed by fallbacks, in attempt order
    #[must_use]
    pub fn candidates(&self) -> Vec<&str> {
        std::iter::once(self.primary.as_str())
            .chain(self.fallbacks.iter().map(String::as_str))
            .collect()
    }
}

/// Lookup table from task type to route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<TaskKind, ModelRoute>,
}

const FLASH: &str = "gemini-2.0-flash";
const SONNET: &str = "claude-3-5-sonnet";
const GPT4O: &str = "gpt-4o";

impl RouteTable {
    /// Build a table from explicit routes
    #[must_use]
    pub fn new(routes: Vec<ModelRoute>) -> Self {
        Self {
            routes: routes.into_iter().map(|r| (r.task, r)).collect(),
        }
    }

    /// Route for a task; falls back to the default table for tasks the
    /// deployment configuration left out
    #[must_use]
    pub fn route(&self, task: TaskKind) -> ModelRoute {
        self.routes
            .get(&task)
            .cloned()
            .unwrap_or_else(|| Self::default_route(task))
    }

    /// Replace or add one route
    pub fn set(&mut self, route: ModelRoute) {
        self.routes.insert(route.task, route);
    }

    fn default_route(task: TaskKind) -> ModelRoute {
        let (primary, fallbacks, secs): (&str, Vec<&str>, u64) = match task {
            TaskKind::Keyphrase => (FLASH, vec![SONNET, GPT4O], 8),
            TaskKind::QueryExpansion => (FLASH, vec![SONNET, GPT4O], 10),
            TaskKind::Sentiment => (GPT4O, vec![SONNET], 12),
            TaskKind::Topics | TaskKind::Competitors => (SONNET, vec![GPT4O, FLASH], 15),
            TaskKind::Graph => (SONNET, vec![GPT4O, FLASH], 18),
            TaskKind::TrendForecast => (GPT4O, vec![SONNET, FLASH], 12),
            TaskKind::Synthesis | TaskKind::Events => (GPT4O, vec![SONNET, FLASH], 15),
            TaskKind::Ask => (GPT4O, vec![SONNET, FLASH], 18),
            TaskKind::MemoryOps => (FLASH, vec![GPT4O], 12),
        };
        ModelRoute::new(
            task,
            primary,
            fallbacks.into_iter().map(String::from).collect(),
            Duration::from_secs(secs),
        )
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_every_task() {
        let table = RouteTable::default();
        for task in [
            TaskKind::Keyphrase,
            TaskKind::QueryExpansion,
            TaskKind::Sentiment,
            TaskKind::Topics,
            TaskKind::Competitors,
            TaskKind::Graph,
            TaskKind::TrendForecast,
            TaskKind::Synthesis,
            TaskKind::Events,
            TaskKind::Ask,
            TaskKind::MemoryOps,
        ] {
            let route = table.route(task);
            assert!(!route.primary.is_empty());
            assert!(!route.fallbacks.is_empty());
            assert!(route.timeout >= Duration::from_secs(8));
            assert!(route.timeout <= Duration::from_secs(18));
        }
    }

    #[test]
    fn test_candidates_order() {
        let route = RouteTable::default().route(TaskKind::Sentiment);
        assert_eq!(route.candidates(), vec![GPT4O, SONNET]);
    }

    #[test]
    fn test_override_wins() {
        let mut table = RouteTable::default();
        table.set(ModelRoute::new(
            TaskKind::Ask,
            "local-llama",
            vec![GPT4O.to_string()],
            Duration::from_secs(20),
        ));
        assert_eq!(table.route(TaskKind::Ask).primary, "local-llama");
        // untouched tasks still resolve
        assert_eq!(table.route(TaskKind::Topics).primary, SONNET);
    }
}
