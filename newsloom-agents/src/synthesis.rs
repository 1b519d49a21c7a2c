//! Synthesis agent
//!
//! Reads the outputs of agents that already ran, detects cross-agent
//! conflicts (for example negative sentiment against a rising coverage
//! trend), and turns them into 1–5 recommendations ranked by impact.

use async_trait::async_trait;
use newsloom_core::outputs::{
    AgentOutput, Impact, Momentum, SynthesisAction, SynthesisConflict, SynthesisOutput,
    TopicTrend, MAX_SUMMARY_CHARS,
};
use newsloom_core::routes::TaskKind;
use newsloom_core::text::truncate_chars;
use tracing::debug;

use crate::context::{Agent, AgentContext, AgentError, AgentResult};

/// Sentiment below which the corpus reads negative
const NEGATIVE_SENTIMENT: f64 = -0.2;
/// Recommendation cap
const MAX_ACTIONS: usize = 5;

/// Cross-agent conflict detection and recommendations
#[derive(Debug, Default)]
pub struct SynthesisAgent;

#[async_trait]
impl Agent for SynthesisAgent {
    fn name(&self) -> &'static str {
        "synthesis"
    }

    fn task(&self) -> TaskKind {
        TaskKind::Synthesis
    }

    fn parallel_safe(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &AgentContext) -> AgentResult {
        if ctx.prior_outputs.is_empty() {
            return Err(AgentError::no_data(
                self.name(),
                "no prior agent outputs to synthesize",
            ));
        }

        let mut sentiment_overall: Option<f64> = None;
        let mut rising_topics: Vec<String> = Vec::new();
        let mut falling_topics: Vec<String> = Vec::new();
        let mut forecast: Option<Momentum> = None;
        let mut summary_parts: Vec<String> = Vec::new();

        for output in ctx.prior_outputs.iter() {
            match output {
                AgentOutput::Sentiment(s) => {
                    sentiment_overall = Some(s.overall);
                    summary_parts.push(format!("sentiment {:+.2}", s.overall));
                }
                AgentOutput::Topics(t) => {
                    for cluster in &t.topics {
                        match cluster.trend {
                            TopicTrend::Rising => rising_topics.push(cluster.label.clone()),
                            TopicTrend::Falling => falling_topics.push(cluster.label.clone()),
                            TopicTrend::Stable => {}
                        }
                    }
                    summary_parts.push(format!("{} topics", t.topics.len()));
                }
                AgentOutput::TrendForecaster(f) => {
                    forecast = Some(f.direction);
                    summary_parts.push(format!("forecast {:?}", f.direction).to_lowercase());
                }
                AgentOutput::Keyphrase(k) => {
                    if let Some(top) = k.phrases.first() {
                        summary_parts.push(format!("top phrase \"{}\"", top.phrase));
                    }
                }
                _ => {}
            }
        }

        let mut conflicts: Vec<SynthesisConflict> = Vec::new();
        if let Some(overall) = sentiment_overall {
            if overall < NEGATIVE_SENTIMENT {
                for topic in &rising_topics {
                    conflicts.push(SynthesisConflict {
                        description: format!(
                            "coverage of \"{topic}\" is rising while overall sentiment is negative"
                        ),
                        agents: vec!["sentiment".to_string(), "topics".to_string()],
                    });
                }
                if forecast == Some(Momentum::Up) {
                    conflicts.push(SynthesisConflict {
                        description:
                            "forecast points up while overall sentiment is negative".to_string(),
                        agents: vec!["sentiment".to_string(), "trend_forecaster".to_string()],
                    });
                }
            }
        }
        if forecast == Some(Momentum::Down) && !rising_topics.is_empty() {
            conflicts.push(SynthesisConflict {
                description: format!(
                    "forecast points down although {} cluster(s) are still rising",
                    rising_topics.len()
                ),
                agents: vec!["trend_forecaster".to_string(), "topics".to_string()],
            });
        }

        let mut actions: Vec<SynthesisAction> = Vec::new();
        for conflict in &conflicts {
            actions.push(SynthesisAction {
                text: format!("Investigate: {}", conflict.description),
                impact: Impact::High,
            });
        }
        for topic in rising_topics.iter().take(2) {
            actions.push(SynthesisAction {
                text: format!("Track the rising \"{topic}\" cluster daily"),
                impact: Impact::Medium,
            });
        }
        for topic in falling_topics.iter().take(1) {
            actions.push(SynthesisAction {
                text: format!("Reduce monitoring cadence for \"{topic}\""),
                impact: Impact::Low,
            });
        }
        if actions.is_empty() {
            actions.push(SynthesisAction {
                text: "No cross-signal conflicts; keep the current monitoring setup".to_string(),
                impact: Impact::Low,
            });
        }
        actions.truncate(MAX_ACTIONS);

        let summary = truncate_chars(
            &format!(
                "Synthesis over {} agent result(s): {}. {} conflict(s) detected.",
                ctx.prior_outputs.len(),
                summary_parts.join(", "),
                conflicts.len()
            ),
            MAX_SUMMARY_CHARS,
        );

        debug!(
            conflicts = conflicts.len(),
            actions = actions.len(),
            "synthesis complete"
        );
        Ok(AgentOutput::Synthesis(SynthesisOutput {
            summary,
            conflicts,
            actions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentParams;
    use newsloom_core::budget::{BudgetLedger, BudgetLimits};
    use newsloom_core::outputs::{
        EmotionScores, ForecastOutput, SentimentOutput, TopicCluster, TopicsOutput,
    };
    use newsloom_core::routes::RouteTable;
    use newsloom_providers::{CostTable, ModelRouter, StubProvider};
    use std::sync::Arc;

    fn ctx(outputs: Vec<AgentOutput>) -> AgentContext {
        AgentContext::new(
            vec![],
            AgentParams::default(),
            Arc::new(ModelRouter::new(
                vec![Arc::new(StubProvider::answering("gpt-4o", "ok"))],
                CostTable::empty(),
            )),
            Arc::new(RouteTable::default()),
            Arc::new(BudgetLedger::new(BudgetLimits::default())),
        )
        .with_prior_outputs(outputs)
    }

    fn sentiment(overall: f64) -> AgentOutput {
        AgentOutput::Sentiment(SentimentOutput {
            overall,
            emotions: EmotionScores::default(),
            aspects: vec![],
        })
    }

    fn rising_topic(label: &str) -> AgentOutput {
        AgentOutput::Topics(TopicsOutput {
            topics: vec![TopicCluster {
                label: label.to_string(),
                terms: vec![label.to_string()],
                size: 4,
                trend: TopicTrend::Rising,
            }],
        })
    }

    #[tokio::test]
    async fn test_negative_sentiment_vs_rising_topic_conflicts() {
        let out = SynthesisAgent
            .run(&ctx(vec![sentiment(-0.5), rising_topic("layoffs")]))
            .await
            .unwrap();
        let AgentOutput::Synthesis(result) = out else {
            panic!("wrong output")
        };
        assert_eq!(result.conflicts.len(), 1);
        assert!(result.conflicts[0].description.contains("layoffs"));
        assert!(matches!(result.actions[0].impact, Impact::High));
    }

    #[tokio::test]
    async fn test_no_conflict_yields_default_action() {
        let out = SynthesisAgent.run(&ctx(vec![sentiment(0.4)])).await.unwrap();
        let AgentOutput::Synthesis(result) = out else {
            panic!("wrong output")
        };
        assert!(result.conflicts.is_empty());
        assert_eq!(result.actions.len(), 1);
        assert!(matches!(result.actions[0].impact, Impact::Low));
    }

    #[tokio::test]
    async fn test_forecast_down_vs_rising_conflicts() {
        let forecast = AgentOutput::TrendForecaster(ForecastOutput {
            direction: Momentum::Down,
            slope: -0.4,
            drivers: vec![],
            confidence_interval: [0.2, 0.6],
        });
        let out = SynthesisAgent
            .run(&ctx(vec![forecast, rising_topic("chips")]))
            .await
            .unwrap();
        let AgentOutput::Synthesis(result) = out else {
            panic!("wrong output")
        };
        assert!(!result.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_summary_bounded() {
        let topics: Vec<AgentOutput> = (0..30).map(|i| rising_topic(&format!("t{i}"))).collect();
        let out = SynthesisAgent.run(&ctx(topics)).await.unwrap();
        let AgentOutput::Synthesis(result) = out else {
            panic!("wrong output")
        };
        assert!(result.summary.chars().count() <= MAX_SUMMARY_CHARS);
        assert!(result.actions.len() <= MAX_ACTIONS);
    }

    #[tokio::test]
    async fn test_no_prior_outputs_is_no_data() {
        assert!(SynthesisAgent.run(&ctx(vec![])).await.is_err());
    }
}
