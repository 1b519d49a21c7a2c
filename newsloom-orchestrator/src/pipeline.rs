//! Four-stage execution pipeline
//!
//! Retrieval (already performed by the context builder, asserted here)
//! → agents → format → validate, short-circuiting on error. Agents run
//! in waves: parallel-safe agents of a wave fan out concurrently under
//! a shared deadline; later waves see the accumulated outputs of
//! earlier ones. A single failed agent becomes a warning; the stage
//! fails only when every agent of the command failed.

use std::sync::Arc;
use std::time::Duration;

use newsloom_agents::{Agent, AgentContext, AgentError};
use newsloom_config::PolicyConfig;
use newsloom_core::outputs::AgentOutput;
use newsloom_core::types::{AnalysisResponse, ErrorCode};
use newsloom_core::{NewsloomError, Result};
use newsloom_policy::PolicyValidator;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::format::format_response;

/// Agent waves for one command: inner slices fan out concurrently
pub type AgentWaves = Vec<Vec<Arc<dyn Agent>>>;

/// The shared four-stage pipeline
pub struct Pipeline {
    validator: PolicyValidator,
}

impl Pipeline {
    /// Build over the deployment policy
    #[must_use]
    pub fn new(policy: &PolicyConfig) -> Self {
        Self {
            validator: PolicyValidator::new(policy),
        }
    }

    /// Run all four stages
    ///
    /// # Errors
    /// Propagates stage failures as typed errors; the orchestrator
    /// turns them into the wire error response.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        waves: AgentWaves,
        base_agent_ctx: AgentContext,
    ) -> Result<AnalysisResponse> {
        // stage 1: retrieval invariants
        Self::assert_retrieval(ctx)?;

        // stage 2: agent waves under a request-wide deadline watchdog
        let cancel = base_agent_ctx.cancel.clone();
        let remaining = ctx.ledger.remaining_duration();
        let watchdog = tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            cancel.cancel();
        });
        let outcome = self.run_agents(ctx, waves, base_agent_ctx).await;
        watchdog.abort();
        let (outputs, agent_warnings) = outcome?;

        // stage 3: format
        let mut response = format_response(ctx, &outputs, agent_warnings)?;

        // stage 4: validate
        self.validator
            .validate(&mut response, ctx.user_lang.display_language())?;
        info!(command = %ctx.command, "pipeline complete");
        Ok(response)
    }

    fn assert_retrieval(ctx: &RequestContext) -> Result<()> {
        if !ctx.skip_retrieval {
            if ctx.docs.is_empty() {
                return Err(NewsloomError::no_data("retrieval stage produced no documents"));
            }
            if ctx.docs.len() > ctx.params.k_final {
                return Err(NewsloomError::internal(
                    "retrieval stage exceeded k_final bound",
                ));
            }
        }
        Ok(())
    }

    async fn run_agents(
        &self,
        ctx: &RequestContext,
        waves: AgentWaves,
        base_agent_ctx: AgentContext,
    ) -> Result<(Vec<AgentOutput>, Vec<String>)> {
        let mut outputs: Vec<AgentOutput> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut failure_codes: Vec<ErrorCode> = Vec::new();
        let mut total_agents = 0usize;

        for wave in waves {
            let agent_ctx = base_agent_ctx
                .clone()
                .with_prior_outputs(outputs.clone());
            let (parallel, serial): (Vec<_>, Vec<_>) =
                wave.into_iter().partition(|agent| agent.parallel_safe());
            total_agents += parallel.len() + serial.len();

            // parallel fan-out with per-agent deadline
            let mut set: JoinSet<(usize, std::result::Result<AgentOutput, AgentError>)> =
                JoinSet::new();
            for (index, agent) in parallel.into_iter().enumerate() {
                let agent_ctx = agent_ctx.clone();
                let timeout = Self::agent_deadline(ctx, agent.as_ref());
                set.spawn(async move {
                    let name = agent.name();
                    let run = tokio::time::timeout(timeout, agent.run(&agent_ctx)).await;
                    let result = run.unwrap_or_else(|_| {
                        Err(AgentError::internal(name, format!("timed out after {timeout:?}")))
                    });
                    (index, result)
                });
            }
            let mut wave_results: Vec<(usize, std::result::Result<AgentOutput, AgentError>)> =
                Vec::new();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(entry) => wave_results.push(entry),
                    Err(join_err) => {
                        warn!(error = %join_err, "agent task panicked");
                        failure_codes.push(ErrorCode::Internal);
                        warnings.push(format!("agent_failed:unknown: {join_err}"));
                    }
                }
            }
            // declared order, not completion order
            wave_results.sort_by_key(|(index, _)| *index);
            for (_, result) in wave_results {
                Self::collect(result, &mut outputs, &mut warnings, &mut failure_codes);
            }

            // serial agents run in declared order and see wave outputs
            for agent in serial {
                let agent_ctx = base_agent_ctx
                    .clone()
                    .with_prior_outputs(outputs.clone());
                let timeout = Self::agent_deadline(ctx, agent.as_ref());
                let name = agent.name();
                let run = tokio::time::timeout(timeout, agent.run(&agent_ctx)).await;
                let result = run.unwrap_or_else(|_| {
                    Err(AgentError::internal(name, format!("timed out after {timeout:?}")))
                });
                Self::collect(result, &mut outputs, &mut warnings, &mut failure_codes);
            }
        }

        if outputs.is_empty() && total_agents > 0 {
            let code = Self::dominant_code(&failure_codes);
            let detail = warnings.join("; ");
            warn!(?code, "every agent of the command failed");
            return Err(match code {
                ErrorCode::BudgetExceeded => NewsloomError::budget_exceeded(detail),
                ErrorCode::ModelUnavailable => NewsloomError::model_unavailable(detail),
                ErrorCode::NoData => NewsloomError::no_data(detail),
                _ => NewsloomError::internal(detail),
            });
        }
        debug!(
            outputs = outputs.len(),
            warnings = warnings.len(),
            "agents stage complete"
        );
        Ok((outputs, warnings))
    }

    fn collect(
        result: std::result::Result<AgentOutput, AgentError>,
        outputs: &mut Vec<AgentOutput>,
        warnings: &mut Vec<String>,
        failure_codes: &mut Vec<ErrorCode>,
    ) {
        match result {
            Ok(output) => outputs.push(output),
            Err(err) => {
                warn!(agent = err.agent, error = %err, "agent failed, recording warning");
                warnings.push(format!("agent_failed:{}: {}", err.agent, err.message));
                failure_codes.push(err.code);
            }
        }
    }

    fn agent_deadline(ctx: &RequestContext, agent: &dyn Agent) -> Duration {
        let route_timeout = ctx.routes.route(agent.task()).timeout;
        // iterative agents make several routed calls
        let allowance = if agent.parallel_safe() {
            route_timeout
        } else {
            route_timeout * 3
        };
        allowance.min(ctx.ledger.remaining_duration()).max(Duration::from_millis(10))
    }

    fn dominant_code(codes: &[ErrorCode]) -> ErrorCode {
        if codes.contains(&ErrorCode::BudgetExceeded) {
            ErrorCode::BudgetExceeded
        } else if codes.contains(&ErrorCode::ModelUnavailable) {
            ErrorCode::ModelUnavailable
        } else if !codes.is_empty() && codes.iter().all(|c| *c == ErrorCode::NoData) {
            ErrorCode::NoData
        } else {
            ErrorCode::Internal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_code_priority() {
        assert_eq!(
            Pipeline::dominant_code(&[ErrorCode::Internal, ErrorCode::BudgetExceeded]),
            ErrorCode::BudgetExceeded
        );
        assert_eq!(
            Pipeline::dominant_code(&[ErrorCode::NoData, ErrorCode::ModelUnavailable]),
            ErrorCode::ModelUnavailable
        );
        assert_eq!(
            Pipeline::dominant_code(&[ErrorCode::NoData, ErrorCode::NoData]),
            ErrorCode::NoData
        );
        assert_eq!(Pipeline::dominant_code(&[]), ErrorCode::Internal);
    }
}
