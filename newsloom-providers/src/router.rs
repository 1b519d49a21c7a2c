//! Model router
//!
//! Uniform call surface over every registered provider. A call walks the
//! route's candidate chain (primary, then fallbacks) under an end-to-end
//! timeout per attempt, gated by the request ledger. Usage is recorded
//! on the ledger after every attempt so budget decisions downstream see
//! money already spent on failures too.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use newsloom_config::ProvidersConfig;
use newsloom_core::{BudgetLedger, Document, ModelRoute, NewsloomError, Result};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::adapter::{ChatProvider, HttpChatProvider, ProviderFamily};
use crate::cost::{estimate_tokens, CostTable};

/// Token budget for documents folded into the prompt context
const MAX_CONTEXT_TOKENS: u64 = 6000;

/// Default outstanding-call cap per provider family
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Metadata about the attempt that produced a response
#[derive(Debug, Clone, PartialEq)]
pub struct CallMeta {
    /// Model that actually answered
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_cents: f64,
    pub latency: Duration,
    /// Fallback hops before success (0 = primary answered)
    pub fallbacks_used: u32,
}

/// A successful routed completion
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedCall {
    pub text: String,
    pub meta: CallMeta,
}

/// Uniform call surface over multiple LLM providers
///
/// Pure function of provider configuration plus the passed ledger; holds
/// no per-request state. Per-family semaphores bound outstanding calls
/// so one request cannot starve others.
pub struct ModelRouter {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
    limits: HashMap<String, Arc<Semaphore>>,
    costs: CostTable,
}

impl ModelRouter {
    /// Build a router over explicit providers (used by tests and
    /// embedded deployments)
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>, costs: CostTable) -> Self {
        let mut map: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
        let mut limits = HashMap::new();
        for provider in providers {
            limits
                .entry(provider.family().to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)));
            map.insert(provider.model().to_string(), provider);
        }
        Self {
            providers: map,
            limits,
            costs,
        }
    }

    /// Build a router from the deployment configuration
    #[must_use]
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let client = reqwest::Client::new();
        let mut providers: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
        let mut limits: HashMap<String, Arc<Semaphore>> = HashMap::new();
        for (model, endpoint) in &config.models {
            let Some(family) = ProviderFamily::parse(&endpoint.provider) else {
                warn!(model = %model, provider = %endpoint.provider, "skipping unknown provider family");
                continue;
            };
            let adapter = HttpChatProvider::new(
                model.clone(),
                family,
                endpoint.endpoint.clone(),
                endpoint.api_key_env.as_deref(),
                client.clone(),
            );
            limits
                .entry(adapter.family().to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(endpoint.max_concurrent)));
            providers.insert(model.clone(), Arc::new(adapter));
        }
        Self {
            providers,
            limits,
            costs: CostTable::from_config(config),
        }
    }

    /// Fold retrieved documents into a provider-agnostic prompt
    ///
    /// Documents are appended as numbered source blocks until the
    /// context token budget runs out; the instruction text always fits.
    #[must_use]
    pub fn build_prompt(prompt: &str, docs: &[Document]) -> String {
        if docs.is_empty() {
            return prompt.to_string();
        }
        let mut out = String::with_capacity(prompt.len() + docs.len() * 280);
        out.push_str(prompt);
        out.push_str("\n\nSources:\n");
        let mut used = estimate_tokens(&out);
        for (i, doc) in docs.iter().enumerate() {
            let block = format!(
                "[{}] {} ({}) — {}\n",
                i + 1,
                doc.title,
                doc.published_date.format("%Y-%m-%d"),
                doc.snippet
            );
            let block_tokens = estimate_tokens(&block);
            if used + block_tokens > MAX_CONTEXT_TOKENS {
                debug!(included = i, total = docs.len(), "context budget reached");
                break;
            }
            out.push_str(&block);
            used += block_tokens;
        }
        out
    }

    /// Call a route, falling through its chain on failure
    ///
    /// # Errors
    /// - [`NewsloomError::BudgetExceeded`] when the ledger cannot afford
    ///   the first attempt.
    /// - [`NewsloomError::ModelUnavailable`] iff every candidate failed.
    pub async fn call(
        &self,
        route: &ModelRoute,
        prompt: &str,
        docs: &[Document],
        max_tokens: u32,
        ledger: &BudgetLedger,
    ) -> Result<RoutedCall> {
        let full_prompt = Self::build_prompt(prompt, docs);
        let est_in = estimate_tokens(&full_prompt);
        let mut last_error: Option<NewsloomError> = None;

        for (hop, model) in route.candidates().into_iter().enumerate() {
            let est_cost = self
                .costs
                .estimate_cents(model, est_in, u64::from(max_tokens));
            if !ledger.can_afford(est_in + u64::from(max_tokens), est_cost) {
                if hop == 0 {
                    return Err(NewsloomError::budget_exceeded(format!(
                        "cannot afford {} call for task {}",
                        model, route.task
                    )));
                }
                debug!(model = %model, "ledger cannot afford fallback attempt, stopping chain");
                break;
            }

            let Some(provider) = self.providers.get(model) else {
                warn!(model = %model, "route names an unregistered model");
                last_error = Some(NewsloomError::provider(
                    "router",
                    format!("unregistered model {model}"),
                ));
                continue;
            };

            let attempt_timeout = route.timeout.min(ledger.remaining_duration());
            if attempt_timeout.is_zero() {
                last_error = Some(NewsloomError::budget_exceeded("request deadline passed"));
                break;
            }

            let permit = match self.limits.get(provider.family()) {
                Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
                None => None,
            };

            let started = Instant::now();
            let outcome = tokio::time::timeout(
                attempt_timeout,
                provider.complete(&full_prompt, max_tokens, attempt_timeout),
            )
            .await;
            let latency = started.elapsed();
            drop(permit);

            match outcome {
                Ok(Ok(response)) => {
                    let tokens_in = response.tokens_in.unwrap_or(est_in);
                    let tokens_out = response
                        .tokens_out
                        .unwrap_or_else(|| estimate_tokens(&response.text));
                    let cost_cents = self.costs.estimate_cents(model, tokens_in, tokens_out);
                    ledger.record(tokens_in + tokens_out, cost_cents, latency);
                    info!(
                        model = %model,
                        task = %route.task,
                        tokens_in,
                        tokens_out,
                        ?latency,
                        hop,
                        "model call succeeded"
                    );
                    return Ok(RoutedCall {
                        text: response.text,
                        meta: CallMeta {
                            model: model.to_string(),
                            tokens_in,
                            tokens_out,
                            cost_cents,
                            latency,
                            fallbacks_used: u32::try_from(hop).unwrap_or(u32::MAX),
                        },
                    });
                }
                Ok(Err(err)) => {
                    // the attempt consumed input-side work upstream
                    let cost_cents = self.costs.estimate_cents(model, est_in, 0);
                    ledger.record(est_in, cost_cents, latency);
                    warn!(model = %model, error = %err, "model attempt failed, trying next");
                    last_error = Some(err);
                }
                Err(_elapsed) => {
                    let cost_cents = self.costs.estimate_cents(model, est_in, 0);
                    ledger.record(est_in, cost_cents, latency);
                    warn!(model = %model, ?attempt_timeout, "model attempt timed out, trying next");
                    last_error = Some(NewsloomError::provider(
                        provider.family(),
                        format!("timeout after {attempt_timeout:?}"),
                    ));
                }
            }
        }

        match last_error {
            Some(NewsloomError::BudgetExceeded { message }) => {
                Err(NewsloomError::BudgetExceeded { message })
            }
            Some(err) => Err(NewsloomError::model_unavailable(format!(
                "all candidates failed for task {}: {err}",
                route.task
            ))),
            None => Err(NewsloomError::budget_exceeded(format!(
                "no affordable candidate for task {}",
                route.task
            ))),
        }
    }
}
