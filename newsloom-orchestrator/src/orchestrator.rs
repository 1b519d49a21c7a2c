//! Orchestrator
//!
//! Entry point for every command: admits the request against user
//! quotas, builds the context, applies the budget degradation plan,
//! dispatches the command's agent waves through the pipeline, and emits
//! exactly one canonical response — success or typed error. The request
//! walks an explicit state machine; no state survives the response.

use std::sync::Arc;

use newsloom_agents::{
    Agent, AgentContext, AgenticRagAgent, CompetitorNewsAgent, EventsAgent, GraphAgent,
    KeyphraseAgent, MemoryOpsAgent, QueryExpansionAgent, SentimentAgent, SynthesisAgent,
    TopicsAgent, TrendForecasterAgent,
};
use newsloom_config::NewsloomConfig;
use newsloom_core::outputs::{FreshnessStats, SearchItem, SearchOutput};
use newsloom_core::types::{
    AnalysisResponse, CommandKind, ErrorResponse, LangPref, Language, Meta,
};
use newsloom_core::{NewsloomError, Result};
use newsloom_memory::MemoryStore;
use newsloom_policy::PolicyValidator;
use newsloom_providers::ModelRouter;
use newsloom_retrieval::api::{search_page, RetrieveFilters, RetrieveRequest};
use newsloom_retrieval::{DocumentIndex, Retriever, TermOverlapReranker};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::context::{ContextBuilder, RequestContext};
use crate::format::format_search;
use crate::pipeline::{AgentWaves, Pipeline};
use crate::quota::QuotaTracker;

/// Per-request lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Received,
    ContextBuilt,
    AgentsDone,
    Validated,
    Emitted,
    Errored,
}

/// One response per request: success or typed failure, never both
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Success(Box<AnalysisResponse>),
    Failure(Box<ErrorResponse>),
}

impl CommandOutcome {
    /// Success payload, if any
    #[must_use]
    pub fn response(&self) -> Option<&AnalysisResponse> {
        match self {
            Self::Success(response) => Some(response),
            Self::Failure(_) => None,
        }
    }

    /// Failure payload, if any
    #[must_use]
    pub fn error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }
}

/// Command dispatch and request lifecycle ownership
pub struct Orchestrator {
    builder: ContextBuilder,
    pipeline: Pipeline,
    retriever: Arc<Retriever>,
    index: Arc<dyn DocumentIndex>,
    memory: Arc<dyn MemoryStore>,
    router: Arc<ModelRouter>,
    quotas: QuotaTracker,
    validator: PolicyValidator,
    config: NewsloomConfig,
}

impl Orchestrator {
    /// Wire the engine over its process-wide collaborators
    #[must_use]
    pub fn new(
        config: NewsloomConfig,
        index: Arc<dyn DocumentIndex>,
        memory: Arc<dyn MemoryStore>,
        router: Arc<ModelRouter>,
    ) -> Self {
        let reranker = config
            .retrieval
            .enable_rerank
            .then(|| Arc::new(TermOverlapReranker::default()) as _);
        let retriever = Arc::new(Retriever::new(
            index.clone(),
            reranker,
            std::time::Duration::from_secs(config.retrieval.cache_ttl_sec),
        ));
        let builder = ContextBuilder::new(config.clone(), retriever.clone());
        let pipeline = Pipeline::new(&config.policy);
        let quotas = QuotaTracker::new(
            config.budget.max_commands_per_user_daily,
            config.budget.max_cost_cents_per_user_daily,
        );
        let validator = PolicyValidator::new(&config.policy);
        Self {
            builder,
            pipeline,
            retriever,
            index,
            memory,
            router,
            quotas,
            validator,
            config,
        }
    }

    /// Handle one command end to end
    #[instrument(skip(self), fields(user = user_id.unwrap_or("-")))]
    pub async fn handle(
        &self,
        raw: &str,
        user_id: Option<&str>,
        user_lang: LangPref,
    ) -> CommandOutcome {
        let mut state = RequestState::Received;
        debug!(?state, "request received");

        if let Err(err) = self.quotas.admit(user_id) {
            return self.emit_error(&err, user_lang, None);
        }

        let ctx = match self.builder.build(raw, user_id, user_lang).await {
            Ok(ctx) => ctx,
            Err(err) => {
                state = RequestState::Errored;
                debug!(?state, "context build failed");
                return self.emit_error(&err, user_lang, None);
            }
        };
        state = RequestState::ContextBuilt;
        debug!(?state, command = %ctx.command, "context ready");

        let outcome = if ctx.command == CommandKind::Search {
            self.run_search(&ctx).await
        } else {
            self.run_pipeline(&ctx).await
        };

        self.quotas
            .settle(user_id, ctx.ledger.snapshot().cost_cents_used);

        match outcome {
            Ok(response) => {
                state = RequestState::Emitted;
                info!(
                    ?state,
                    command = %ctx.command,
                    correlation_id = %ctx.correlation_id,
                    warnings = response.warnings.len(),
                    "request complete"
                );
                CommandOutcome::Success(Box::new(response))
            }
            Err(err) => {
                state = RequestState::Errored;
                warn!(?state, command = %ctx.command, error = %err, "request failed");
                self.emit_error(&err, user_lang, Some(ctx.correlation_id))
            }
        }
    }

    async fn run_pipeline(&self, ctx: &RequestContext) -> Result<AnalysisResponse> {
        // ratio-band degradation on the request's own parameters
        let mut ctx = RequestContext {
            command: ctx.command,
            params: ctx.params.clone(),
            parsed: ctx.parsed.clone(),
            docs: ctx.docs.clone(),
            ledger: ctx.ledger.clone(),
            routes: ctx.routes.clone(),
            correlation_id: ctx.correlation_id,
            user_lang: ctx.user_lang,
            skip_retrieval: ctx.skip_retrieval,
        };
        Self::apply_degradation(&mut ctx);

        let waves = Self::dispatch(ctx.command);
        let mut agent_ctx = AgentContext::new(
            ctx.docs.clone(),
            ctx.params.clone(),
            self.router.clone(),
            ctx.routes.clone(),
            ctx.ledger.clone(),
        );
        // only the commands that need them get the heavyweight handles
        if ctx.command == CommandKind::Ask {
            agent_ctx = agent_ctx.with_retriever(self.retriever.clone());
        }
        if matches!(
            ctx.command,
            CommandKind::MemorySuggest | CommandKind::MemoryStore | CommandKind::MemoryRecall
        ) {
            agent_ctx = agent_ctx.with_memory(self.memory.clone());
        }

        let response = self.pipeline.run(&ctx, waves, agent_ctx).await?;
        debug!(state = ?RequestState::AgentsDone, "pipeline returned");
        debug!(state = ?RequestState::Validated, "response validated");
        Ok(response)
    }

    async fn run_search(&self, ctx: &RequestContext) -> Result<AnalysisResponse> {
        let hours = match ctx.parsed.args.get("hours") {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                NewsloomError::validation(format!("hours must be an integer, got {raw:?}"))
            })?,
            None => u32::try_from(ctx.params.window.duration().num_hours().max(1))
                .unwrap_or(24),
        };
        let k = match ctx.parsed.args.get("k") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| NewsloomError::validation("k must be an integer"))?,
            None => self.config.retrieval.k_final_default,
        };
        let request = RetrieveRequest {
            query: ctx.params.query.clone(),
            hours,
            k,
            filters: RetrieveFilters {
                sources: ctx.params.sources.clone().unwrap_or_default(),
                lang: ctx.params.lang,
            },
            cursor: ctx.parsed.args.get("cursor").cloned(),
            correlation_id: Some(ctx.correlation_id),
        };
        let page = search_page(&self.index, &request).await?;
        let output = SearchOutput {
            items: page
                .items
                .into_iter()
                .map(|item| SearchItem {
                    id: item.id,
                    title: item.title,
                    url: item.url,
                    snippet: item.snippet,
                    ts: item.ts,
                    source: item.source,
                    score: item.score,
                })
                .collect(),
            next_cursor: page.next_cursor,
            coverage: page.coverage,
            freshness_stats: FreshnessStats {
                median_sec: page.freshness_stats.median_sec,
            },
        };
        let mut response = format_search(ctx, output);
        self.validator
            .validate(&mut response, ctx.user_lang.display_language())?;
        Ok(response)
    }

    /// Deterministic parameter degradation from the ledger's ratio band
    fn apply_degradation(ctx: &mut RequestContext) {
        let plan = ctx.ledger.degrade_plan(ctx.command);
        if let Some(depth) = plan.depth {
            ctx.params.depth = depth;
        }
        if !plan.self_check {
            ctx.params.self_check = false;
        }
        if !plan.use_rerank {
            ctx.params.use_rerank = false;
        }
        if let Some(hops) = plan.hop_limit {
            ctx.params.hop_limit = hops;
        }
        if let Some(nodes) = plan.max_nodes {
            ctx.params.max_nodes = nodes;
        }
        if let Some(edges) = plan.max_edges {
            ctx.params.max_edges = edges;
        }
        if let Some(k) = plan.k_final {
            ctx.params.k_final = k;
        }
        if plan.skip_alternatives {
            ctx.params.skip_alternatives = true;
        }
        if plan.recall_only {
            ctx.params.recall_only = true;
        }
    }

    /// Agent waves per command; later waves see earlier outputs
    fn dispatch(command: CommandKind) -> AgentWaves {
        match command {
            CommandKind::Trends => vec![vec![
                Arc::new(TopicsAgent) as Arc<dyn Agent>,
                Arc::new(SentimentAgent),
            ]],
            CommandKind::AnalyzeKeywords => vec![vec![
                Arc::new(KeyphraseAgent) as Arc<dyn Agent>,
                Arc::new(QueryExpansionAgent),
            ]],
            CommandKind::AnalyzeSentiment => {
                vec![vec![Arc::new(SentimentAgent) as Arc<dyn Agent>]]
            }
            CommandKind::AnalyzeTopics => vec![vec![Arc::new(TopicsAgent) as Arc<dyn Agent>]],
            CommandKind::AnalyzeCompetitors => {
                vec![vec![Arc::new(CompetitorNewsAgent) as Arc<dyn Agent>]]
            }
            CommandKind::PredictTrends => {
                vec![vec![Arc::new(TrendForecasterAgent) as Arc<dyn Agent>]]
            }
            CommandKind::Synthesize => vec![
                vec![
                    Arc::new(TopicsAgent) as Arc<dyn Agent>,
                    Arc::new(SentimentAgent),
                    Arc::new(TrendForecasterAgent),
                ],
                vec![Arc::new(SynthesisAgent) as Arc<dyn Agent>],
            ],
            CommandKind::Ask => vec![vec![Arc::new(AgenticRagAgent) as Arc<dyn Agent>]],
            CommandKind::EventsLink => vec![vec![Arc::new(EventsAgent) as Arc<dyn Agent>]],
            CommandKind::GraphQuery => vec![vec![Arc::new(GraphAgent) as Arc<dyn Agent>]],
            CommandKind::MemorySuggest | CommandKind::MemoryStore | CommandKind::MemoryRecall => {
                vec![vec![Arc::new(MemoryOpsAgent) as Arc<dyn Agent>]]
            }
            CommandKind::Search => Vec::new(),
        }
    }

    fn emit_error(
        &self,
        err: &NewsloomError,
        user_lang: LangPref,
        correlation_id: Option<Uuid>,
    ) -> CommandOutcome {
        let code = err.code();
        let lang = user_lang.display_language();
        let user_message = match (code, lang) {
            (newsloom_core::ErrorCode::ValidationFailed, Language::En) => {
                "The request could not be validated. Check the command arguments."
            }
            (newsloom_core::ErrorCode::ValidationFailed, Language::Ru) => {
                "Запрос не прошел проверку. Проверьте аргументы команды."
            }
            (newsloom_core::ErrorCode::NoData, Language::En) => {
                "No matching news found. Try a broader query or window."
            }
            (newsloom_core::ErrorCode::NoData, Language::Ru) => {
                "Новости не найдены. Попробуйте расширить запрос или окно."
            }
            (newsloom_core::ErrorCode::BudgetExceeded, Language::En) => {
                "The request budget is exhausted. Try again later."
            }
            (newsloom_core::ErrorCode::BudgetExceeded, Language::Ru) => {
                "Бюджет запроса исчерпан. Повторите позже."
            }
            (newsloom_core::ErrorCode::ModelUnavailable, Language::En) => {
                "The analysis models are temporarily unavailable. Please retry."
            }
            (newsloom_core::ErrorCode::ModelUnavailable, Language::Ru) => {
                "Модели анализа временно недоступны. Повторите попытку."
            }
            (newsloom_core::ErrorCode::Internal, Language::En) => {
                "Something went wrong on our side. Please retry."
            }
            (newsloom_core::ErrorCode::Internal, Language::Ru) => {
                "Произошла внутренняя ошибка. Повторите попытку."
            }
        };
        let mut meta = Meta::new("none");
        if let Some(id) = correlation_id {
            meta.correlation_id = id;
        }
        meta.confidence = 0.0;
        warn!(?code, error = %err, "emitting error response");
        CommandOutcome::Failure(Box::new(ErrorResponse::new(
            code,
            user_message,
            err.to_string(),
            meta,
        )))
    }
}
