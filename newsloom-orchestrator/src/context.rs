//! Context builder
//!
//! Transforms a raw command into a validated execution context: parsed
//! parameters overlaid on defaults, the resolved route table, a fresh
//! budget ledger, and retrieved documents — with auto-recovery when the
//! initial retrieval comes back empty (window ladder, filter
//! relaxation, rerank-off fallback).

use std::sync::Arc;

use newsloom_agents::AgentParams;
use newsloom_config::NewsloomConfig;
use newsloom_core::outputs::MemoryOp;
use newsloom_core::routes::RouteTable;
use newsloom_core::types::{CommandKind, Document, LangPref};
use newsloom_core::{BudgetLedger, NewsloomError, Result};
use newsloom_retrieval::{RetrievalParams, Retriever};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::command::{parse_command, ParsedCommand};
use crate::intent::is_general_knowledge;

/// Window-ladder expansions attempted before giving up
const MAX_WINDOW_EXPANSIONS: usize = 5;
/// Smallest viable per-command budget floors
const MIN_BUDGET_TOKENS: u64 = 2048;
const MIN_BUDGET_CENTS: f64 = 25.0;
const MIN_BUDGET_SECS: u64 = 8;

/// A validated execution context for one request
#[derive(Debug)]
pub struct RequestContext {
    pub command: CommandKind,
    pub params: AgentParams,
    /// Raw parsed arguments, for command-specific extras (search paging)
    pub parsed: ParsedCommand,
    pub docs: Vec<Document>,
    pub ledger: Arc<BudgetLedger>,
    pub routes: Arc<RouteTable>,
    pub correlation_id: Uuid,
    pub user_lang: LangPref,
    pub skip_retrieval: bool,
}

/// Builds validated request contexts
pub struct ContextBuilder {
    config: NewsloomConfig,
    retriever: Arc<Retriever>,
    routes: Arc<RouteTable>,
}

impl ContextBuilder {
    /// Build over a retriever and deployment configuration
    #[must_use]
    pub fn new(config: NewsloomConfig, retriever: Arc<Retriever>) -> Self {
        let routes = Arc::new(config.providers.route_table());
        Self {
            config,
            retriever,
            routes,
        }
    }

    /// Build a context for a raw command line
    ///
    /// # Errors
    /// - [`NewsloomError::Validation`] for unknown commands, malformed
    ///   arguments, or missing required arguments.
    /// - [`NewsloomError::NoData`] when retrieval stays empty after
    ///   every recovery attempt.
    #[instrument(skip(self), fields(correlation_id))]
    pub async fn build(
        &self,
        raw: &str,
        user_id: Option<&str>,
        user_lang: LangPref,
    ) -> Result<RequestContext> {
        let correlation_id = Uuid::new_v4();
        tracing::Span::current().record("correlation_id", tracing::field::display(correlation_id));

        let parsed = parse_command(raw)?;
        let params = self.build_params(&parsed, user_id, user_lang)?;
        Self::check_required_args(&parsed, &params)?;

        let ledger = Arc::new(BudgetLedger::new(self.config.budget.per_command_limits()));
        self.validate_budget_floors()?;

        let skip_retrieval = match parsed.kind {
            CommandKind::MemorySuggest | CommandKind::MemoryStore | CommandKind::MemoryRecall => {
                true
            }
            // search pages through the retrieval API instead
            CommandKind::Search => true,
            CommandKind::Ask => is_general_knowledge(&params.query),
            _ => false,
        };

        let mut params = params;
        let docs = if skip_retrieval {
            debug!(command = %parsed.kind, "retrieval skipped for this intent");
            Vec::new()
        } else {
            self.retrieve_with_recovery(&mut params, &ledger).await?
        };

        Self::validate_context(&params, &docs, skip_retrieval)?;
        info!(
            command = %parsed.kind,
            docs = docs.len(),
            window = %params.window,
            %correlation_id,
            "context built"
        );
        Ok(RequestContext {
            command: parsed.kind,
            params,
            parsed,
            docs,
            ledger,
            routes: self.routes.clone(),
            correlation_id,
            user_lang,
            skip_retrieval,
        })
    }

    /// Effective route table
    #[must_use]
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.clone()
    }

    fn build_params(
        &self,
        parsed: &ParsedCommand,
        user_id: Option<&str>,
        user_lang: LangPref,
    ) -> Result<AgentParams> {
        let retrieval = &self.config.retrieval;

        let window = parsed.window()?.unwrap_or(retrieval.window_default);
        let lang = parsed.lang()?.unwrap_or(user_lang);
        let k_final = parsed.k()?.unwrap_or(retrieval.k_final_default);
        let use_rerank = if parsed.has_flag("no-rerank") {
            false
        } else if parsed.has_flag("rerank") {
            true
        } else {
            retrieval.enable_rerank
        };
        let depth = parsed.bounded_u8("depth", 1, 3)?.unwrap_or(2);
        let hop_limit = parsed.bounded_u8("hops", 1, 4)?.unwrap_or(2);

        // query priority: query | topic | entity | free text | default
        let query = parsed
            .args
            .get("query")
            .or_else(|| parsed.args.get("topic"))
            .or_else(|| parsed.args.get("entity"))
            .cloned()
            .or_else(|| {
                (!parsed.free_text.is_empty()).then(|| parsed.free_text.clone())
            })
            .unwrap_or_else(|| "latest news".to_string());

        let memory_op = match parsed.kind {
            CommandKind::MemorySuggest => Some(MemoryOp::Suggest),
            CommandKind::MemoryStore => Some(MemoryOp::Store),
            CommandKind::MemoryRecall => Some(MemoryOp::Recall),
            _ => None,
        };
        let memory_content = parsed
            .args
            .get("content")
            .cloned()
            .or_else(|| (!parsed.free_text.is_empty()).then(|| parsed.free_text.clone()));

        Ok(AgentParams {
            query,
            window,
            lang,
            k_final,
            use_rerank,
            depth,
            self_check: true,
            hop_limit,
            max_nodes: 200,
            max_edges: 600,
            skip_alternatives: false,
            recall_only: false,
            user_id: user_id.map(String::from),
            memory_op,
            memory_content,
            domains: parsed.comma_list("domains").unwrap_or_default(),
            sources: parsed.comma_list("sources"),
        })
    }

    fn check_required_args(parsed: &ParsedCommand, params: &AgentParams) -> Result<()> {
        let explicit_query = parsed.args.contains_key("query")
            || parsed.args.contains_key("topic")
            || parsed.args.contains_key("entity")
            || !parsed.free_text.is_empty();
        match parsed.kind {
            CommandKind::AnalyzeKeywords
            | CommandKind::Ask
            | CommandKind::GraphQuery
            | CommandKind::Search
            | CommandKind::MemoryRecall => {
                if !explicit_query {
                    return Err(NewsloomError::validation(format!(
                        "{} requires a query",
                        parsed.kind
                    )));
                }
            }
            CommandKind::AnalyzeCompetitors => {
                if params.domains.is_empty() && !parsed.args.contains_key("niche") {
                    return Err(NewsloomError::validation(
                        "/analyze competitors requires domains= or niche=",
                    ));
                }
            }
            CommandKind::MemorySuggest | CommandKind::MemoryStore => {
                if params.memory_content.is_none() {
                    return Err(NewsloomError::validation(format!(
                        "{} requires content",
                        parsed.kind
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate_budget_floors(&self) -> Result<()> {
        let budget = &self.config.budget;
        if budget.max_tokens_per_command < MIN_BUDGET_TOKENS
            || budget.max_cost_cents_per_command < MIN_BUDGET_CENTS
            || budget.max_duration_sec < MIN_BUDGET_SECS
        {
            return Err(NewsloomError::validation(
                "per-command budget below viable floor",
            ));
        }
        Ok(())
    }

    /// Retrieve with the auto-recovery ladder
    ///
    /// Mutates `params` to the settings that finally produced documents
    /// so downstream agents see what retrieval actually used.
    async fn retrieve_with_recovery(
        &self,
        params: &mut AgentParams,
        ledger: &BudgetLedger,
    ) -> Result<Vec<Document>> {
        let retrieval_config = &self.config.retrieval;
        let mut attempts: Vec<String> = Vec::new();

        let mut request = RetrievalParams {
            query: params.query.clone(),
            window: params.window,
            lang: params.lang,
            sources: params.sources.clone(),
            k_final: params.k_final,
            use_rerank: params.use_rerank,
        };

        attempts.push(format!("window={}", request.window));
        let docs = self.retriever.retrieve(&request).await?;
        if !docs.is_empty() {
            return Ok(docs);
        }

        if retrieval_config.auto_expand_window {
            let mut expansions = 0;
            while expansions < MAX_WINDOW_EXPANSIONS {
                let Some(wider) = request.window.widen() else {
                    break;
                };
                let tag = format!(
                    "degradation_window_expanded:{}→{}",
                    request.window, wider
                );
                ledger.add_warning(tag);
                request.window = wider;
                expansions += 1;
                attempts.push(format!("window={wider}"));
                let docs = self.retriever.retrieve(&request).await?;
                if !docs.is_empty() {
                    params.window = wider;
                    return Ok(docs);
                }
            }
        }

        if retrieval_config.relax_filters_on_empty
            && (request.lang != LangPref::Auto || request.sources.is_some())
        {
            ledger.add_warning("degradation_filters_relaxed");
            request.lang = LangPref::Auto;
            request.sources = None;
            attempts.push("filters=relaxed".to_string());
            let docs = self.retriever.retrieve(&request).await?;
            if !docs.is_empty() {
                params.lang = LangPref::Auto;
                params.sources = None;
                params.window = request.window;
                return Ok(docs);
            }
        }

        if retrieval_config.fallback_rerank_off_on_empty && request.use_rerank {
            ledger.add_warning("degradation_rerank_disabled");
            request.use_rerank = false;
            request.k_final = 10;
            attempts.push("rerank=off k=10".to_string());
            let docs = self.retriever.retrieve(&request).await?;
            if !docs.is_empty() {
                params.use_rerank = false;
                params.k_final = 10;
                params.window = request.window;
                return Ok(docs);
            }
        }

        warn!(query = %params.query, attempts = attempts.len(), "retrieval exhausted all recovery steps");
        Err(NewsloomError::no_data(format!(
            "no documents for {:?}; attempted: {}",
            params.query,
            attempts.join(", ")
        )))
    }

    fn validate_context(
        params: &AgentParams,
        docs: &[Document],
        skip_retrieval: bool,
    ) -> Result<()> {
        if !(5..=10).contains(&params.k_final) {
            return Err(NewsloomError::validation(format!(
                "k_final {} outside [5, 10]",
                params.k_final
            )));
        }
        if !skip_retrieval {
            if docs.is_empty() {
                return Err(NewsloomError::validation(
                    "context has no documents after retrieval",
                ));
            }
            if docs.len() > params.k_final {
                return Err(NewsloomError::validation(format!(
                    "retrieval returned {} documents for k_final {}",
                    docs.len(),
                    params.k_final
                )));
            }
            let mut ids: Vec<&str> = docs
                .iter()
                .filter_map(|d| d.article_id.as_deref())
                .collect();
            let before = ids.len();
            ids.sort_unstable();
            ids.dedup();
            if ids.len() != before {
                return Err(NewsloomError::validation("duplicate article ids in context"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use newsloom_core::types::{Language, Window};
    use newsloom_retrieval::{InMemoryIndex, StoredArticle};
    use std::time::Duration;

    fn article(id: &str, days_ago: i64, text: &str) -> StoredArticle {
        StoredArticle {
            article_id: id.to_string(),
            title: text.to_string(),
            url: Some(format!("https://news.example/{id}")),
            published_date: Utc::now().date_naive() - chrono::Duration::days(days_ago),
            language: Language::En,
            content: text.to_string(),
            source_domain: Some("news.example".to_string()),
        }
    }

    fn builder(articles: Vec<StoredArticle>) -> ContextBuilder {
        let index = InMemoryIndex::new(128);
        index.insert_all(articles);
        let retriever = Arc::new(Retriever::new(Arc::new(index), None, Duration::ZERO));
        ContextBuilder::new(NewsloomConfig::default(), retriever)
    }

    #[tokio::test]
    async fn test_build_happy_path() {
        let b = builder((0..8).map(|i| article(&format!("a{i}"), 0, "ai news")).collect());
        let ctx = b
            .build("/trends window=24h lang=en", Some("u1"), LangPref::En)
            .await
            .unwrap();
        assert_eq!(ctx.command, CommandKind::Trends);
        assert!(!ctx.docs.is_empty());
        assert!(ctx.docs.len() <= ctx.params.k_final);
        assert!(!ctx.skip_retrieval);
    }

    #[tokio::test]
    async fn test_window_ladder_recovers() {
        // nothing today, three documents last week
        let b = builder(vec![
            article("old1", 5, "niche topic deep dive"),
            article("old2", 6, "niche topic follow-up"),
            article("old3", 6, "niche topic reaction"),
        ]);
        let ctx = b
            .build("/ask query=\"niche topic\" window=6h", None, LangPref::En)
            .await
            .unwrap();
        assert!(!ctx.docs.is_empty());
        assert!(ctx.params.window > Window::H6);
        let warnings = ctx.ledger.warnings();
        assert!(warnings
            .iter()
            .any(|w| w.starts_with("degradation_window_expanded:")));
    }

    #[tokio::test]
    async fn test_no_data_lists_attempts() {
        let b = builder(vec![]);
        let err = b
            .build("/ask query=\"xyzzy quxplox\" window=24h", None, LangPref::En)
            .await
            .unwrap_err();
        let NewsloomError::NoData { message } = err else {
            panic!("expected NoData, got {err:?}")
        };
        // initial attempt plus five ladder expansions
        let windows = message.matches("window=").count();
        assert!(windows >= 6, "tech message was: {message}");
    }

    #[tokio::test]
    async fn test_memory_commands_skip_retrieval() {
        let b = builder(vec![]);
        let ctx = b
            .build("/memory store content=\"AI fact\"", Some("u1"), LangPref::En)
            .await
            .unwrap();
        assert!(ctx.skip_retrieval);
        assert!(ctx.docs.is_empty());
        assert_eq!(ctx.params.memory_op, Some(MemoryOp::Store));
    }

    #[tokio::test]
    async fn test_general_knowledge_ask_skips_retrieval() {
        let b = builder(vec![]);
        let ctx = b
            .build("/ask query=\"what is a transformer model\"", None, LangPref::En)
            .await
            .unwrap();
        assert!(ctx.skip_retrieval);
    }

    #[tokio::test]
    async fn test_missing_required_args_rejected() {
        let b = builder(vec![]);
        assert!(b.build("/ask", None, LangPref::En).await.is_err());
        assert!(b
            .build("/analyze competitors", None, LangPref::En)
            .await
            .is_err());
        assert!(b.build("/memory store", None, LangPref::En).await.is_err());
    }

    #[tokio::test]
    async fn test_rerank_flags_override_config() {
        let b = builder((0..6).map(|i| article(&format!("a{i}"), 0, "ai news")).collect());
        let ctx = b
            .build("/trends no-rerank", None, LangPref::En)
            .await
            .unwrap();
        assert!(!ctx.params.use_rerank);
    }
}
