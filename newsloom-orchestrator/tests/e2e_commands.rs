//! End-to-end command scenarios
//!
//! Drives the full engine — orchestrator, context builder, retriever,
//! agents, policy — over an in-memory corpus and scripted providers.

use std::sync::Arc;

use chrono::Utc;
use newsloom_config::NewsloomConfig;
use newsloom_core::embedding::HashEmbedder;
use newsloom_core::outputs::CommandResult;
use newsloom_core::types::{ErrorCode, LangPref, Language};
use newsloom_memory::InMemoryMemoryStore;
use newsloom_orchestrator::{CommandOutcome, Orchestrator};
use newsloom_providers::{ChatProvider, CostTable, ModelRouter, StubProvider};
use newsloom_retrieval::{InMemoryIndex, StoredArticle};

const MODELS: [&str; 3] = ["gpt-4o", "claude-3-5-sonnet", "gemini-2.0-flash"];

fn article(id: &str, days_ago: i64, title: &str, content: &str) -> StoredArticle {
    StoredArticle {
        article_id: id.to_string(),
        title: title.to_string(),
        url: Some(format!("https://news.example/{id}")),
        published_date: Utc::now().date_naive() - chrono::Duration::days(days_ago),
        language: Language::En,
        content: content.to_string(),
        source_domain: Some("news.example".to_string()),
    }
}

/// Twenty fresh English articles with disjoint topic vocabulary
fn trends_corpus() -> Vec<StoredArticle> {
    let topics = [
        ("chip", "semiconductor shortage deepens"),
        ("bank", "merger scrutiny intensifies"),
        ("climate", "summit accord ratified"),
        ("energy", "pipeline capacity expanded"),
        ("retail", "holiday spending jumped"),
        ("crypto", "exchange audit concluded"),
        ("auto", "recall investigation widened"),
        ("pharma", "trial milestone reached"),
        ("telecom", "spectrum auction opened"),
        ("aviation", "orders backlog swelled"),
    ];
    (0..20)
        .map(|i| {
            let (anchor, rest) = topics[i % topics.len()];
            article(
                &format!("a{i:02}"),
                0,
                &format!("{anchor} {rest} news"),
                &format!("latest {anchor} {rest}"),
            )
        })
        .collect()
}

fn stub_router(answer: &str) -> Arc<ModelRouter> {
    let providers: Vec<Arc<dyn ChatProvider>> = MODELS
        .iter()
        .map(|m| Arc::new(StubProvider::answering(*m, answer)) as Arc<dyn ChatProvider>)
        .collect();
    Arc::new(ModelRouter::new(providers, CostTable::empty()))
}

fn engine_with(corpus: Vec<StoredArticle>, router: Arc<ModelRouter>) -> Orchestrator {
    let index = InMemoryIndex::new(256);
    index.insert_all(corpus);
    let memory = Arc::new(InMemoryMemoryStore::new(Arc::new(HashEmbedder::new(256))));
    let mut config = NewsloomConfig::default();
    config.retrieval.cache_ttl_sec = 0;
    Orchestrator::new(config, Arc::new(index), memory, router)
}

fn engine(corpus: Vec<StoredArticle>) -> Orchestrator {
    engine_with(corpus, stub_router("scripted model answer"))
}

#[tokio::test]
async fn test_trends_normal_path() {
    let orchestrator = engine(trends_corpus());
    let outcome = orchestrator
        .handle("/trends window=24h lang=en", Some("u1"), LangPref::En)
        .await;
    let response = outcome.response().expect("success expected");

    assert!(response.header.starts_with("Trends for 24h"));
    let CommandResult::Trends { topics, .. } = &response.result else {
        panic!("wrong result payload")
    };
    assert!(topics.topics.len() >= 3, "got {} topics", topics.topics.len());
    assert_eq!(response.evidence.len(), 5);
    for insight in &response.insights {
        assert!(!insight.evidence_refs.is_empty());
    }
    assert!(response.warnings.is_empty(), "warnings: {:?}", response.warnings);
    assert!(response.meta.confidence > 0.0 && response.meta.confidence <= 1.0);
}

#[tokio::test]
async fn test_ask_auto_recovery_expands_window() {
    // nothing in the last 6h; three matching documents from last week
    let corpus = vec![
        article("w1", 5, "niche topic emerges in news", "niche topic analysis"),
        article("w2", 6, "niche topic gains traction news", "niche topic reaction"),
        article("w3", 6, "niche topic roundup news", "niche topic follow-up"),
    ];
    let orchestrator = engine(corpus);
    let outcome = orchestrator
        .handle(
            "/ask query=\"niche topic\" window=6h",
            Some("u1"),
            LangPref::En,
        )
        .await;
    let response = outcome.response().expect("auto-recovery should succeed");
    assert!(response
        .warnings
        .iter()
        .any(|w| w.starts_with("degradation_window_expanded:")));
    assert!(!response.meta.correlation_id.is_nil());
}

#[tokio::test]
async fn test_ask_no_data_after_full_ladder() {
    let orchestrator = engine(vec![]);
    let outcome = orchestrator
        .handle(
            "/ask query=\"xyzzy quxplox\" window=24h",
            Some("u1"),
            LangPref::En,
        )
        .await;
    let error = outcome.error().expect("failure expected");
    assert_eq!(error.code, ErrorCode::NoData);
    assert!(error.retryable);
    let attempted = error.tech_message.matches("window=").count();
    assert!(attempted >= 5, "tech message: {}", error.tech_message);
}

#[tokio::test]
async fn test_ask_budget_exhaustion_degrades_depth() {
    // the model reports heavy token usage so the second iteration no
    // longer fits the per-command token cap
    let providers: Vec<Arc<dyn ChatProvider>> = MODELS
        .iter()
        .map(|m| {
            Arc::new(StubProvider::with_usage(*m, "expensive answer", 40, 59_000))
                as Arc<dyn ChatProvider>
        })
        .collect();
    let router = Arc::new(ModelRouter::new(providers, CostTable::empty()));
    let corpus = vec![article("b1", 0, "broad subject news", "unrelated material")];
    let orchestrator = engine_with(corpus, router);
    // pricing/impact never appear in the corpus, so the self-check
    // stays insufficient and only the budget can stop the loop
    let outcome = orchestrator
        .handle(
            "/ask query=\"broad subject pricing impact\" --depth=3",
            Some("u1"),
            LangPref::En,
        )
        .await;
    match outcome {
        CommandOutcome::Success(response) => {
            assert!(response
                .warnings
                .contains(&"degradation_depth_reduced".to_string()));
            let CommandResult::Ask(ask) = &response.result else {
                panic!("wrong result payload")
            };
            assert_eq!(ask.steps.len(), 1);
        }
        CommandOutcome::Failure(error) => {
            assert_eq!(error.code, ErrorCode::BudgetExceeded);
        }
    }
}

#[tokio::test]
async fn test_pii_masked_in_evidence() {
    let mut corpus = trends_corpus();
    corpus.push(article(
        "pii",
        0,
        "tipster chip leak news",
        "Call me at +1-555-1234 about the chip leak",
    ));
    let orchestrator = engine(corpus);
    let outcome = orchestrator
        .handle(
            "/analyze sentiment query=\"chip leak\"",
            Some("u1"),
            LangPref::En,
        )
        .await;
    let response = outcome.response().expect("success expected");
    let masked = response
        .evidence
        .iter()
        .any(|e| e.snippet.contains("[REDACTED_PHONE]"));
    assert!(masked, "evidence: {:?}", response.evidence);
    assert!(response.warnings.contains(&"pii_masked:phone".to_string()));
}

#[tokio::test]
async fn test_memory_store_then_recall_roundtrip() {
    let orchestrator = engine(vec![]);
    let outcome = orchestrator
        .handle(
            "/memory store content=\"AI adoption accelerating\"",
            Some("u1"),
            LangPref::En,
        )
        .await;
    let response = outcome.response().expect("store should succeed");
    let CommandResult::Memory(stored) = &response.result else {
        panic!("wrong result payload")
    };
    let stored_id = stored.stored_id.clone().expect("stored id");

    let outcome = orchestrator
        .handle(
            "/memory recall query=\"AI adoption\"",
            Some("u1"),
            LangPref::En,
        )
        .await;
    let response = outcome.response().expect("recall should succeed");
    let CommandResult::Memory(recalled) = &response.result else {
        panic!("wrong result payload")
    };
    assert_eq!(recalled.records[0].id, stored_id);
    assert!(recalled.records[0].similarity >= 0.5);
}

#[tokio::test]
async fn test_model_outage_yields_model_unavailable() {
    let providers: Vec<Arc<dyn ChatProvider>> = MODELS
        .iter()
        .map(|m| Arc::new(StubProvider::failing(*m)) as Arc<dyn ChatProvider>)
        .collect();
    let router = Arc::new(ModelRouter::new(providers, CostTable::empty()));
    let corpus = vec![
        article("m1", 0, "chip supply news", "chip supply outlook"),
        article("m2", 0, "chip demand news", "chip demand outlook"),
    ];
    let orchestrator = engine_with(corpus, router);
    let outcome = orchestrator
        .handle("/ask query=\"chip supply\"", Some("u1"), LangPref::En)
        .await;
    let error = outcome.error().expect("failure expected");
    assert_eq!(error.code, ErrorCode::ModelUnavailable);
    assert!(error.retryable);
}

#[tokio::test]
async fn test_unknown_command_is_validation_failed() {
    let orchestrator = engine(vec![]);
    let outcome = orchestrator
        .handle("/frobnicate now", Some("u1"), LangPref::En)
        .await;
    let error = outcome.error().expect("failure expected");
    assert_eq!(error.code, ErrorCode::ValidationFailed);
    assert!(!error.retryable);
}

#[tokio::test]
async fn test_search_returns_page_with_cursor() {
    let orchestrator = engine(trends_corpus());
    let outcome = orchestrator
        .handle("/search query=\"chip\" k=5 hours=48", Some("u1"), LangPref::En)
        .await;
    let response = outcome.response().expect("success expected");
    let CommandResult::Search(search) = &response.result else {
        panic!("wrong result payload")
    };
    assert!(!search.items.is_empty());
    assert!(search.coverage > 0.0);
    assert!(response.evidence.len() <= 5);
}

#[tokio::test]
async fn test_russian_user_gets_russian_header() {
    let orchestrator = engine(trends_corpus());
    let outcome = orchestrator
        .handle("/trends window=24h lang=en", Some("u1"), LangPref::Ru)
        .await;
    let response = outcome.response().expect("success expected");
    assert!(response.header.contains("Тренды"));
}

#[tokio::test]
async fn test_daily_quota_exhaustion() {
    let index = InMemoryIndex::new(256);
    index.insert_all(trends_corpus());
    let memory = Arc::new(InMemoryMemoryStore::new(Arc::new(HashEmbedder::new(256))));
    let mut config = NewsloomConfig::default();
    config.budget.max_commands_per_user_daily = 1;
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(index),
        memory,
        stub_router("answer"),
    );
    let first = orchestrator
        .handle("/trends", Some("heavy-user"), LangPref::En)
        .await;
    assert!(first.response().is_some());
    let second = orchestrator
        .handle("/trends", Some("heavy-user"), LangPref::En)
        .await;
    let error = second.error().expect("quota failure expected");
    assert_eq!(error.code, ErrorCode::BudgetExceeded);
}
