//! Response formatting
//!
//! Merges agent outputs into the canonical response: header and tl;dr
//! in the user's language, insights with attached evidence, at most
//! five evidence cards, the command-specific typed payload, and the
//! collated warning tags.

use newsloom_agents::AgentParams;
use newsloom_core::outputs::{
    AgentOutput, AskOutput, CommandResult, CompetitorOutput, EmotionScores, EventsOutput,
    ForecastOutput, GraphOutput, KeyphraseOutput, MemoryOutput, QueryExpansionOutput,
    SentimentOutput, SynthesisOutput, TopicTrend, TopicsOutput,
};
use newsloom_core::text::truncate_chars;
use newsloom_core::types::{
    AnalysisResponse, CommandKind, Document, Evidence, EvidenceRef, Insight, InsightKind,
    Language, Meta, MAX_EVIDENCE_CARDS, MAX_HEADER_CHARS, MAX_TLDR_CHARS,
};
use newsloom_core::{DegradeLevel, NewsloomError, Result};
use tracing::debug;

use crate::context::RequestContext;

/// Insights kept per response
const MAX_INSIGHTS: usize = 8;
/// Overlap-matrix rows kept under aggressive degradation
const DEGRADED_OVERLAP_ROWS: usize = 5;

/// Merge agent outputs into a canonical response
///
/// # Errors
/// Returns an internal error when the primary output for the command
/// is missing entirely (the pipeline prevents this unless every agent
/// failed).
pub fn format_response(
    ctx: &RequestContext,
    outputs: &[AgentOutput],
    agent_warnings: Vec<String>,
) -> Result<AnalysisResponse> {
    let lang = ctx.user_lang.display_language();
    let mut warnings = ctx.ledger.warnings();
    warnings.extend(agent_warnings);

    let mut result = build_result(ctx.command, outputs)?;
    if ctx.ledger.degrade_level() == DegradeLevel::Aggressive {
        trim_widgets(&mut result, &mut warnings);
    }

    let insights = derive_insights(outputs, &ctx.docs);
    let evidence: Vec<Evidence> = ctx
        .docs
        .iter()
        .take(MAX_EVIDENCE_CARDS)
        .map(Evidence::from_document)
        .collect();

    let failed_agents = warnings
        .iter()
        .filter(|w| w.starts_with("agent_failed:"))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let confidence = (0.75 - 0.1 * failed_agents as f64).clamp(0.1, 1.0);

    let mut meta = Meta::new(ctx.routes.route(primary_task(ctx.command)).primary.clone());
    meta.confidence = confidence;
    meta.correlation_id = ctx.correlation_id;

    let response = AnalysisResponse {
        header: truncate_chars(&header_for(ctx.command, &ctx.params, lang), MAX_HEADER_CHARS),
        tldr: truncate_chars(&tldr_for(&result, &ctx.params, lang), MAX_TLDR_CHARS),
        insights,
        evidence,
        result,
        meta,
        warnings,
    };
    debug!(
        command = %ctx.command,
        insights = response.insights.len(),
        evidence = response.evidence.len(),
        "response formatted"
    );
    Ok(response)
}

/// Wrap one retrieval page into the canonical response shape
///
/// Search carries no insights; evidence comes from the top page items.
#[must_use]
pub fn format_search(
    ctx: &RequestContext,
    output: newsloom_core::outputs::SearchOutput,
) -> AnalysisResponse {
    let lang = ctx.user_lang.display_language();
    let evidence: Vec<Evidence> = output
        .items
        .iter()
        .take(MAX_EVIDENCE_CARDS)
        .map(|item| Evidence {
            title: truncate_chars(&item.title, 200),
            article_id: Some(item.id.clone()),
            url: item.url.clone(),
            date: item.ts.clone(),
            snippet: truncate_chars(&item.snippet, 240),
        })
        .collect();
    let result = CommandResult::Search(output);
    let mut meta = Meta::new(ctx.routes.route(primary_task(ctx.command)).primary.clone());
    meta.correlation_id = ctx.correlation_id;
    meta.confidence = 0.9;
    AnalysisResponse {
        header: truncate_chars(&header_for(ctx.command, &ctx.params, lang), MAX_HEADER_CHARS),
        tldr: truncate_chars(&tldr_for(&result, &ctx.params, lang), MAX_TLDR_CHARS),
        insights: vec![],
        evidence,
        result,
        meta,
        warnings: ctx.ledger.warnings(),
    }
}

fn primary_task(command: CommandKind) -> newsloom_core::TaskKind {
    use newsloom_core::TaskKind;
    match command {
        CommandKind::Trends | CommandKind::AnalyzeTopics => TaskKind::Topics,
        CommandKind::AnalyzeKeywords => TaskKind::Keyphrase,
        CommandKind::AnalyzeSentiment => TaskKind::Sentiment,
        CommandKind::AnalyzeCompetitors => TaskKind::Competitors,
        CommandKind::PredictTrends => TaskKind::TrendForecast,
        CommandKind::Synthesize => TaskKind::Synthesis,
        CommandKind::Ask | CommandKind::Search => TaskKind::Ask,
        CommandKind::EventsLink => TaskKind::Events,
        CommandKind::GraphQuery => TaskKind::Graph,
        CommandKind::MemorySuggest | CommandKind::MemoryStore | CommandKind::MemoryRecall => {
            TaskKind::MemoryOps
        }
    }
}

fn find_sentiment(outputs: &[AgentOutput]) -> Option<SentimentOutput> {
    outputs.iter().find_map(|o| match o {
        AgentOutput::Sentiment(s) => Some(s.clone()),
        _ => None,
    })
}

fn find_topics(outputs: &[AgentOutput]) -> Option<TopicsOutput> {
    outputs.iter().find_map(|o| match o {
        AgentOutput::Topics(t) => Some(t.clone()),
        _ => None,
    })
}

fn build_result(command: CommandKind, outputs: &[AgentOutput]) -> Result<CommandResult> {
    let missing = || NewsloomError::internal(format!("no usable output for {command}"));
    match command {
        CommandKind::Trends => {
            let topics = find_topics(outputs);
            let sentiment = find_sentiment(outputs);
            if topics.is_none() && sentiment.is_none() {
                return Err(missing());
            }
            // a failed half of the pair gets an empty sentinel
            Ok(CommandResult::Trends {
                topics: topics.unwrap_or(TopicsOutput { topics: vec![] }),
                sentiment: sentiment.unwrap_or(SentimentOutput {
                    overall: 0.0,
                    emotions: EmotionScores::default(),
                    aspects: vec![],
                }),
            })
        }
        CommandKind::AnalyzeKeywords => {
            let keyphrases: Option<KeyphraseOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::Keyphrase(k) => Some(k.clone()),
                _ => None,
            });
            let expansion: Option<QueryExpansionOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::QueryExpansion(q) => Some(q.clone()),
                _ => None,
            });
            Ok(CommandResult::Keywords {
                keyphrases: keyphrases.ok_or_else(missing)?,
                expansion,
            })
        }
        CommandKind::AnalyzeSentiment => Ok(CommandResult::Sentiment(
            find_sentiment(outputs).ok_or_else(missing)?,
        )),
        CommandKind::AnalyzeTopics => Ok(CommandResult::Topics(
            find_topics(outputs).ok_or_else(missing)?,
        )),
        CommandKind::AnalyzeCompetitors => {
            let competitor: Option<CompetitorOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::CompetitorNews(c) => Some(c.clone()),
                _ => None,
            });
            Ok(CommandResult::Competitors(competitor.ok_or_else(missing)?))
        }
        CommandKind::PredictTrends => {
            let forecast: Option<ForecastOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::TrendForecaster(f) => Some(f.clone()),
                _ => None,
            });
            Ok(CommandResult::Forecast(forecast.ok_or_else(missing)?))
        }
        CommandKind::Synthesize => {
            let synthesis: Option<SynthesisOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::Synthesis(s) => Some(s.clone()),
                _ => None,
            });
            Ok(CommandResult::Synthesis(synthesis.ok_or_else(missing)?))
        }
        CommandKind::Ask => {
            let ask: Option<AskOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::AgenticRag(a) => Some(a.clone()),
                _ => None,
            });
            Ok(CommandResult::Ask(ask.ok_or_else(missing)?))
        }
        CommandKind::EventsLink => {
            let events: Option<EventsOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::Events(e) => Some(e.clone()),
                _ => None,
            });
            Ok(CommandResult::Events(events.ok_or_else(missing)?))
        }
        CommandKind::GraphQuery => {
            let graph: Option<GraphOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::Graph(g) => Some(g.clone()),
                _ => None,
            });
            Ok(CommandResult::Graph(graph.ok_or_else(missing)?))
        }
        CommandKind::MemorySuggest | CommandKind::MemoryStore | CommandKind::MemoryRecall => {
            let memory: Option<MemoryOutput> = outputs.iter().find_map(|o| match o {
                AgentOutput::MemoryOps(m) => Some(m.clone()),
                _ => None,
            });
            Ok(CommandResult::Memory(memory.ok_or_else(missing)?))
        }
        CommandKind::Search => Err(NewsloomError::internal(
            "search responses are formatted by the orchestrator",
        )),
    }
}

/// Aggressive degradation trims heavyweight widgets
fn trim_widgets(result: &mut CommandResult, warnings: &mut Vec<String>) {
    if let CommandResult::Competitors(competitors) = result {
        if competitors.overlap.len() > DEGRADED_OVERLAP_ROWS {
            competitors.overlap.truncate(DEGRADED_OVERLAP_ROWS);
            warnings.push("degradation_widgets_trimmed".to_string());
        }
    }
}

fn default_refs(docs: &[Document]) -> Vec<EvidenceRef> {
    docs.iter().take(2).map(EvidenceRef::from_document).collect()
}

#[allow(clippy::too_many_lines)]
fn derive_insights(outputs: &[AgentOutput], docs: &[Document]) -> Vec<Insight> {
    let refs = default_refs(docs);
    let mut insights: Vec<Insight> = Vec::new();

    for output in outputs {
        match output {
            AgentOutput::Topics(topics) => {
                for cluster in &topics.topics {
                    let verb = match cluster.trend {
                        TopicTrend::Rising => "rising",
                        TopicTrend::Falling => "falling",
                        TopicTrend::Stable => continue,
                    };
                    if refs.is_empty() {
                        continue;
                    }
                    insights.push(Insight::new(
                        InsightKind::Fact,
                        format!(
                            "Coverage of \"{}\" is {verb} ({} articles)",
                            cluster.label, cluster.size
                        ),
                        refs.clone(),
                    ));
                }
            }
            AgentOutput::Sentiment(sentiment) => {
                if !refs.is_empty() {
                    insights.push(Insight::new(
                        InsightKind::Fact,
                        format!("Overall sentiment is {:+.2}", sentiment.overall),
                        refs.clone(),
                    ));
                }
            }
            AgentOutput::TrendForecaster(forecast) => {
                for driver in &forecast.drivers {
                    if driver.evidence_refs.is_empty() {
                        continue;
                    }
                    insights.push(Insight::new(
                        InsightKind::Hypothesis,
                        format!("Driver: {}", driver.text),
                        driver.evidence_refs.clone(),
                    ));
                }
            }
            AgentOutput::CompetitorNews(competitors) => {
                for gap in competitors.gaps.iter().take(3) {
                    if refs.is_empty() {
                        continue;
                    }
                    insights.push(Insight::new(
                        InsightKind::Recommendation,
                        format!("Coverage gap: \"{gap}\" is covered by rivals only"),
                        refs.clone(),
                    ));
                }
            }
            AgentOutput::Synthesis(synthesis) => {
                for conflict in &synthesis.conflicts {
                    if refs.is_empty() {
                        continue;
                    }
                    insights.push(Insight::new(
                        InsightKind::Conflict,
                        conflict.description.clone(),
                        refs.clone(),
                    ));
                }
            }
            AgentOutput::AgenticRag(ask) => {
                if !refs.is_empty() && !ask.answer.is_empty() {
                    insights.push(Insight::new(
                        InsightKind::Fact,
                        ask.answer.clone(),
                        refs.clone(),
                    ));
                }
            }
            AgentOutput::Graph(graph) => {
                if let (Some(edge), false) = (graph.edges.first(), refs.is_empty()) {
                    insights.push(Insight::new(
                        InsightKind::Fact,
                        format!("Strongest link: {} — {}", edge.src, edge.tgt),
                        refs.clone(),
                    ));
                }
            }
            AgentOutput::Events(events) => {
                for link in events.causal_links.iter().take(3) {
                    if refs.is_empty() {
                        continue;
                    }
                    insights.push(Insight::new(
                        InsightKind::Hypothesis,
                        format!(
                            "{} likely influenced {} (confidence {:.2})",
                            link.cause, link.effect, link.confidence
                        ),
                        refs.clone(),
                    ));
                }
            }
            AgentOutput::Keyphrase(_)
            | AgentOutput::QueryExpansion(_)
            | AgentOutput::MemoryOps(_) => {}
        }
    }

    insights.truncate(MAX_INSIGHTS);
    insights
}

fn header_for(command: CommandKind, params: &AgentParams, lang: Language) -> String {
    let window = params.window;
    match (command, lang) {
        (CommandKind::Trends, Language::En) => format!("Trends for {window}"),
        (CommandKind::Trends, Language::Ru) => format!("Тренды за {window}"),
        (CommandKind::AnalyzeKeywords, Language::En) => format!("Keywords: {}", params.query),
        (CommandKind::AnalyzeKeywords, Language::Ru) => {
            format!("Ключевые фразы: {}", params.query)
        }
        (CommandKind::AnalyzeSentiment, Language::En) => format!("Sentiment for {window}"),
        (CommandKind::AnalyzeSentiment, Language::Ru) => format!("Тональность за {window}"),
        (CommandKind::AnalyzeTopics, Language::En) => format!("Topics for {window}"),
        (CommandKind::AnalyzeTopics, Language::Ru) => format!("Темы за {window}"),
        (CommandKind::AnalyzeCompetitors, Language::En) => {
            format!("Competitor coverage for {window}")
        }
        (CommandKind::AnalyzeCompetitors, Language::Ru) => {
            format!("Сравнение источников за {window}")
        }
        (CommandKind::PredictTrends, Language::En) => format!("Trend forecast for {window}"),
        (CommandKind::PredictTrends, Language::Ru) => format!("Прогноз тренда на {window}"),
        (CommandKind::Synthesize, Language::En) => format!("Synthesis for {window}"),
        (CommandKind::Synthesize, Language::Ru) => format!("Синтез за {window}"),
        (CommandKind::Ask, Language::En) => format!("Answer: {}", params.query),
        (CommandKind::Ask, Language::Ru) => format!("Ответ: {}", params.query),
        (CommandKind::EventsLink, Language::En) => format!("Event timeline for {window}"),
        (CommandKind::EventsLink, Language::Ru) => format!("Хронология событий за {window}"),
        (CommandKind::GraphQuery, Language::En) => format!("Graph view: {}", params.query),
        (CommandKind::GraphQuery, Language::Ru) => format!("Граф связей: {}", params.query),
        (CommandKind::MemorySuggest, Language::En) => "Memory suggestion".to_string(),
        (CommandKind::MemorySuggest, Language::Ru) => "Рекомендация памяти".to_string(),
        (CommandKind::MemoryStore, Language::En) => "Memory stored".to_string(),
        (CommandKind::MemoryStore, Language::Ru) => "Память сохранена".to_string(),
        (CommandKind::MemoryRecall, Language::En) => "Memory recall".to_string(),
        (CommandKind::MemoryRecall, Language::Ru) => "Вспомненные записи".to_string(),
        (CommandKind::Search, Language::En) => format!("Search: {}", params.query),
        (CommandKind::Search, Language::Ru) => format!("Поиск: {}", params.query),
    }
}

#[allow(clippy::too_many_lines)]
fn tldr_for(result: &CommandResult, params: &AgentParams, lang: Language) -> String {
    match result {
        CommandResult::Trends { topics, sentiment } => match lang {
            Language::En => format!(
                "{} topic cluster(s); overall sentiment {:+.2} over {}",
                topics.topics.len(),
                sentiment.overall,
                params.window
            ),
            Language::Ru => format!(
                "Тем: {}; тональность {:+.2} за {}",
                topics.topics.len(),
                sentiment.overall,
                params.window
            ),
        },
        CommandResult::Keywords { keyphrases, .. } => {
            let top = keyphrases
                .phrases
                .first()
                .map_or_else(String::new, |p| p.phrase.clone());
            match lang {
                Language::En => format!(
                    "{} keyphrase(s); top: \"{top}\"",
                    keyphrases.phrases.len()
                ),
                Language::Ru => {
                    format!("Фраз: {}; главная: \"{top}\"", keyphrases.phrases.len())
                }
            }
        }
        CommandResult::Sentiment(sentiment) => match lang {
            Language::En => format!(
                "Overall sentiment {:+.2} across the window",
                sentiment.overall
            ),
            Language::Ru => format!("Общая тональность {:+.2}", sentiment.overall),
        },
        CommandResult::Topics(topics) => match lang {
            Language::En => format!("{} topic cluster(s) detected", topics.topics.len()),
            Language::Ru => format!("Обнаружено тем: {}", topics.topics.len()),
        },
        CommandResult::Competitors(competitors) => match lang {
            Language::En => format!(
                "{} domain(s) compared, {} coverage gap(s)",
                competitors.domains.len(),
                competitors.gaps.len()
            ),
            Language::Ru => format!(
                "Источников: {}, пробелов: {}",
                competitors.domains.len(),
                competitors.gaps.len()
            ),
        },
        CommandResult::Forecast(forecast) => match lang {
            Language::En => format!(
                "Signal direction: {:?}, CI [{:.2}, {:.2}]",
                forecast.direction, forecast.confidence_interval[0], forecast.confidence_interval[1]
            ),
            Language::Ru => format!(
                "Направление: {:?}, интервал [{:.2}, {:.2}]",
                forecast.direction, forecast.confidence_interval[0], forecast.confidence_interval[1]
            ),
        },
        CommandResult::Synthesis(synthesis) => truncate_chars(&synthesis.summary, MAX_TLDR_CHARS),
        CommandResult::Ask(ask) => truncate_chars(&ask.answer, MAX_TLDR_CHARS),
        CommandResult::Events(events) => match lang {
            Language::En => format!(
                "{} event(s), {} causal link(s)",
                events.events.len(),
                events.causal_links.len()
            ),
            Language::Ru => format!(
                "Событий: {}, связей: {}",
                events.events.len(),
                events.causal_links.len()
            ),
        },
        CommandResult::Graph(graph) => match lang {
            Language::En => format!(
                "{} node(s), {} edge(s) in the subgraph",
                graph.nodes.len(),
                graph.edges.len()
            ),
            Language::Ru => format!(
                "Узлов: {}, связей: {}",
                graph.nodes.len(),
                graph.edges.len()
            ),
        },
        CommandResult::Memory(memory) => match lang {
            Language::En => format!("Memory operation {:?} completed", memory.op),
            Language::Ru => "Операция с памятью выполнена".to_string(),
        },
        CommandResult::Search(search) => match lang {
            Language::En => format!("{} result(s), coverage {:.0}%", search.items.len(), search.coverage * 100.0),
            Language::Ru => format!("Результатов: {}", search.items.len()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ru_headers_are_cyrillic() {
        let params = AgentParams::default();
        let header = header_for(CommandKind::Trends, &params, Language::Ru);
        assert!(header.contains("Тренды"));
        let header = header_for(CommandKind::Trends, &params, Language::En);
        assert!(header.starts_with("Trends for 24h"));
    }

    #[test]
    fn test_trim_widgets_truncates_overlap() {
        let mut warnings = Vec::new();
        let mut result = CommandResult::Competitors(CompetitorOutput {
            domains: vec![],
            overlap: (0..20)
                .map(|i| newsloom_core::outputs::DomainOverlap {
                    a: format!("a{i}"),
                    b: format!("b{i}"),
                    jaccard: 0.1,
                })
                .collect(),
            positioning: vec![],
            gaps: vec![],
        });
        trim_widgets(&mut result, &mut warnings);
        let CommandResult::Competitors(trimmed) = result else {
            panic!("wrong variant")
        };
        assert_eq!(trimmed.overlap.len(), DEGRADED_OVERLAP_ROWS);
        assert!(warnings.contains(&"degradation_widgets_trimmed".to_string()));
    }
}
