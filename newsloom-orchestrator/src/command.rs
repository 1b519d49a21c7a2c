//! Command grammar
//!
//! Normalizes a raw command line into a canonical command token plus
//! parsed arguments. The grammar is fixed: `key=value` pairs (values
//! may be double-quoted), bare flags, and any remaining free text
//! becomes the query.

use std::collections::HashMap;

use newsloom_core::types::{CommandKind, LangPref, Window};
use newsloom_core::{NewsloomError, Result};
use tracing::debug;

/// Longest-match table from command spelling to canonical token
const COMMAND_TABLE: &[(&str, CommandKind)] = &[
    ("/analyze keywords", CommandKind::AnalyzeKeywords),
    ("/analyze sentiment", CommandKind::AnalyzeSentiment),
    ("/analyze topics", CommandKind::AnalyzeTopics),
    ("/analyze competitors", CommandKind::AnalyzeCompetitors),
    ("/predict trends", CommandKind::PredictTrends),
    ("/events link", CommandKind::EventsLink),
    ("/graph query", CommandKind::GraphQuery),
    ("/memory suggest", CommandKind::MemorySuggest),
    ("/memory store", CommandKind::MemoryStore),
    ("/memory recall", CommandKind::MemoryRecall),
    ("/trends", CommandKind::Trends),
    ("/synthesize", CommandKind::Synthesize),
    ("/ask", CommandKind::Ask),
    ("/search", CommandKind::Search),
];

/// A parsed command line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub kind: CommandKind,
    /// `key=value` arguments, keys lowercased
    pub args: HashMap<String, String>,
    /// Bare flags (`rerank`, `no-rerank`)
    pub flags: Vec<String>,
    /// Free text left over after argument extraction
    pub free_text: String,
}

impl ParsedCommand {
    /// Window argument, if present and well-formed
    ///
    /// # Errors
    /// Returns a validation error on an unknown window token.
    pub fn window(&self) -> Result<Option<Window>> {
        match self.args.get("window") {
            None => Ok(None),
            Some(raw) => Window::parse(raw)
                .map(Some)
                .ok_or_else(|| NewsloomError::validation(format!("unknown window {raw:?}"))),
        }
    }

    /// Language argument, if present and well-formed
    ///
    /// # Errors
    /// Returns a validation error on an unknown language token.
    pub fn lang(&self) -> Result<Option<LangPref>> {
        match self.args.get("lang") {
            None => Ok(None),
            Some(raw) => LangPref::parse(raw)
                .map(Some)
                .ok_or_else(|| NewsloomError::validation(format!("unknown lang {raw:?}"))),
        }
    }

    /// `k` argument clamped into `[5, 10]`
    ///
    /// # Errors
    /// Returns a validation error when `k` is not an integer.
    pub fn k(&self) -> Result<Option<usize>> {
        match self.args.get("k") {
            None => Ok(None),
            Some(raw) => raw
                .parse::<usize>()
                .map(|k| Some(k.clamp(5, 10)))
                .map_err(|_| NewsloomError::validation(format!("k must be an integer, got {raw:?}"))),
        }
    }

    /// Bounded integer argument (`depth`, `hops`)
    ///
    /// # Errors
    /// Returns a validation error when the value is not an integer or
    /// falls outside `[lo, hi]`.
    pub fn bounded_u8(&self, key: &str, lo: u8, hi: u8) -> Result<Option<u8>> {
        match self.args.get(key) {
            None => Ok(None),
            Some(raw) => {
                let value: u8 = raw.parse().map_err(|_| {
                    NewsloomError::validation(format!("{key} must be an integer, got {raw:?}"))
                })?;
                if (lo..=hi).contains(&value) {
                    Ok(Some(value))
                } else {
                    Err(NewsloomError::validation(format!(
                        "{key} must be within [{lo}, {hi}], got {value}"
                    )))
                }
            }
        }
    }

    /// Comma-list argument (`sources`, `domains`)
    #[must_use]
    pub fn comma_list(&self, key: &str) -> Option<Vec<String>> {
        self.args.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }

    /// True when the flag was given
    #[must_use]
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Parse a raw command line
///
/// # Errors
/// Returns a validation error for unknown commands.
pub fn parse_command(raw: &str) -> Result<ParsedCommand> {
    let trimmed = raw.trim();
    let (kind, rest) = COMMAND_TABLE
        .iter()
        .find_map(|(prefix, kind)| {
            trimmed.strip_prefix(prefix).and_then(|rest| {
                (rest.is_empty() || rest.starts_with(' ') || rest.starts_with("--"))
                    .then_some((*kind, rest.trim()))
            })
        })
        .ok_or_else(|| NewsloomError::validation(format!("unknown command: {trimmed:?}")))?;

    let mut args = HashMap::new();
    let mut flags = Vec::new();
    let mut free: Vec<String> = Vec::new();

    for token in split_tokens(rest) {
        let token = token.strip_prefix("--").unwrap_or(&token);
        if let Some((key, value)) = token.split_once('=') {
            args.insert(key.to_ascii_lowercase(), unquote(value).to_string());
        } else if matches!(token, "rerank" | "no-rerank") {
            flags.push(token.to_string());
        } else if !token.is_empty() {
            free.push(unquote(token).to_string());
        }
    }

    let parsed = ParsedCommand {
        kind,
        args,
        flags,
        free_text: free.join(" "),
    };
    debug!(command = %parsed.kind, args = parsed.args.len(), "command parsed");
    Ok(parsed)
}

/// Split on whitespace, keeping double-quoted spans intact
fn split_tokens(rest: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in rest.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
