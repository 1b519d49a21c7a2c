//! Response validator
//!
//! Runs on every response before it leaves the orchestrator, in three
//! passes: PII masking (soft), domain trust (drops + confidence
//! discount), then the hard schema checks. Hard-check failures surface
//! as validation errors; soft findings only add warning tags.

use std::sync::LazyLock;

use newsloom_config::PolicyConfig;
use newsloom_core::types::{
    AnalysisResponse, Language, MAX_EVIDENCE_CARDS, MAX_EVIDENCE_TITLE_CHARS, MAX_HEADER_CHARS,
    MAX_INSIGHT_CHARS, MAX_SNIPPET_CHARS, MAX_TLDR_CHARS,
};
use newsloom_core::{NewsloomError, Result};
use regex::Regex;
use tracing::{debug, warn};

use crate::pii::mask_pii;
use crate::trust::{DomainTrust, TrustClass};

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));

/// Top-level fields the canonical response JSON may carry
const ALLOWED_TOP_LEVEL: [&str; 7] = [
    "header", "tldr", "insights", "evidence", "result", "meta", "warnings",
];

/// Policy validator over canonical responses
pub struct PolicyValidator {
    mask_enabled: bool,
    trust: DomainTrust,
}

impl PolicyValidator {
    /// Build from the deployment policy section
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            mask_enabled: config.pii_mask_enabled,
            trust: DomainTrust::from_config(config),
        }
    }

    /// Validate a response in place
    ///
    /// Mutates the response: masks PII, drops blacklisted evidence,
    /// discounts confidence, and appends warning tags.
    ///
    /// # Errors
    /// Returns a validation error when any hard check fails.
    pub fn validate(&self, response: &mut AnalysisResponse, user_lang: Language) -> Result<()> {
        // confidence must be rejected, not renormalized: check the
        // incoming value before trust weighting touches it
        check_confidence(response.meta.confidence)?;
        if self.mask_enabled {
            self.mask_response(response);
        }
        self.apply_domain_trust(response)?;
        Self::hard_checks(response, user_lang)?;
        debug!(
            insights = response.insights.len(),
            evidence = response.evidence.len(),
            warnings = response.warnings.len(),
            "response passed policy validation"
        );
        Ok(())
    }

    /// Check that a serialized response carries no unknown top-level
    /// fields (used at API boundaries where raw JSON comes in)
    ///
    /// # Errors
    /// Returns a validation error naming the first unknown field.
    pub fn check_top_level_fields(value: &serde_json::Value) -> Result<()> {
        let Some(object) = value.as_object() else {
            return Err(NewsloomError::validation("response must be a JSON object"));
        };
        for key in object.keys() {
            if !ALLOWED_TOP_LEVEL.contains(&key.as_str()) {
                return Err(NewsloomError::validation(format!(
                    "unknown top-level field {key:?}"
                )));
            }
        }
        Ok(())
    }

    fn mask_response(&self, response: &mut AnalysisResponse) {
        let mut fired: Vec<&'static str> = Vec::new();
        let mut apply = |text: &mut String| {
            let outcome = mask_pii(text);
            for kind in &outcome.kinds {
                if !fired.contains(kind) {
                    fired.push(kind);
                }
            }
            *text = outcome.text;
        };
        apply(&mut response.header);
        apply(&mut response.tldr);
        for insight in &mut response.insights {
            apply(&mut insight.text);
        }
        for evidence in &mut response.evidence {
            apply(&mut evidence.title);
            apply(&mut evidence.snippet);
        }
        for kind in fired {
            response.warnings.push(format!("pii_masked:{kind}"));
        }
    }

    fn apply_domain_trust(&self, response: &mut AnalysisResponse) -> Result<()> {
        let mut min_trust: f64 = 1.0;
        let mut dropped_any = false;

        for insight in &mut response.insights {
            let before = insight.evidence_refs.len();
            insight.evidence_refs.retain(|r| {
                r.url
                    .as_deref()
                    .is_none_or(|url| self.trust.classify(url) != TrustClass::Blocked)
            });
            if insight.evidence_refs.len() < before {
                dropped_any = true;
            }
            for r in &insight.evidence_refs {
                if let Some(url) = &r.url {
                    min_trust = min_trust.min(self.trust.classify(url).weight());
                }
            }
            if insight.evidence_refs.is_empty() {
                warn!(text = %insight.text, "insight lost its last evidence to the blacklist");
                return Err(NewsloomError::validation(
                    "insight has no evidence after blacklist filtering",
                ));
            }
        }

        let evidence_before = response.evidence.len();
        response.evidence.retain(|e| {
            e.url
                .as_deref()
                .is_none_or(|url| self.trust.classify(url) != TrustClass::Blocked)
        });
        if response.evidence.len() < evidence_before {
            dropped_any = true;
        }

        if dropped_any {
            response
                .warnings
                .push("evidence_dropped_blacklisted".to_string());
        }
        // both factors are in [0, 1] once the entry check has run
        response.meta.confidence *= min_trust;
        Ok(())
    }

    fn hard_checks(response: &AnalysisResponse, user_lang: Language) -> Result<()> {
        check_len("header", &response.header, MAX_HEADER_CHARS)?;
        check_len("tldr", &response.tldr, MAX_TLDR_CHARS)?;

        check_language("header", &response.header, user_lang)?;
        check_language("tldr", &response.tldr, user_lang)?;

        for (i, insight) in response.insights.iter().enumerate() {
            check_len(&format!("insights[{i}].text"), &insight.text, MAX_INSIGHT_CHARS)?;
            if insight.evidence_refs.is_empty() {
                return Err(NewsloomError::validation(format!(
                    "insights[{i}] has no evidence refs"
                )));
            }
            for (j, r) in insight.evidence_refs.iter().enumerate() {
                if r.article_id.is_none() && r.url.is_none() {
                    return Err(NewsloomError::validation(format!(
                        "insights[{i}].evidence_refs[{j}] needs article_id or url"
                    )));
                }
                if !DATE_SHAPE.is_match(&r.date) {
                    return Err(NewsloomError::validation(format!(
                        "insights[{i}].evidence_refs[{j}] has malformed date {:?}",
                        r.date
                    )));
                }
            }
        }

        if response.evidence.len() > MAX_EVIDENCE_CARDS {
            return Err(NewsloomError::validation(format!(
                "evidence holds {} cards, cap is {MAX_EVIDENCE_CARDS}",
                response.evidence.len()
            )));
        }
        for (i, evidence) in response.evidence.iter().enumerate() {
            check_len(
                &format!("evidence[{i}].title"),
                &evidence.title,
                MAX_EVIDENCE_TITLE_CHARS,
            )?;
            check_len(
                &format!("evidence[{i}].snippet"),
                &evidence.snippet,
                MAX_SNIPPET_CHARS,
            )?;
            if !DATE_SHAPE.is_match(&evidence.date) {
                return Err(NewsloomError::validation(format!(
                    "evidence[{i}] has malformed date {:?}",
                    evidence.date
                )));
            }
        }

        check_confidence(response.meta.confidence)?;
        Ok(())
    }
}

fn check_confidence(confidence: f64) -> Result<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(NewsloomError::validation(format!(
            "confidence {confidence} outside [0, 1]"
        )))
    }
}

fn check_len(field: &str, text: &str, max: usize) -> Result<()> {
    let len = text.chars().count();
    if len > max {
        return Err(NewsloomError::validation(format!(
            "{field} is {len} chars, cap is {max}"
        )));
    }
    Ok(())
}

/// Reject header/tldr text whose script does not match the declared
/// user language. Texts without letters pass.
fn check_language(field: &str, text: &str, user_lang: Language) -> Result<()> {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return Ok(());
    }
    #[allow(clippy::cast_precision_loss)]
    let cyrillic_ratio = letters
        .iter()
        .filter(|c| ('\u{0400}'..='\u{04FF}').contains(*c))
        .count() as f64
        / letters.len() as f64;
    let detected = if cyrillic_ratio > 0.5 {
        Language::Ru
    } else {
        Language::En
    };
    if detected == user_lang {
        Ok(())
    } else {
        Err(NewsloomError::validation(format!(
            "{field} language {detected} does not match user language {user_lang}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsloom_core::outputs::{CommandResult, SentimentOutput};
    use newsloom_core::types::{Evidence, EvidenceRef, Insight, InsightKind, Meta};

    fn evidence_ref(url: Option<&str>) -> EvidenceRef {
        EvidenceRef {
            article_id: url.is_none().then(|| "a1".to_string()),
            url: url.map(String::from),
            date: "2025-06-01".to_string(),
        }
    }

    fn response() -> AnalysisResponse {
        AnalysisResponse {
            header: "Trends for 24h".to_string(),
            tldr: "Coverage is steady.".to_string(),
            insights: vec![Insight::new(
                InsightKind::Fact,
                "Coverage rose",
                vec![evidence_ref(Some("https://reuters.com/a"))],
            )],
            evidence: vec![Evidence {
                title: "Article".to_string(),
                article_id: Some("a1".to_string()),
                url: Some("https://reuters.com/a".to_string()),
                date: "2025-06-01".to_string(),
                snippet: "snippet".to_string(),
            }],
            result: CommandResult::Sentiment(SentimentOutput {
                overall: 0.1,
                emotions: Default::default(),
                aspects: vec![],
            }),
            meta: Meta::new("gpt-4o"),
            warnings: vec![],
        }
    }

    fn validator(blacklist: Vec<String>) -> PolicyValidator {
        PolicyValidator::new(&PolicyConfig {
            pii_mask_enabled: true,
            domain_whitelist: vec!["reuters.com".to_string()],
            domain_blacklist: blacklist,
        })
    }

    #[test]
    fn test_clean_response_passes() {
        let mut r = response();
        validator(vec![]).validate(&mut r, Language::En).unwrap();
        assert!(r.warnings.is_empty());
        // whitelisted evidence keeps confidence intact
        assert!((r.meta.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pii_masked_with_warning() {
        let mut r = response();
        r.tldr = "Call me at +1-555-1234".to_string();
        validator(vec![]).validate(&mut r, Language::En).unwrap();
        assert_eq!(r.tldr, "Call me at [REDACTED_PHONE]");
        assert!(r.warnings.contains(&"pii_masked:phone".to_string()));
    }

    #[test]
    fn test_empty_evidence_refs_fails() {
        let mut r = response();
        r.insights[0].evidence_refs.clear();
        let err = validator(vec![])
            .validate(&mut r, Language::En)
            .unwrap_err();
        assert!(matches!(err, NewsloomError::Validation { .. }));
    }

    #[test]
    fn test_malformed_date_fails() {
        let mut r = response();
        r.insights[0].evidence_refs[0].date = "06/01/2025".to_string();
        assert!(validator(vec![]).validate(&mut r, Language::En).is_err());
    }

    #[test]
    fn test_blacklisted_last_ref_fails_response() {
        let mut r = response();
        r.insights[0].evidence_refs = vec![evidence_ref(Some("https://spam.example/x"))];
        let err = validator(vec!["spam.example".to_string()])
            .validate(&mut r, Language::En)
            .unwrap_err();
        assert!(matches!(err, NewsloomError::Validation { .. }));
    }

    #[test]
    fn test_blacklisted_ref_dropped_with_warning_when_others_remain() {
        let mut r = response();
        r.insights[0].evidence_refs = vec![
            evidence_ref(Some("https://spam.example/x")),
            evidence_ref(Some("https://reuters.com/a")),
        ];
        validator(vec!["spam.example".to_string()])
            .validate(&mut r, Language::En)
            .unwrap();
        assert_eq!(r.insights[0].evidence_refs.len(), 1);
        assert!(r
            .warnings
            .contains(&"evidence_dropped_blacklisted".to_string()));
    }

    #[test]
    fn test_neutral_domain_discounts_confidence() {
        let mut r = response();
        r.insights[0].evidence_refs = vec![evidence_ref(Some("https://blog.example.org/p"))];
        r.meta.confidence = 1.0;
        validator(vec![]).validate(&mut r, Language::En).unwrap();
        assert!((r.meta.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_header_over_cap_fails() {
        let mut r = response();
        r.header = "h".repeat(MAX_HEADER_CHARS + 1);
        assert!(validator(vec![]).validate(&mut r, Language::En).is_err());
    }

    #[test]
    fn test_language_mismatch_fails() {
        let mut r = response();
        r.header = "Тренды за сутки".to_string();
        assert!(validator(vec![]).validate(&mut r, Language::En).is_err());
        let mut r2 = response();
        r2.header = "Тренды за сутки".to_string();
        r2.tldr = "Освещение стабильно.".to_string();
        assert!(validator(vec![]).validate(&mut r2, Language::Ru).is_ok());
    }

    #[test]
    fn test_unknown_top_level_field_rejected() {
        let value = serde_json::json!({
            "header": "h", "tldr": "t", "insights": [], "evidence": [],
            "result": {}, "meta": {}, "warnings": [], "debug": true
        });
        assert!(PolicyValidator::check_top_level_fields(&value).is_err());
        let ok = serde_json::json!({
            "header": "h", "tldr": "t", "insights": [], "evidence": [],
            "result": {}, "meta": {}, "warnings": []
        });
        assert!(PolicyValidator::check_top_level_fields(&ok).is_ok());
    }

    #[test]
    fn test_confidence_out_of_range_fails() {
        let mut r = response();
        r.meta.confidence = 1.4;
        let err = validator(vec![])
            .validate(&mut r, Language::En)
            .unwrap_err();
        assert!(matches!(err, NewsloomError::Validation { .. }));

        let mut r = response();
        r.meta.confidence = -0.1;
        assert!(validator(vec![]).validate(&mut r, Language::En).is_err());
    }
}
