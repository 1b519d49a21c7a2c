//! PII detection and masking
//!
//! Pattern table over the PII kinds that show up in news snippets and
//! model output. Matches are replaced with `[REDACTED_<KIND>]`; callers
//! collect one warning tag per kind that fired. Credit-card candidates
//! must additionally pass a Luhn check to avoid eating order numbers.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

struct PiiPattern {
    kind: &'static str,
    replacement: &'static str,
    regex: &'static LazyLock<Regex>,
    /// Extra gate applied to the raw match
    gate: Option<fn(&str) -> bool>,
}

static SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern compiles"));

static CARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d(?:[ -]?\d){12,15}\b").expect("card pattern compiles")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("email pattern compiles")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+\d{1,3}[\d\s().-]{5,14}\d").expect("phone pattern compiles")
});

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 pattern compiles")
});

static PASSPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{1,2}\d{7,9}\b").expect("passport pattern compiles")
});

/// Table order matters: more specific patterns run first so the SSN
/// rule wins over the looser card/phone shapes.
static PATTERNS: &[PiiPattern] = &[
    PiiPattern {
        kind: "ssn",
        replacement: "[REDACTED_SSN]",
        regex: &SSN,
        gate: None,
    },
    PiiPattern {
        kind: "card",
        replacement: "[REDACTED_CARD]",
        regex: &CARD,
        gate: Some(luhn_valid),
    },
    PiiPattern {
        kind: "email",
        replacement: "[REDACTED_EMAIL]",
        regex: &EMAIL,
        gate: None,
    },
    PiiPattern {
        kind: "phone",
        replacement: "[REDACTED_PHONE]",
        regex: &PHONE,
        gate: None,
    },
    PiiPattern {
        kind: "ip",
        replacement: "[REDACTED_IP]",
        regex: &IPV4,
        gate: None,
    },
    PiiPattern {
        kind: "passport",
        replacement: "[REDACTED_PASSPORT]",
        regex: &PASSPORT,
        gate: None,
    },
];

/// Result of masking one text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaskOutcome {
    pub text: String,
    /// Kinds that fired, deduplicated, in table order
    pub kinds: Vec<&'static str>,
}

/// Luhn checksum over the digits of a candidate card number
fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=16).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Mask every known PII pattern in a text
#[must_use]
pub fn mask_pii(text: &str) -> MaskOutcome {
    let mut masked = text.to_string();
    let mut kinds = Vec::new();
    for pattern in PATTERNS {
        let mut fired = false;
        masked = pattern
            .regex
            .replace_all(&masked, |caps: &regex::Captures<'_>| {
                let raw = caps.get(0).map_or("", |m| m.as_str());
                if pattern.gate.is_none_or(|gate| gate(raw)) {
                    fired = true;
                    pattern.replacement.to_string()
                } else {
                    raw.to_string()
                }
            })
            .into_owned();
        if fired {
            kinds.push(pattern.kind);
        }
    }
    if !kinds.is_empty() {
        debug!(?kinds, "pii masked");
    }
    MaskOutcome {
        text: masked,
        kinds,
    }
}
