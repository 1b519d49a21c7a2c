//! Token estimation and the per-model cost table

use std::collections::HashMap;

use newsloom_config::ProvidersConfig;

/// Fallback rate for models missing from the table, cents per 1K tokens
const DEFAULT_CENTS_PER_1K_INPUT: f64 = 0.015;
const DEFAULT_CENTS_PER_1K_OUTPUT: f64 = 0.06;

/// Estimate the token count of a text when the provider returns none
///
/// Latin text averages ~4 chars per token; Cyrillic tokenizes roughly
/// twice as dense, so Cyrillic characters are counted double before the
/// division.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    let mut weighted_chars: u64 = 0;
    for c in text.chars() {
        weighted_chars += if ('\u{0400}'..='\u{04FF}').contains(&c) {
            2
        } else {
            1
        };
    }
    weighted_chars.div_ceil(4).max(1)
}

/// Per-model pricing, cents per 1K input and output tokens
#[derive(Debug, Clone)]
pub struct CostTable {
    rates: HashMap<String, (f64, f64)>,
}

impl CostTable {
    /// Build from the providers configuration section
    #[must_use]
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let rates = config
            .models
            .iter()
            .map(|(model, endpoint)| {
                (
                    model.clone(),
                    (endpoint.cents_per_1k_input, endpoint.cents_per_1k_output),
                )
            })
            .collect();
        Self { rates }
    }

    /// Build an empty table that answers with default rates
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    /// Estimated cost in cents for a call
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate_cents(&self, model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
        let (rate_in, rate_out) = self
            .rates
            .get(model)
            .copied()
            .unwrap_or((DEFAULT_CENTS_PER_1K_INPUT, DEFAULT_CENTS_PER_1K_OUTPUT));
        (tokens_in as f64 / 1000.0).mul_add(rate_in, tokens_out as f64 / 1000.0 * rate_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_estimate() {
        // 40 chars → 10 tokens
        let text = "a".repeat(40);
        assert_eq!(estimate_tokens(&text), 10);
    }

    #[test]
    fn test_cyrillic_counts_double() {
        let latin = "word".repeat(10);
        let cyrillic = "слово".repeat(8); // 40 chars, weighted 80
        assert!(estimate_tokens(&cyrillic) > estimate_tokens(&latin));
    }

    #[test]
    fn test_empty_text_is_one_token() {
        assert_eq!(estimate_tokens(""), 1);
    }

    #[test]
    fn test_unknown_model_uses_default_rates() {
        let table = CostTable::empty();
        let cents = table.estimate_cents("mystery-model", 1000, 1000);
        assert!((cents - (DEFAULT_CENTS_PER_1K_INPUT + DEFAULT_CENTS_PER_1K_OUTPUT)).abs() < 1e-9);
    }
}
