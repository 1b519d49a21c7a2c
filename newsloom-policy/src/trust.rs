//! Domain trust classification
//!
//! Evidence domains are classified against the deployment's trust
//! lists: whitelisted domains carry full trust, blacklisted domains are
//! dropped outright, and everything else gets a neutral default that
//! discounts the response confidence.

use newsloom_config::PolicyConfig;
use newsloom_core::text::normalize_domain;

/// Trust of unknown domains
pub const DEFAULT_TRUST: f64 = 0.7;

/// Classification of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustClass {
    /// Whitelisted, trust 1.0
    Trusted,
    /// Blacklisted, trust 0.0, evidence dropped
    Blocked,
    /// Unknown, trust 0.7
    Neutral,
}

impl TrustClass {
    /// Numeric trust weight
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Trusted => 1.0,
            Self::Blocked => 0.0,
            Self::Neutral => DEFAULT_TRUST,
        }
    }
}

/// Trust lookup over normalized domains
#[derive(Debug, Clone)]
pub struct DomainTrust {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
}

impl DomainTrust {
    /// Build from the policy configuration, normalizing both lists
    #[must_use]
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            whitelist: config
                .domain_whitelist
                .iter()
                .map(|d| normalize_domain(d))
                .collect(),
            blacklist: config
                .domain_blacklist
                .iter()
                .map(|d| normalize_domain(d))
                .collect(),
        }
    }

    /// Classify a URL or bare domain
    #[must_use]
    pub fn classify(&self, url: &str) -> TrustClass {
        let domain = normalize_domain(url);
        if self.blacklist.iter().any(|d| *d == domain) {
            TrustClass::Blocked
        } else if self.whitelist.iter().any(|d| *d == domain) {
            TrustClass::Trusted
        } else {
            TrustClass::Neutral
        }
    }
}
