//! Response policy configuration

use serde::{Deserialize, Serialize};

/// PII masking and domain trust configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Mask PII patterns in outgoing text
    pub pii_mask_enabled: bool,
    /// Domains granted full trust (1.0)
    pub domain_whitelist: Vec<String>,
    /// Domains whose evidence is dropped outright
    pub domain_blacklist: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            pii_mask_enabled: true,
            domain_whitelist: vec![
                "reuters.com".to_string(),
                "apnews.com".to_string(),
                "bloomberg.com".to_string(),
                "ft.com".to_string(),
            ],
            domain_blacklist: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_on_by_default() {
        let config = PolicyConfig::default();
        assert!(config.pii_mask_enabled);
        assert!(config.domain_blacklist.is_empty());
    }
}
