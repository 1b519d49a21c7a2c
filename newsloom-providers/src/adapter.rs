//! Provider adapters
//!
//! One narrow trait per provider connection: `complete(prompt, max_tokens,
//! timeout) → {text, tokens_in?, tokens_out?}`. Adapters hide provider
//! JSON shapes; the router never sees them.

use std::time::Duration;

use async_trait::async_trait;
use newsloom_core::{NewsloomError, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Uniform completion result across providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub text: String,
    /// Prompt tokens as reported by the provider, if any
    pub tokens_in: Option<u64>,
    /// Completion tokens as reported by the provider, if any
    pub tokens_out: Option<u64>,
}

/// Trait for LLM provider connections
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Model identifier this connection serves
    fn model(&self) -> &str;

    /// Provider family name for logs and pooling
    fn family(&self) -> &str;

    /// Execute one completion attempt
    ///
    /// Implementations must honor `timeout` end-to-end; a slow upstream
    /// aborts rather than blocking the parent request.
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<ProviderResponse>;
}

/// Wire shape family for HTTP chat providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    OpenAi,
    Anthropic,
    Google,
}

impl ProviderFamily {
    /// Parse the `provider` config value
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "google" | "gemini" => Some(Self::Google),
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    const fn default_endpoint(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
            Self::Google => {
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
            }
        }
    }
}

/// HTTP chat completion adapter
///
/// Speaks the provider's JSON dialect directly over a shared
/// `reqwest::Client`; connections are pooled per process.
pub struct HttpChatProvider {
    model: String,
    family: ProviderFamily,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpChatProvider {
    /// Build an adapter, resolving the API key from `api_key_env`
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        family: ProviderFamily,
        endpoint: Option<String>,
        api_key_env: Option<&str>,
        client: reqwest::Client,
    ) -> Self {
        let model = model.into();
        let endpoint = endpoint
            .unwrap_or_else(|| family.default_endpoint().replace("{model}", &model));
        let api_key = api_key_env.and_then(|name| std::env::var(name).ok());
        if api_key.is_none() {
            warn!(model = %model, "no API key resolved for provider");
        }
        Self {
            model,
            family,
            endpoint,
            api_key,
            client,
        }
    }

    fn request_body(&self, prompt: &str, max_tokens: u32) -> Value {
        match self.family {
            ProviderFamily::OpenAi => json!({
                "model": self.model,
                "max_tokens": max_tokens,
                "messages": [{"role": "user", "content": prompt}],
            }),
            ProviderFamily::Anthropic => json!({
                "model": self.model,
                "max_tokens": max_tokens,
                "messages": [{"role": "user", "content": prompt}],
            }),
            ProviderFamily::Google => json!({
                "contents": [{"parts": [{"text": prompt}]}],
                "generationConfig": {"maxOutputTokens": max_tokens},
            }),
        }
    }

    fn parse_response(&self, body: &Value) -> Result<ProviderResponse> {
        let (text, tokens_in, tokens_out) = match self.family {
            ProviderFamily::OpenAi => (
                body["choices"][0]["message"]["content"].as_str(),
                body["usage"]["prompt_tokens"].as_u64(),
                body["usage"]["completion_tokens"].as_u64(),
            ),
            ProviderFamily::Anthropic => (
                body["content"][0]["text"].as_str(),
                body["usage"]["input_tokens"].as_u64(),
                body["usage"]["output_tokens"].as_u64(),
            ),
            ProviderFamily::Google => (
                body["candidates"][0]["content"]["parts"][0]["text"].as_str(),
                body["usageMetadata"]["promptTokenCount"].as_u64(),
                body["usageMetadata"]["candidatesTokenCount"].as_u64(),
            ),
        };
        let text = text.ok_or_else(|| {
            NewsloomError::provider(self.family.as_str(), "response missing completion text")
        })?;
        Ok(ProviderResponse {
            text: text.to_string(),
            tokens_in,
            tokens_out,
        })
    }
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn family(&self) -> &str {
        self.family.as_str()
    }

    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<ProviderResponse> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&self.request_body(prompt, max_tokens));
        if let Some(key) = &self.api_key {
            request = match self.family {
                ProviderFamily::OpenAi => request.bearer_auth(key),
                ProviderFamily::Anthropic => request
                    .header("x-api-key", key)
                    .header("anthropic-version", "2023-06-01"),
                ProviderFamily::Google => request.query(&[("key", key.as_str())]),
            };
        }

        debug!(model = %self.model, endpoint = %self.endpoint, "sending completion request");
        let response = request
            .send()
            .await
            .map_err(|e| NewsloomError::provider(self.family.as_str(), e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NewsloomError::provider(
                self.family.as_str(),
                format!("HTTP {status} from {}", self.endpoint),
            ));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| NewsloomError::provider(self.family.as_str(), e.to_string()))?;
        self.parse_response(&body)
    }
}

/// Deterministic offline provider
///
/// Answers from a fixed script; used in tests and air-gapped runs. A
/// scripted entry of `Err` simulates a provider outage, which exercises
/// fallback chains.
pub struct StubProvider {
    model: String,
    responses: Mutex<Vec<std::result::Result<String, String>>>,
    fallback_text: String,
    usage_override: Option<(u64, u64)>,
    calls: Mutex<u32>,
}

impl StubProvider {
    /// Provider that always answers `text`
    #[must_use]
    pub fn answering(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            responses: Mutex::new(Vec::new()),
            fallback_text: text.into(),
            usage_override: None,
            calls: Mutex::new(0),
        }
    }

    /// Provider that always answers `text` and reports fixed token usage
    ///
    /// Lets tests drain a ledger deterministically.
    #[must_use]
    pub fn with_usage(
        model: impl Into<String>,
        text: impl Into<String>,
        tokens_in: u64,
        tokens_out: u64,
    ) -> Self {
        let mut stub = Self::answering(model, text);
        stub.usage_override = Some((tokens_in, tokens_out));
        stub
    }

    /// Provider that replays `script` front to back, then repeats the
    /// final entry
    #[must_use]
    pub fn scripted(
        model: impl Into<String>,
        script: Vec<std::result::Result<String, String>>,
    ) -> Self {
        Self {
            model: model.into(),
            responses: Mutex::new(script),
            fallback_text: "ok".to_string(),
            usage_override: None,
            calls: Mutex::new(0),
        }
    }

    /// Provider that fails every call
    #[must_use]
    pub fn failing(model: impl Into<String>) -> Self {
        Self::scripted(model, vec![Err("simulated outage".to_string())])
    }

    /// Number of completion calls observed
    #[must_use]
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl ChatProvider for StubProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn family(&self) -> &str {
        "stub"
    }

    async fn complete(
        &self,
        prompt: &str,
        _max_tokens: u32,
        _timeout: Duration,
    ) -> Result<ProviderResponse> {
        *self.calls.lock() += 1;
        let next = {
            let mut script = self.responses.lock();
            if script.len() > 1 {
                Some(script.remove(0))
            } else {
                script.first().cloned()
            }
        };
        let (tokens_in, tokens_out) = self
            .usage_override
            .unwrap_or_else(|| (super::cost::estimate_tokens(prompt), 24));
        match next {
            Some(Ok(text)) => Ok(ProviderResponse {
                text,
                tokens_in: Some(tokens_in),
                tokens_out: Some(tokens_out),
            }),
            Some(Err(message)) => Err(NewsloomError::provider("stub", message)),
            None => Ok(ProviderResponse {
                text: self.fallback_text.clone(),
                tokens_in: Some(tokens_in),
                tokens_out: Some(tokens_out),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_replays_script_then_repeats() {
        let stub = StubProvider::scripted(
            "m",
            vec![Ok("first".to_string()), Ok("second".to_string())],
        );
        let a = stub.complete("p", 16, Duration::from_secs(1)).await.unwrap();
        let b = stub.complete("p", 16, Duration::from_secs(1)).await.unwrap();
        let c = stub.complete("p", 16, Duration::from_secs(1)).await.unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
        assert_eq!(c.text, "second");
        assert_eq!(stub.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_stub_errors() {
        let stub = StubProvider::failing("m");
        let err = stub
            .complete("p", 16, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, NewsloomError::Provider { .. }));
    }

    #[test]
    fn test_openai_parse_shape() {
        let provider = HttpChatProvider::new(
            "gpt-4o",
            ProviderFamily::OpenAi,
            None,
            None,
            reqwest::Client::new(),
        );
        let body = json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        });
        let parsed = provider.parse_response(&body).unwrap();
        assert_eq!(parsed.text, "hello");
        assert_eq!(parsed.tokens_in, Some(12));
        assert_eq!(parsed.tokens_out, Some(3));
    }

    #[test]
    fn test_google_parse_shape() {
        let provider = HttpChatProvider::new(
            "gemini-2.0-flash",
            ProviderFamily::Google,
            None,
            None,
            reqwest::Client::new(),
        );
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "hi"}]}}],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 2}
        });
        let parsed = provider.parse_response(&body).unwrap();
        assert_eq!(parsed.text, "hi");
        assert_eq!(parsed.tokens_in, Some(9));
    }

    #[test]
    fn test_missing_text_is_provider_error() {
        let provider = HttpChatProvider::new(
            "claude-3-5-sonnet",
            ProviderFamily::Anthropic,
            None,
            None,
            reqwest::Client::new(),
        );
        let err = provider.parse_response(&json!({"content": []})).unwrap_err();
        assert!(matches!(err, NewsloomError::Provider { .. }));
    }
}
