//! Error types and handling for newsloom
//!
//! One taxonomy enum shared across the workspace. Components return
//! `Result<T>`; only the orchestrator turns an error into a wire-level
//! [`crate::types::ErrorResponse`].

use thiserror::Error;

use crate::types::ErrorCode;

/// Comprehensive error enum for all newsloom operations
#[derive(Debug, Error)]
pub enum NewsloomError {
    /// Schema, length, evidence, or argument-parsing violation
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Retrieval returned zero documents after all recovery attempts
    #[error("no data: {message}")]
    NoData { message: String },

    /// Token, cost, or time cap hit with no remaining degradation
    #[error("budget exceeded: {message}")]
    BudgetExceeded { message: String },

    /// Every model in a route chain failed
    #[error("model unavailable: {message}")]
    ModelUnavailable { message: String },

    /// A single provider attempt failed (recoverable via fallback)
    #[error("provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// Document store or memory store failure
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Invalid or missing configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected failure in the core
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl NewsloomError {
    /// Build a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a no-data error
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::NoData {
            message: message.into(),
        }
    }

    /// Build a budget-exceeded error
    pub fn budget_exceeded(message: impl Into<String>) -> Self {
        Self::BudgetExceeded {
            message: message.into(),
        }
    }

    /// Build a model-unavailable error
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            message: message.into(),
        }
    }

    /// Build a provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Build a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Build a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Build an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Project onto the wire-level error code
    ///
    /// Provider and storage failures have no dedicated wire code: a
    /// provider failure that escapes the router means the whole chain
    /// failed, and storage failures are internal from the user's view.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } | Self::Configuration { .. } => ErrorCode::ValidationFailed,
            Self::NoData { .. } => ErrorCode::NoData,
            Self::BudgetExceeded { .. } => ErrorCode::BudgetExceeded,
            Self::ModelUnavailable { .. } | Self::Provider { .. } => ErrorCode::ModelUnavailable,
            Self::Storage { .. } | Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Whether an immediate client retry is reasonable
    #[must_use]
    pub const fn retryable(&self) -> bool {
        self.code().retryable()
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, NewsloomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_projection() {
        assert_eq!(
            NewsloomError::validation("bad").code(),
            ErrorCode::ValidationFailed
        );
        assert_eq!(NewsloomError::no_data("empty").code(), ErrorCode::NoData);
        assert_eq!(
            NewsloomError::provider("openai", "503").code(),
            ErrorCode::ModelUnavailable
        );
        assert_eq!(NewsloomError::storage("down").code(), ErrorCode::Internal);
    }

    #[test]
    fn test_retryable_follows_code() {
        assert!(!NewsloomError::validation("bad").retryable());
        assert!(NewsloomError::no_data("empty").retryable());
        assert!(!NewsloomError::budget_exceeded("spent").retryable());
        assert!(NewsloomError::model_unavailable("all failed").retryable());
        assert!(NewsloomError::internal("bug").retryable());
    }

    #[test]
    fn test_display_includes_provider() {
        let err = NewsloomError::provider("anthropic", "timeout");
        assert!(err.to_string().contains("anthropic"));
        assert!(err.to_string().contains("timeout"));
    }
}
