//! Provider abstraction
//!
//! A `ModelProvider` turns a `PromptSpec` into a `ProviderReply`; the gateway
//! layers rate limiting, timeouts, retry, and JSON extraction on top.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::job::{ModelSelection, ProviderKind};

/// How the provider should produce its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Plain completion
    Standard,
    /// Request a separate reasoning trace where the model supports one
    ExtendedReasoning,
}

/// A fully specified model request
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub system: String,
    pub user: String,
    pub model_id: String,
    pub response_mode: ResponseMode,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PromptSpec {
    /// Build a spec with the per-model defaults for temperature and tokens
    pub fn for_model(
        selection: ModelSelection,
        system: impl Into<String>,
        user: impl Into<String>,
        response_mode: ResponseMode,
    ) -> Self {
        let (temperature, max_tokens) = match selection {
            ModelSelection::O4Mini => (0.7, 4000),
            ModelSelection::Gpt41 => (0.1, 8000),
            // extended thinking requires temperature 1
            ModelSelection::Claude37Sonnet if response_mode == ResponseMode::ExtendedReasoning => {
                (1.0, 20000)
            }
            _ => (0.3, 6000),
        };
        Self {
            system: system.into(),
            user: user.into(),
            model_id: selection.model_id().to_string(),
            response_mode,
            temperature,
            max_tokens,
        }
    }
}

/// Raw provider output before JSON extraction
#[derive(Debug, Clone)]
pub struct ProviderReply {
    /// The answer text (all text blocks concatenated)
    pub text: String,
    /// Reasoning trace, when the provider returned one
    pub rationale: Option<String>,
}

/// Errors a model call can produce
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{provider} call timed out")]
    Timeout { provider: ProviderKind },
    #[error("{provider} transport failure: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },
    #[error("{provider} returned status {status}: {message}")]
    Provider {
        provider: ProviderKind,
        status: u16,
        message: String,
    },
    #[error("{provider} rate limited the request")]
    RateLimited {
        provider: ProviderKind,
        retry_after: Option<Duration>,
    },
    #[error("{provider} rejected the credentials")]
    Auth { provider: ProviderKind },
    #[error("{provider} rejected the request: {message}")]
    InvalidRequest {
        provider: ProviderKind,
        message: String,
    },
    #[error("model output was not valid JSON: {snippet}")]
    MalformedOutput { snippet: String },
    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: ProviderKind },
    #[error("no {provider} slot became available within {waited:?}")]
    RateLimitTimeout {
        provider: ProviderKind,
        waited: Duration,
    },
}

impl ModelError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModelError::Timeout { .. }
                | ModelError::Transport { .. }
                | ModelError::Provider { .. }
                | ModelError::RateLimited { .. }
        )
    }

    /// Machine-checkable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Timeout { .. } => "timeout",
            ModelError::Transport { .. } => "transport",
            ModelError::Provider { .. } => "provider",
            ModelError::RateLimited { .. } => "rate_limited",
            ModelError::Auth { .. } => "auth",
            ModelError::InvalidRequest { .. } => "invalid_request",
            ModelError::MalformedOutput { .. } => "malformed_output",
            ModelError::EmptyResponse { .. } => "empty_response",
            ModelError::RateLimitTimeout { .. } => "rate_limit_timeout",
        }
    }
}

/// A single model backend
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Perform one model call; no retry at this layer
    async fn complete(&self, prompt: &PromptSpec) -> Result<ProviderReply, ModelError>;
}
