//! Model gateway
//!
//! The one place the rest of the crate calls models through. Layers, in
//! order: rate-limiter permit, per-call timeout, JSON extraction, retry with
//! exponential backoff + jitter for transient failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::extract::extract_json;
use super::provider::{ModelError, ModelProvider, PromptSpec};
use super::rate_limiter::RateLimiter;
use super::{AnthropicProvider, OpenAiProvider};
use crate::config::Config;
use crate::models::job::ProviderKind;

/// Retry behavior for transient model errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff for the given attempt (1-based), with random jitter
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let base = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        let jitter_ceiling = (base.as_millis() as u64 / 2).max(1);
        let jitter = rand::rng().random_range(0..=jitter_ceiling);
        base + Duration::from_millis(jitter)
    }
}

/// Parsed model output plus any reasoning trace
#[derive(Debug, Clone)]
pub struct StructuredResult {
    pub content: serde_json::Value,
    pub rationale: Option<String>,
}

/// Provider-agnostic model access
pub struct ModelGateway {
    providers: HashMap<ProviderKind, Arc<dyn ModelProvider>>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ModelGateway {
    pub fn new(limiter: RateLimiter, retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            limiter,
            retry,
            call_timeout,
        }
    }

    /// Build a gateway with the real provider adapters
    pub fn from_config(config: &Config) -> Self {
        let limiter = RateLimiter::new(
            config.max_concurrent_model_calls,
            Duration::from_secs(config.rate_limit_wait_secs),
        );
        let retry = RetryPolicy {
            max_retries: config.max_model_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            ..RetryPolicy::default()
        };
        let mut gateway = Self::new(
            limiter,
            retry,
            Duration::from_secs(config.model_call_timeout_secs),
        );
        gateway.register(Arc::new(OpenAiProvider::new(config)));
        gateway.register(Arc::new(AnthropicProvider::new(config)));
        gateway
    }

    /// Install (or replace) a provider backend
    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Call a model and parse its output as JSON
    ///
    /// Transient failures are retried up to the policy's limit; anything
    /// else propagates immediately. The rate-limiter permit covers only the
    /// provider call itself, not the backoff sleeps.
    pub async fn invoke(
        &self,
        provider_kind: ProviderKind,
        prompt: &PromptSpec,
    ) -> Result<StructuredResult, ModelError> {
        let provider = self
            .providers
            .get(&provider_kind)
            .ok_or_else(|| ModelError::InvalidRequest {
                provider: provider_kind,
                message: "no provider registered".to_string(),
            })?
            .clone();

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.invoke_once(provider.as_ref(), provider_kind, prompt).await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("{} call succeeded on attempt {}", provider_kind, attempt);
                    }
                    return Ok(result);
                }
                Err(err) if err.is_transient() && attempt <= self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        "⚠️ {} call failed (attempt {}/{}): {}; retrying in {:?}",
                        provider_kind,
                        attempt,
                        self.retry.max_retries + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn invoke_once(
        &self,
        provider: &dyn ModelProvider,
        provider_kind: ProviderKind,
        prompt: &PromptSpec,
    ) -> Result<StructuredResult, ModelError> {
        let permit = self.limiter.acquire(provider_kind).await?;

        let reply = match tokio::time::timeout(self.call_timeout, provider.complete(prompt)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ModelError::Timeout {
                    provider: provider_kind,
                })
            }
        };
        drop(permit);

        let content = extract_json(&reply.text)?;
        Ok(StructuredResult {
            content,
            rationale: reply.rationale,
        })
    }
}
