//! OpenAI-compatible provider adapter
//!
//! Single responsibility: one chat completion per call. Works against any
//! OpenAI-compatible endpoint via a configurable base URL.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::provider::{ModelError, ModelProvider, PromptSpec, ProviderReply};
use crate::config::Config;
use crate::models::job::ProviderKind;

pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_api_base_url);
        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// Map an async-openai error onto the gateway taxonomy
    fn classify_error(&self, err: &dyn std::fmt::Display) -> ModelError {
        let text = err.to_string();
        let lower = text.to_lowercase();
        if lower.contains("429") || lower.contains("rate limit") {
            ModelError::RateLimited {
                provider: ProviderKind::OpenAi,
                retry_after: None,
            }
        } else if lower.contains("401") || lower.contains("403") || lower.contains("api key") {
            ModelError::Auth {
                provider: ProviderKind::OpenAi,
            }
        } else if lower.contains("400") || lower.contains("invalid request") {
            ModelError::InvalidRequest {
                provider: ProviderKind::OpenAi,
                message: text,
            }
        } else if lower.contains("timed out") || lower.contains("timeout") {
            ModelError::Timeout {
                provider: ProviderKind::OpenAi,
            }
        } else {
            ModelError::Transport {
                provider: ProviderKind::OpenAi,
                message: text,
            }
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(&self, prompt: &PromptSpec) -> Result<ProviderReply, ModelError> {
        debug!(
            "calling openai model {} ({} chars)",
            prompt.model_id,
            prompt.user.len()
        );

        let mut messages = Vec::new();
        if !prompt.system.is_empty() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.as_str())
                .build()
                .map_err(|e| self.classify_error(&e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.user.as_str())
            .build()
            .map_err(|e| self.classify_error(&e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&prompt.model_id)
            .messages(messages)
            .temperature(prompt.temperature)
            .max_tokens(prompt.max_tokens)
            .build()
            .map_err(|e| self.classify_error(&e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("openai call failed: {}", e);
            self.classify_error(&e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ModelError::EmptyResponse {
                provider: ProviderKind::OpenAi,
            });
        }

        Ok(ProviderReply {
            text: content.trim().to_string(),
            rationale: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        let mut config = Config::default();
        config.openai_api_key = "test-key".to_string();
        OpenAiProvider::new(&config)
    }

    #[test]
    fn error_classification_by_message() {
        let p = provider();
        assert!(matches!(
            p.classify_error(&"429 Too Many Requests"),
            ModelError::RateLimited { .. }
        ));
        assert!(matches!(
            p.classify_error(&"401 Unauthorized"),
            ModelError::Auth { .. }
        ));
        assert!(matches!(
            p.classify_error(&"operation timed out"),
            ModelError::Timeout { .. }
        ));
        assert!(matches!(
            p.classify_error(&"connection reset by peer"),
            ModelError::Transport { .. }
        ));
    }

    /// Live connectivity test; needs real credentials in the environment
    #[tokio::test]
    #[ignore]
    async fn live_completion_roundtrip() {
        let config = Config::from_env();
        let provider = OpenAiProvider::new(&config);
        let prompt = PromptSpec {
            system: "You answer with a single JSON object.".to_string(),
            user: "Return {\"ok\": true} and nothing else.".to_string(),
            model_id: "gpt-4o-mini".to_string(),
            response_mode: super::super::provider::ResponseMode::Standard,
            temperature: 0.0,
            max_tokens: 100,
        };
        let reply = provider.complete(&prompt).await.expect("live call failed");
        assert!(reply.text.contains("ok"));
    }
}
