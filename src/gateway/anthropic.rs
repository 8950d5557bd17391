//! Anthropic messages adapter
//!
//! Thin reqwest client for the `/v1/messages` endpoint. Supports extended
//! thinking: the thinking block comes back as the reply rationale.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::provider::{ModelError, ModelProvider, PromptSpec, ProviderReply, ResponseMode};
use crate::config::Config;
use crate::models::job::ProviderKind;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const THINKING_BUDGET_TOKENS: u32 = 16000;

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Thinking { thinking: String },
    #[serde(other)]
    Other,
}

impl AnthropicProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.anthropic_api_key.clone(),
            base_url: config.anthropic_api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn status_error(&self, status: u16, body: String) -> ModelError {
        let provider = ProviderKind::Anthropic;
        match status {
            401 | 403 => ModelError::Auth { provider },
            400 => ModelError::InvalidRequest {
                provider,
                message: body,
            },
            429 => ModelError::RateLimited {
                provider,
                retry_after: None,
            },
            408 => ModelError::Timeout { provider },
            _ => ModelError::Provider {
                provider,
                status,
                message: body,
            },
        }
    }

    fn build_body(&self, prompt: &PromptSpec) -> serde_json::Value {
        let mut body = json!({
            "model": prompt.model_id,
            "max_tokens": prompt.max_tokens,
            "temperature": prompt.temperature,
            "system": prompt.system,
            "messages": [{"role": "user", "content": prompt.user}],
        });
        if prompt.response_mode == ResponseMode::ExtendedReasoning {
            body["thinking"] = json!({
                "type": "enabled",
                "budget_tokens": THINKING_BUDGET_TOKENS,
            });
        }
        body
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(&self, prompt: &PromptSpec) -> Result<ProviderReply, ModelError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!("calling anthropic model {}", prompt.model_id);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_body(prompt))
            .send()
            .await
            .map_err(|e| {
                warn!("anthropic request failed: {}", e);
                if e.is_timeout() {
                    ModelError::Timeout {
                        provider: ProviderKind::Anthropic,
                    }
                } else {
                    ModelError::Transport {
                        provider: ProviderKind::Anthropic,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status.as_u16(), body));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| ModelError::Transport {
            provider: ProviderKind::Anthropic,
            message: format!("cannot decode response: {}", e),
        })?;

        let mut text = String::new();
        let mut rationale = String::new();
        for block in parsed.content {
            match block {
                ContentBlock::Text { text: t } => text.push_str(&t),
                ContentBlock::Thinking { thinking } => rationale.push_str(&thinking),
                ContentBlock::Other => {}
            }
        }

        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse {
                provider: ProviderKind::Anthropic,
            });
        }

        Ok(ProviderReply {
            text: text.trim().to_string(),
            rationale: if rationale.is_empty() {
                None
            } else {
                Some(rationale)
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        let mut config = Config::default();
        config.anthropic_api_key = "test-key".to_string();
        AnthropicProvider::new(&config)
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        let p = provider();
        assert!(matches!(p.status_error(401, String::new()), ModelError::Auth { .. }));
        assert!(matches!(
            p.status_error(429, String::new()),
            ModelError::RateLimited { .. }
        ));
        assert!(matches!(
            p.status_error(500, String::new()),
            ModelError::Provider { status: 500, .. }
        ));
    }

    #[test]
    fn extended_reasoning_adds_thinking_block() {
        let p = provider();
        let prompt = PromptSpec {
            system: "s".into(),
            user: "u".into(),
            model_id: "claude-3-7-sonnet-20250219".into(),
            response_mode: ResponseMode::ExtendedReasoning,
            temperature: 1.0,
            max_tokens: 20000,
        };
        let body = p.build_body(&prompt);
        assert_eq!(body["thinking"]["type"], "enabled");
        assert_eq!(body["thinking"]["budget_tokens"], THINKING_BUDGET_TOKENS);

        let standard = PromptSpec {
            response_mode: ResponseMode::Standard,
            ..prompt
        };
        assert!(p.build_body(&standard).get("thinking").is_none());
    }

    #[test]
    fn content_blocks_deserialize() {
        let raw = r#"{"content":[
            {"type":"thinking","thinking":"step by step"},
            {"type":"text","text":"{\"ok\":true}"}
        ]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content.len(), 2);
    }
}
