pub mod anthropic;
pub mod extract;
pub mod model_gateway;
pub mod openai;
pub mod provider;
pub mod rate_limiter;

pub use anthropic::AnthropicProvider;
pub use model_gateway::{ModelGateway, RetryPolicy, StructuredResult};
pub use openai::OpenAiProvider;
pub use provider::{ModelError, ModelProvider, PromptSpec, ProviderReply, ResponseMode};
pub use rate_limiter::{RateLimitPermit, RateLimiter};
