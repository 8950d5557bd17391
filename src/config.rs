use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration
///
/// Values come from (in order of precedence): environment variables, a TOML
/// config file, built-in defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- OpenAI-compatible provider ---
    pub openai_api_key: String,
    pub openai_api_base_url: String,
    // --- Anthropic provider ---
    pub anthropic_api_key: String,
    pub anthropic_api_base_url: String,
    /// Default model selection for jobs that do not specify one
    pub default_model: String,
    /// Concurrent model calls allowed per provider
    pub max_concurrent_model_calls: usize,
    /// How long a call may wait for a provider slot before giving up
    pub rate_limit_wait_secs: u64,
    /// Per-call timeout for a single model request
    pub model_call_timeout_secs: u64,
    /// Retries after the first attempt for transient model errors
    pub max_model_retries: usize,
    /// Base delay for exponential backoff between retries
    pub retry_base_delay_ms: u64,
    /// Optional ceiling for a whole job, across all stages
    pub job_timeout_secs: Option<u64>,
    /// How long finished jobs stay queryable before eviction
    pub job_retention_secs: u64,
    /// Directory the markdown renderer writes reports into
    pub report_output_dir: String,
    /// Whether to log per-item matching detail
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_api_base_url: "https://api.openai.com/v1".to_string(),
            anthropic_api_key: String::new(),
            anthropic_api_base_url: "https://api.anthropic.com".to_string(),
            default_model: "gpt-4o".to_string(),
            max_concurrent_model_calls: 4,
            rate_limit_wait_secs: 300,
            model_call_timeout_secs: 180,
            max_model_retries: 3,
            retry_base_delay_ms: 1000,
            job_timeout_secs: None,
            job_retention_secs: 600,
            report_output_dir: "reports".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or(default.openai_api_key),
            openai_api_base_url: std::env::var("OPENAI_API_BASE_URL")
                .unwrap_or(default.openai_api_base_url),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                .unwrap_or(default.anthropic_api_key),
            anthropic_api_base_url: std::env::var("ANTHROPIC_API_BASE_URL")
                .unwrap_or(default.anthropic_api_base_url),
            default_model: std::env::var("DEFAULT_MODEL").unwrap_or(default.default_model),
            max_concurrent_model_calls: std::env::var("MAX_CONCURRENT_MODEL_CALLS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_concurrent_model_calls),
            rate_limit_wait_secs: std::env::var("RATE_LIMIT_WAIT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_wait_secs),
            model_call_timeout_secs: std::env::var("MODEL_CALL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.model_call_timeout_secs),
            max_model_retries: std::env::var("MAX_MODEL_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_model_retries),
            retry_base_delay_ms: std::env::var("RETRY_BASE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.retry_base_delay_ms),
            job_timeout_secs: std::env::var("JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            job_retention_secs: std::env::var("JOB_RETENTION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.job_retention_secs),
            report_output_dir: std::env::var("REPORT_OUTPUT_DIR")
                .unwrap_or(default.report_output_dir),
            verbose_logging: std::env::var("VERBOSE_LOGGING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.verbose_logging),
        }
    }

    /// Load a configuration from a TOML file
    ///
    /// Missing keys fall back to defaults via `#[serde(default)]`.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Other(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| AppError::Other(format!("cannot parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}
