//! LLM Client Layer - chat completion APIs behind one trait
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - OpenAiClient and AnthropicClient implementations
//! - MockLlmClient for scripted tests

pub mod anthropic;
pub mod client;
pub mod openai;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmError, MockLlmClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, Usage};

use crate::config::{LlmConfig, Provider};

/// Build the configured client. An explicit `api_key` wins over the environment.
pub fn from_config(config: &LlmConfig, api_key: Option<String>) -> Result<Arc<dyn LlmClient>, LlmError> {
    let timeout = Duration::from_millis(config.timeout_ms);

    let client: Arc<dyn LlmClient> = match config.provider {
        Provider::OpenAi => {
            let openai = OpenAiConfig {
                model: config.model.clone(),
                max_tokens: config.max_tokens,
                timeout,
                base_url: config.base_url.clone(),
            };
            match api_key {
                Some(key) => Arc::new(OpenAiClient::with_api_key(key, openai)?),
                None => Arc::new(OpenAiClient::new(openai)?),
            }
        }
        Provider::Anthropic => {
            let anthropic = AnthropicConfig {
                model: config.model.clone(),
                max_tokens: config.max_tokens,
                timeout,
                base_url: config.base_url.clone(),
            };
            match api_key {
                Some(key) => Arc::new(AnthropicClient::with_api_key(key, anthropic)?),
                None => Arc::new(AnthropicClient::new(anthropic)?),
            }
        }
    };

    log::info!("Using {:?} model {}", config.provider, client.model());
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_with_explicit_key() {
        let config = LlmConfig::default();
        let client = from_config(&config, Some("sk-test".to_string())).unwrap();
        assert!(client.is_ready());
        assert_eq!(client.model(), config.model);
    }

    #[test]
    fn test_from_config_anthropic() {
        let config = LlmConfig {
            provider: Provider::Anthropic,
            model: "claude-3-haiku-20240307".to_string(),
            ..Default::default()
        };
        let client = from_config(&config, Some("test-key".to_string())).unwrap();
        assert_eq!(client.model(), "claude-3-haiku-20240307");
    }
}
