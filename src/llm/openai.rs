//! OpenAI-compatible chat completions client
//!
//! Works with OpenAI and any server exposing `/chat/completions` (vLLM,
//! Ollama, Azure-style proxies) through `base_url`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse, Role, Usage};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_MODEL: &str = "gpt-4o";

const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Environment variable holding the API key
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for the OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub base_url: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(120),
            base_url: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// OpenAI chat completions client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
    usage: Mutex<Usage>,
}

impl OpenAiClient {
    /// Create a client reading OPENAI_API_KEY from the environment
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV).map_err(|_| LlmError::MissingApiKey {
            env_var: OPENAI_API_KEY_ENV.to_string(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            config,
            usage: Mutex::new(Usage::default()),
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    /// System prompt goes first as a `system` role message
    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(request.system.clone()),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: Some(m.content.clone()),
        }));

        ChatRequest {
            model: request.model.clone().unwrap_or_else(|| self.config.model.clone()),
            messages,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature,
        }
    }

    fn parse_response(&self, response: ChatResponse) -> Result<CompletionResponse, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        let usage = response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        if let Ok(mut total) = self.usage.lock() {
            total.add(&usage);
        }

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        log::debug!("OpenAI request to model {}", body.model);

        let mut req = self.client.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 {
                return Err(LlmError::Unauthorized(text));
            }
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        self.parse_response(parsed)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn total_usage(&self) -> Usage {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::with_api_key("sk-test".to_string(), OpenAiConfig::default()).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = OpenAiConfig::default();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tokens, 1000);
    }

    #[test]
    fn test_endpoint_default_and_custom() {
        assert_eq!(client().endpoint(), "https://api.openai.com/v1/chat/completions");

        let custom = OpenAiClient::with_api_key(
            String::new(),
            OpenAiConfig {
                base_url: Some("http://localhost:11434/v1/".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(custom.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert!(!custom.is_ready());
    }

    #[test]
    fn test_build_request_puts_system_first() {
        let request = CompletionRequest::new("be terse")
            .with_user_message("list files")
            .with_temperature(0.3);

        let body = client().build_request(&request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be terse");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "list files");
    }

    #[test]
    fn test_build_request_without_system_or_temperature() {
        let request = CompletionRequest::new("").with_user_message("hi");
        let json = serde_json::to_value(client().build_request(&request)).unwrap();

        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_parse_response() {
        let raw: ChatResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "EXECUTE: ls -la" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16 }
        }))
        .unwrap();

        let client = client();
        let response = client.parse_response(raw).unwrap();

        assert_eq!(response.content, "EXECUTE: ls -la");
        assert_eq!(client.total_usage(), Usage::new(12, 4));
    }

    #[test]
    fn test_parse_response_no_choices() {
        let raw: ChatResponse = serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(matches!(client().parse_response(raw), Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_debug_impl_hides_key() {
        let debug_str = format!("{:?}", client());
        assert!(debug_str.contains("OpenAiClient"));
        assert!(!debug_str.contains("sk-test"));
    }
}
