//! Generative model abstraction.
//!
//! The pipeline talks to one polymorphic [`GenerativeModel`]; the concrete
//! backend is an OpenAI-compatible chat completions endpoint. Tests swap in
//! mocks, so nothing above this module knows about HTTP.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::GenerationError;

/// A single completion request. The caller owns prompt construction; this
/// layer only carries it to the backend.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token accounting reported by the backend, when available.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, GenerationError>;
}

/// Chat-completions backend speaking the OpenAI wire format.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    config: ModelConfig,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionReply {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl GenerativeModel for OpenAiChatModel {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, GenerationError> {
        let body = ChatCompletionBody {
            model: &self.config.deployment,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        timeout: self.config.timeout,
                    }
                } else {
                    GenerationError::Upstream {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let reply: ChatCompletionReply =
            response.json().await.map_err(|e| GenerationError::Upstream {
                status: status.as_u16(),
                message: format!("malformed completion body: {e}"),
            })?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }

        if let Some(usage) = &reply.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion token usage"
            );
        }

        Ok(CompletionResponse {
            text,
            usage: reply.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_handles_trailing_slash() {
        let mut config = ModelConfig::for_tests("https://llm.example.com/v1/");
        let model = OpenAiChatModel::new(config.clone());
        assert_eq!(
            model.completions_url(),
            "https://llm.example.com/v1/chat/completions"
        );

        config.endpoint = "https://llm.example.com/v1".into();
        let model = OpenAiChatModel::new(config);
        assert_eq!(
            model.completions_url(),
            "https://llm.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn reply_without_content_deserializes() {
        let reply: ChatCompletionReply = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant"}}],"usage":null}"#,
        )
        .unwrap();
        assert!(reply.choices[0].message.content.is_none());
    }
}
