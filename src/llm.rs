//! Language model client abstraction and the OpenAI chat implementation.

use std::time::Duration;

use async_trait::async_trait;
use docqa_core::prompt::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::openai::OpenAiHttp;

/// Generates an answer from an assembled chat transcript.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// OpenAI `POST /chat/completions` client.
pub struct OpenAiChat {
    http: OpenAiHttp,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(http: OpenAiHttp, model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            http,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    /// Build from configuration, reading the API key from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = OpenAiHttp::new(
            config.api_base.as_str(),
            OpenAiHttp::api_key_from_env()?,
            Duration::from_secs(config.llm.timeout_secs),
            config.llm.max_retries,
        )?;
        Ok(Self::new(
            http,
            config.llm.model.clone(),
            config.llm.temperature,
            config.llm.max_tokens,
        ))
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let json = self
            .http
            .post_json("chat/completions", &body)
            .await
            .map_err(Error::generation)?;
        parse_chat_response(json)
    }
}

fn parse_chat_response(json: serde_json::Value) -> Result<String> {
    let response: ChatCompletionResponse = serde_json::from_value(json)
        .map_err(|e| Error::generation(format!("invalid chat response: {}", e)))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::generation("chat response contained no content"))
}
