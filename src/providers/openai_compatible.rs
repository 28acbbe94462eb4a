use crate::core::error::CortexError;
use crate::providers::base_client::{AuthScheme, HttpClient, decode_envelope, non_empty};
use crate::providers::{GenerationParams, LLMProvider, Prompt, Provider, check_request};
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatCompletionMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// Adapter for the chat-completions protocol shared by OpenAI, OpenRouter and DeepSeek.
#[derive(Clone)]
pub struct OpenAICompatibleProvider {
    provider: Provider,
    client: HttpClient,
    json_mode: bool,
}

impl OpenAICompatibleProvider {
    pub fn new(
        provider: Provider,
        base_url: String,
        api_key: SecretString,
        extra_headers: Option<HashMap<String, String>>,
        timeout: Duration,
    ) -> Result<Self, CortexError> {
        Ok(Self {
            provider,
            client: HttpClient::new(base_url, api_key, AuthScheme::Bearer, extra_headers, timeout)?,
            json_mode: true,
        })
    }

    /// Disables `response_format`, for gateways that route to models without JSON mode.
    pub fn without_json_mode(mut self) -> Self {
        self.json_mode = false;
        self
    }

    fn build_payload(&self, prompt: &Prompt, params: &GenerationParams) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: params.model.clone(),
            messages: prompt
                .messages()
                .into_iter()
                .map(|m| ChatCompletionMessage {
                    role: m.role.as_str(),
                    content: m.content,
                })
                .collect(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            response_format: self.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

/// Pulls the first choice's text out of a chat-completions body.
pub fn extract_text(provider: Provider, body: &str) -> Result<String, CortexError> {
    let parsed: ChatCompletionResponse = decode_envelope(provider.name(), body)?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content);
    non_empty(provider.name(), text)
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<String, CortexError> {
        check_request(prompt, params)?;
        let payload = self.build_payload(prompt, params);
        let body = self.client.post("chat/completions", &payload).await?;
        extract_text(self.provider, &body)
    }
}
