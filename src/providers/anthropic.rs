use crate::core::error::CortexError;
use crate::providers::base_client::{AuthScheme, HttpClient, decode_envelope, non_empty};
use crate::providers::{GenerationParams, LLMProvider, Prompt, Provider, check_request};
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicProvider {
    client: HttpClient,
}

impl AnthropicProvider {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, CortexError> {
        let mut extra_headers = HashMap::new();
        extra_headers.insert(
            "anthropic-version".to_string(),
            ANTHROPIC_VERSION.to_string(),
        );
        Ok(Self {
            client: HttpClient::new(
                base_url,
                api_key,
                AuthScheme::Header("x-api-key"),
                Some(extra_headers),
                timeout,
            )?,
        })
    }
}

fn build_payload(prompt: &Prompt, params: &GenerationParams) -> AnthropicRequest {
    AnthropicRequest {
        model: params.model.clone(),
        max_tokens: params.max_tokens,
        temperature: params.temperature,
        system: prompt.system.clone(),
        messages: vec![AnthropicMessage {
            role: "user",
            content: prompt.user.clone(),
        }],
    }
}

/// Concatenates the text blocks of a messages response.
pub fn extract_text(body: &str) -> Result<String, CortexError> {
    let parsed: AnthropicResponse = decode_envelope("anthropic", body)?;
    let text: String = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    non_empty("anthropic", Some(text))
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<String, CortexError> {
        check_request(prompt, params)?;
        let payload = build_payload(prompt, params);
        let body = self.client.post("messages", &payload).await?;
        extract_text(&body)
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ProviderErrorKind;

    #[test]
    fn system_instruction_goes_in_its_own_field() {
        let prompt = Prompt {
            system: "Respond with JSON".to_string(),
            user: "install nginx".to_string(),
        };
        let params = GenerationParams {
            model: "claude-3-5-haiku-latest".to_string(),
            temperature: 0.0,
            max_tokens: 512,
        };
        let payload = serde_json::to_value(build_payload(&prompt, &params)).unwrap();
        assert_eq!(payload["system"], "Respond with JSON");
        assert_eq!(payload["max_tokens"], 512);
        assert_eq!(payload["messages"].as_array().unwrap().len(), 1);
        assert_eq!(payload["messages"][0]["role"], "user");
    }

    #[test]
    fn joins_text_blocks() {
        let body = r#"{"content":[{"type":"text","text":"{\"commands\":"},{"type":"text","text":" []}"}]}"#;
        assert_eq!(extract_text(body).unwrap(), r#"{"commands": []}"#);
    }

    #[test]
    fn no_text_blocks_is_empty_response() {
        let err = extract_text(r#"{"content":[]}"#).unwrap_err();
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::EmptyResponse));
    }
}
