use crate::core::error::CortexError;
use crate::providers::{GenerationParams, LLMProvider, Prompt, Provider, check_request};
use async_trait::async_trait;
use secrecy::SecretString;
use std::time::Duration;

mod client;
mod types;

pub use client::{GeminiClient, extract_text};

#[derive(Clone)]
pub struct GeminiProvider {
    client: GeminiClient,
}

impl GeminiProvider {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, CortexError> {
        Ok(Self {
            client: GeminiClient::new(base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<String, CortexError> {
        check_request(prompt, params)?;
        self.client.generate_content(prompt, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::client::build_payload;
    use super::*;
    use crate::core::error::ProviderErrorKind;

    #[test]
    fn payload_uses_camel_case_generation_config() {
        let prompt = Prompt {
            system: "Respond with JSON".to_string(),
            user: "install nginx".to_string(),
        };
        let params = GenerationParams {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.2,
            max_tokens: 800,
        };
        let payload = serde_json::to_value(build_payload(&prompt, &params)).unwrap();
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 800);
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            payload["systemInstruction"]["parts"][0]["text"],
            "Respond with JSON"
        );
        assert_eq!(payload["contents"][0]["role"], "user");
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "install nginx");
    }

    #[test]
    fn extracts_candidate_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"commands\": [\"uname -a\"]}"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), r#"{"commands": ["uname -a"]}"#);
    }

    #[test]
    fn blocked_candidate_is_empty_response() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let err = extract_text(body).unwrap_err();
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::EmptyResponse));

        let err = extract_text(r#"{"promptFeedback":{}}"#).unwrap_err();
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::EmptyResponse));
    }
}
