use crate::core::error::CortexError;
use crate::providers::base_client::{AuthScheme, HttpClient, decode_envelope, non_empty};
use crate::providers::gemini::types::*;
use crate::providers::{GenerationParams, Prompt};
use secrecy::SecretString;
use std::time::Duration;

#[derive(Clone)]
pub struct GeminiClient {
    client: HttpClient,
}

impl GeminiClient {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, CortexError> {
        // Header auth rather than the `?key=` query parameter keeps the key out of URLs.
        let client = HttpClient::new(
            base_url,
            api_key,
            AuthScheme::Header("x-goog-api-key"),
            None,
            timeout,
        )?;
        Ok(Self { client })
    }

    pub async fn generate_content(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<String, CortexError> {
        let payload = build_payload(prompt, params);
        let body = self
            .client
            .post(
                &format!("v1beta/models/{}:generateContent", params.model),
                &payload,
            )
            .await?;
        extract_text(&body)
    }
}

pub(super) fn build_payload(prompt: &Prompt, params: &GenerationParams) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: prompt.user.clone(),
            }],
        }],
        system_instruction: GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: prompt.system.clone(),
            }],
        },
        generation_config: GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
            response_mime_type: "application/json",
        },
    }
}

/// Joins the text parts of the first candidate.
pub fn extract_text(body: &str) -> Result<String, CortexError> {
    let parsed: GeminiResponse = decode_envelope("gemini", body)?;
    let text = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<String>()
        });
    non_empty("gemini", text)
}
