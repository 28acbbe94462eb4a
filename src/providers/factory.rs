use crate::core::error::CortexError;
use crate::providers::{
    LLMProvider, Provider, anthropic::AnthropicProvider, gemini::GeminiProvider,
    openai_compatible::OpenAICompatibleProvider,
};
use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;

/// Connection settings for one provider adapter
pub struct ProviderSpec {
    pub provider: Provider,
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

/// Builds the adapter for a provider. The set is closed: every `Provider` variant maps to
/// exactly one adapter.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(spec: ProviderSpec) -> Result<Box<dyn LLMProvider>, CortexError> {
        let ProviderSpec {
            provider,
            api_key,
            base_url,
            timeout,
        } = spec;
        let base_url = base_url.unwrap_or_else(|| provider.default_base_url().to_string());

        let adapter: Box<dyn LLMProvider> = match provider {
            Provider::OpenAI | Provider::DeepSeek => Box::new(OpenAICompatibleProvider::new(
                provider, base_url, api_key, None, timeout,
            )?),
            Provider::OpenRouter => {
                let mut headers = HashMap::new();
                headers.insert("X-Title".to_string(), "cortex".to_string());
                // Routed models do not all honour JSON mode; the prompt carries the contract.
                Box::new(
                    OpenAICompatibleProvider::new(
                        provider,
                        base_url,
                        api_key,
                        Some(headers),
                        timeout,
                    )?
                    .without_json_mode(),
                )
            }
            Provider::Anthropic => Box::new(AnthropicProvider::new(base_url, api_key, timeout)?),
            Provider::Gemini => Box::new(GeminiProvider::new(base_url, api_key, timeout)?),
        };
        Ok(adapter)
    }
}
