use crate::core::error::CortexError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod anthropic;
pub mod base_client;
pub mod factory;
pub mod gemini;
pub mod openai_compatible;

pub use factory::ProviderFactory;

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Gemini,
    OpenRouter,
    DeepSeek,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::Gemini,
        Provider::OpenRouter,
        Provider::DeepSeek,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::OpenRouter => "openrouter",
            Provider::DeepSeek => "deepseek",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Anthropic => "claude-3-5-haiku-latest",
            Provider::Gemini => "gemini-2.0-flash",
            Provider::OpenRouter => "openai/gpt-4o-mini",
            Provider::DeepSeek => "deepseek-chat",
        }
    }

    /// Environment variable the settings layer falls back to for this provider's key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::OpenAI
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = CortexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| CortexError::Configuration(format!("Unsupported provider: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Instruction text sent to a provider: the fixed system instruction plus the user's request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn messages(&self) -> Vec<Message> {
        vec![
            Message {
                role: Role::System,
                content: self.system.clone(),
            },
            Message {
                role: Role::User,
                content: self.user.clone(),
            },
        ]
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{}", self.system, self.user)
    }
}

/// Sampling parameters for one request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Rejects requests a provider must never see: empty prompt, temperature outside [0, 1],
/// zero max_tokens, empty model name.
pub fn check_request(prompt: &Prompt, params: &GenerationParams) -> Result<(), CortexError> {
    if prompt.user.trim().is_empty() {
        return Err(CortexError::Input("Prompt must not be empty".to_string()));
    }
    if !(0.0..=1.0).contains(&params.temperature) {
        return Err(CortexError::Configuration(format!(
            "Temperature must be within [0, 1], got {}",
            params.temperature
        )));
    }
    if params.max_tokens == 0 {
        return Err(CortexError::Configuration(
            "max_tokens must be positive".to_string(),
        ));
    }
    if params.model.trim().is_empty() {
        return Err(CortexError::Configuration(
            "Model name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// A model provider: send a prompt, get the completion text back verbatim.
///
/// Implementations make exactly one attempt per call and enforce their own timeout.
/// All built-in providers share a `reqwest::Client`, which is safe for concurrent use.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<String, CortexError>;
}
