use crate::core::error::CortexError;
use crate::providers::Provider;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;

pub use crate::validator::ValidationPolicy;

pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything one `CommandInterpreter` needs. Built once through [`InterpreterConfigBuilder`]
/// and never mutated afterwards.
pub struct InterpreterConfig {
    pub(crate) api_key: SecretString,
    pub(crate) provider: Provider,
    pub(crate) model: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
    pub(crate) base_url: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) policy: ValidationPolicy,
    pub(crate) lenient_parsing: bool,
    pub(crate) extra_rules: Vec<(String, String)>,
}

impl InterpreterConfig {
    pub fn builder(provider: Provider, api_key: impl Into<String>) -> InterpreterConfigBuilder {
        InterpreterConfigBuilder {
            api_key: SecretString::from(api_key.into()),
            provider,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            policy: ValidationPolicy::default(),
            lenient_parsing: true,
            extra_rules: Vec::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        self.policy
    }
}

impl fmt::Debug for InterpreterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpreterConfig")
            .field("api_key", &"[REDACTED]")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .field("lenient_parsing", &self.lenient_parsing)
            .field("extra_rules", &self.extra_rules)
            .finish()
    }
}

pub struct InterpreterConfigBuilder {
    api_key: SecretString,
    provider: Provider,
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
    base_url: Option<String>,
    timeout: Duration,
    policy: ValidationPolicy,
    lenient_parsing: bool,
    extra_rules: Vec<(String, String)>,
}

impl InterpreterConfigBuilder {
    /// Provider-specific default when unset.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validation_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn lenient_parsing(mut self, lenient: bool) -> Self {
        self.lenient_parsing = lenient;
        self
    }

    pub fn extra_rule(mut self, id: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.extra_rules.push((id.into(), pattern.into()));
        self
    }

    pub fn build(self) -> Result<InterpreterConfig, CortexError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(CortexError::Configuration(format!(
                "Missing API key for {}",
                self.provider
            )));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(CortexError::Configuration(format!(
                "Temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(CortexError::Configuration(
                "max_tokens must be positive".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(CortexError::Configuration(
                "Timeout must be non-zero".to_string(),
            ));
        }

        let model = match self.model {
            Some(model) if model.trim().is_empty() => {
                return Err(CortexError::Configuration(
                    "Model name must not be empty".to_string(),
                ));
            }
            Some(model) => model.trim().to_string(),
            None => self.provider.default_model().to_string(),
        };

        Ok(InterpreterConfig {
            api_key: self.api_key,
            provider: self.provider,
            model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            base_url: self.base_url.filter(|url| !url.trim().is_empty()),
            timeout: self.timeout,
            policy: self.policy,
            lenient_parsing: self.lenient_parsing,
            extra_rules: self.extra_rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_provider() {
        let config = InterpreterConfig::builder(Provider::Anthropic, "sk-ant-secret")
            .build()
            .unwrap();
        assert_eq!(config.model(), Provider::Anthropic.default_model());
        assert_eq!(config.temperature(), DEFAULT_TEMPERATURE);
        assert_eq!(config.max_tokens(), DEFAULT_MAX_TOKENS);
        assert_eq!(config.validation_policy(), ValidationPolicy::Drop);
    }

    #[test]
    fn explicit_model_wins() {
        let config = InterpreterConfig::builder(Provider::OpenAI, "sk")
            .model("gpt-4.1")
            .build()
            .unwrap();
        assert_eq!(config.model(), "gpt-4.1");
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let err = InterpreterConfig::builder(Provider::OpenAI, "  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, CortexError::Configuration(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for builder in [
            InterpreterConfig::builder(Provider::OpenAI, "sk").temperature(-0.1),
            InterpreterConfig::builder(Provider::OpenAI, "sk").temperature(1.01),
            InterpreterConfig::builder(Provider::OpenAI, "sk").max_tokens(0),
            InterpreterConfig::builder(Provider::OpenAI, "sk").timeout(Duration::ZERO),
            InterpreterConfig::builder(Provider::OpenAI, "sk").model(" "),
        ] {
            assert!(matches!(builder.build(), Err(CortexError::Configuration(_))));
        }
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let config = InterpreterConfig::builder(Provider::Gemini, "super-secret-key")
            .build()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn error_for_bad_config_never_echoes_the_key() {
        let err = InterpreterConfig::builder(Provider::Gemini, "super-secret-key")
            .temperature(3.0)
            .build()
            .unwrap_err();
        assert!(!err.to_string().contains("super-secret-key"));
    }
}
