use crate::core::config::InterpreterConfig;
use crate::core::error::CortexError;
use crate::providers::Provider;
use crate::validator::ValidationPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

fn default_true() -> bool {
    true
}

#[derive(Default, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// A user-defined danger pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSettings {
    pub id: String,
    pub pattern: String,
}

/// Contents of `~/.cortex/config.yaml`. Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub active_provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub validation: ValidationPolicy,
    #[serde(default = "default_true")]
    pub lenient_parsing: bool,
    #[serde(default)]
    pub extra_patterns: Vec<PatternSettings>,
    #[serde(default)]
    pub providers: HashMap<Provider, ProviderSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_provider: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: None,
            validation: ValidationPolicy::default(),
            lenient_parsing: true,
            extra_patterns: Vec::new(),
            providers: HashMap::new(),
        }
    }
}

impl Settings {
    fn config_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join(".cortex").join("config.yaml")
    }

    pub fn load() -> Result<Settings, CortexError> {
        Self::load_from(&Self::config_path())
    }

    /// Reads `path`. A missing file yields the defaults, which are written back on a best
    /// effort basis.
    pub fn load_from(path: &Path) -> Result<Settings, CortexError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            if contents.trim().is_empty() {
                return Ok(Settings::default());
            }
            return serde_yml::from_str::<Settings>(&contents)
                .map_err(|e| CortexError::Settings(format!("Parse {}: {}", path.display(), e)));
        }

        let settings = Settings::default();
        if let Err(e) = settings.save_to(path) {
            debug!(path = %path.display(), error = %e, "Could not write default settings");
        }
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), CortexError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CortexError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(path, yaml_content)?;
        Ok(())
    }

    /// Validated interpreter configuration for the selected provider. Credentials come from
    /// the provider entry first, then from the provider's environment variable.
    pub fn interpreter_config(
        &self,
        provider_override: Option<Provider>,
        model_override: Option<&str>,
    ) -> Result<InterpreterConfig, CortexError> {
        self.interpreter_config_with(provider_override, model_override, |name| {
            env::var(name).ok()
        })
    }

    fn interpreter_config_with<F>(
        &self,
        provider_override: Option<Provider>,
        model_override: Option<&str>,
        lookup_env: F,
    ) -> Result<InterpreterConfig, CortexError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = provider_override
            .or(self.active_provider)
            .unwrap_or_default();
        let entry = self.providers.get(&provider).cloned().unwrap_or_default();

        let api_key = entry
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| lookup_env(provider.api_key_env()).filter(|key| !key.trim().is_empty()))
            .ok_or_else(|| {
                CortexError::Configuration(format!(
                    "No API key for {}: set providers.{}.api_key in {} or export {}",
                    provider,
                    provider,
                    Self::config_path().display(),
                    provider.api_key_env()
                ))
            })?;

        let mut builder = InterpreterConfig::builder(provider, api_key)
            .validation_policy(self.validation)
            .lenient_parsing(self.lenient_parsing);

        if let Some(model) = model_override.map(str::to_string).or(entry.model) {
            builder = builder.model(model);
        }
        if let Some(base_url) = entry.base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        for pattern in &self.extra_patterns {
            builder = builder.extra_rule(pattern.id.clone(), pattern.pattern.clone());
        }

        builder.build()
    }
}
