use std::fmt;
use std::io;
use thiserror::Error;

/// Why a provider call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection refused, DNS failure, broken transport
    Network,
    /// Credential rejected (401/403)
    AuthFailure,
    /// Provider asked us to slow down (429)
    RateLimited,
    /// No answer within the configured bound
    Timeout,
    /// The provider answered but with no text
    EmptyResponse,
    /// Any other non-success status
    BadStatus(u16),
    /// The body did not match the provider's envelope
    InvalidResponse,
}

impl ProviderErrorKind {
    /// Whether retrying the same request later could succeed. The interpreter never retries
    /// on its own; this is a hint for callers wrapping `parse` in their own backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderErrorKind::Network
            | ProviderErrorKind::RateLimited
            | ProviderErrorKind::Timeout => true,
            ProviderErrorKind::BadStatus(status) => *status >= 500,
            ProviderErrorKind::AuthFailure
            | ProviderErrorKind::EmptyResponse
            | ProviderErrorKind::InvalidResponse => false,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Network => write!(f, "network"),
            ProviderErrorKind::AuthFailure => write!(f, "authentication failure"),
            ProviderErrorKind::RateLimited => write!(f, "rate limited"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::EmptyResponse => write!(f, "empty response"),
            ProviderErrorKind::BadStatus(status) => write!(f, "status {}", status),
            ProviderErrorKind::InvalidResponse => write!(f, "invalid response"),
        }
    }
}

/// Unified error type for cortex
#[derive(Error, Debug)]
pub enum CortexError {
    /// Missing or invalid credential, unsupported provider, out-of-range parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// User input errors
    #[error("Input error: {0}")]
    Input(String),

    /// Transport or provider failure
    #[error("Provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    /// The model's answer did not follow the `{"commands": [...]}` contract
    #[error("Parse error: {0}")]
    Parse(String),

    /// A generated command matched a dangerous pattern under the reject policy
    #[error("Validation error: command `{command}` matched dangerous pattern `{rule}`")]
    Validation { command: String, rule: String },

    /// Settings file errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl CortexError {
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        CortexError::Provider {
            kind,
            message: message.into(),
        }
    }

    /// The provider failure kind, if this is a provider error.
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            CortexError::Provider { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CortexError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            CortexError::provider(ProviderErrorKind::Timeout, format!("Request timed out: {}", err))
        } else if err.is_connect() {
            CortexError::provider(ProviderErrorKind::Network, format!("Connection failed: {}", err))
        } else if err.is_decode() {
            CortexError::provider(
                ProviderErrorKind::InvalidResponse,
                format!("Failed to read response body: {}", err),
            )
        } else if let Some(status) = err.status() {
            CortexError::provider(ProviderErrorKind::BadStatus(status.as_u16()), err.to_string())
        } else {
            CortexError::provider(ProviderErrorKind::Network, format!("Request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for CortexError {
    fn from(err: serde_json::Error) -> Self {
        CortexError::Settings(format!("JSON error: {}", err))
    }
}

impl From<serde_yml::Error> for CortexError {
    fn from(err: serde_yml::Error) -> Self {
        CortexError::Settings(format!("YAML error: {}", err))
    }
}

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Prompt,
    Provider,
    Parse,
    Validate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Prompt => "prompt",
            Stage::Provider => "provider",
            Stage::Parse => "parse",
            Stage::Validate => "validate",
        };
        f.write_str(name)
    }
}

/// Error returned by `CommandInterpreter`: the component error, unchanged, plus the stage
/// that produced it.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct InterpretError {
    pub stage: Stage,
    pub source: CortexError,
}

impl InterpretError {
    pub fn new(stage: Stage, source: CortexError) -> Self {
        Self { stage, source }
    }

    pub fn error(&self) -> &CortexError {
        &self.source
    }

    pub fn into_inner(self) -> CortexError {
        self.source
    }
}

/// Attaches a stage to component results.
pub(crate) trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, InterpretError>;
}

impl<T> AtStage<T> for Result<T, CortexError> {
    fn at(self, stage: Stage) -> Result<T, InterpretError> {
        self.map_err(|source| InterpretError::new(stage, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ProviderErrorKind::Timeout.is_retryable());
        assert!(ProviderErrorKind::RateLimited.is_retryable());
        assert!(ProviderErrorKind::BadStatus(503).is_retryable());
        assert!(!ProviderErrorKind::BadStatus(400).is_retryable());
        assert!(!ProviderErrorKind::AuthFailure.is_retryable());
    }

    #[test]
    fn interpret_error_names_stage_and_cause() {
        let err = InterpretError::new(
            Stage::Validate,
            CortexError::Validation {
                command: "rm -rf /".to_string(),
                rule: "rm-recursive-root".to_string(),
            },
        );
        let text = err.to_string();
        assert!(text.starts_with("validate stage failed"));
        assert!(text.contains("rm -rf /"));
        assert!(text.contains("rm-recursive-root"));
    }

    #[test]
    fn at_stage_keeps_inner_error() {
        let result: Result<(), CortexError> = Err(CortexError::Parse("bad".to_string()));
        let err = result.at(Stage::Parse).unwrap_err();
        assert_eq!(err.stage, Stage::Parse);
        assert!(matches!(err.into_inner(), CortexError::Parse(msg) if msg == "bad"));
    }
}
