//! Natural-language to shell command interpretation.
//!
//! A [`CommandInterpreter`] sends a request to a model provider, decodes the answer into an
//! ordered [`CommandList`] and screens every command against a set of destructive patterns.
//! Nothing here executes commands.

pub mod config;
pub mod core;
pub mod parser;
pub mod prompt;
pub mod providers;
pub mod stack;
pub mod system;
pub mod validator;

pub use crate::config::Settings;
pub use crate::core::config::{InterpreterConfig, InterpreterConfigBuilder};
pub use crate::core::error::{CortexError, InterpretError, ProviderErrorKind, Stage};
pub use crate::core::interpreter::{CommandInterpreter, Interpretation};
pub use crate::parser::{CommandList, Confidence, ResponseParser};
pub use crate::prompt::PromptBuilder;
pub use crate::providers::{GenerationParams, LLMProvider, Prompt, Provider};
pub use crate::stack::{Stack, StackCatalog};
pub use crate::system::SystemContext;
pub use crate::validator::{CommandValidator, DangerRule, ValidationOutcome, ValidationPolicy};
