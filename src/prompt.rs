//! Builds the instruction text sent to a provider.
//!
//! The instruction fixes the answer shape to `{"commands": ["...", ...]}`; the response parser
//! depends on exactly that contract.

use crate::providers::Prompt;
use crate::system::SystemContext;

const SYSTEM_PROMPT: &str = "You are a Linux system administration assistant. Convert the \
user's request into the shell commands needed to carry it out on a POSIX shell.

Rules:
- Respond with a single JSON object and nothing else: {\"commands\": [\"command1\", \"command2\"]}
- List the commands in the exact order they must run.
- Each array element is one complete, runnable command. No comments, no explanations, no markdown.
- Use sudo where root privileges are required and non-interactive flags (for example -y) where \
a package manager would prompt.
- Never emit destructive commands such as recursive removal of system paths, filesystem \
formatting or raw writes to block devices.
- If the request needs no commands, respond with {\"commands\": []}.";

/// Deterministic prompt construction: the same request and context always give the same text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        PromptBuilder
    }

    /// Prompt without any host information; the model falls back to generic commands.
    pub fn build(&self, user_input: &str) -> Prompt {
        self.compose(user_input, None)
    }

    /// Prompt that embeds every context entry so the model can pick package names and
    /// paths for the target system. An empty context is the same as no context.
    pub fn build_with_context(&self, user_input: &str, context: &SystemContext) -> Prompt {
        self.compose(user_input, Some(context))
    }

    fn compose(&self, user_input: &str, context: Option<&SystemContext>) -> Prompt {
        let mut system = SYSTEM_PROMPT.to_string();

        if let Some(context) = context.filter(|c| !c.is_empty()) {
            system.push_str("\n\nTarget system:");
            for (key, value) in context.iter() {
                system.push_str(&format!("\n- {}: {}", key, value));
            }
            system.push_str(
                "\nTailor package names, package managers and file paths to this system.",
            );
        }

        Prompt {
            system,
            user: user_input.trim().to_string(),
        }
    }
}
