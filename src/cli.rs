use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cortex::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShellKind {
    Bash,
    Zsh,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install a pre-built package stack
    Stack(StackArgs),
}

#[derive(clap::Args, Debug)]
pub struct StackArgs {
    /// Stack id, e.g. ml, webdev
    #[arg(required_unless_present = "list")]
    pub id: Option<String>,

    /// List the available stacks
    #[arg(long, conflicts_with = "id")]
    pub list: bool,

    /// Show the stack without asking the model for commands
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// What you want to do, in plain language
    pub query: Vec<String>,

    /// Model provider [openai, anthropic, gemini, openrouter, deepseek]
    #[arg(short, long)]
    pub provider: Option<Provider>,

    /// Model to use (provider-specific)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Skip the dangerous-command check
    #[arg(long)]
    pub no_validate: bool,

    /// Fail instead of dropping commands that match a dangerous pattern
    #[arg(long, conflicts_with = "no_validate")]
    pub reject: bool,

    /// Do not send OS and shell details to the model
    #[arg(long)]
    pub no_context: bool,

    /// Print the commands as one line joined with `&&`, for shell key bindings
    #[arg(long, conflicts_with = "json")]
    pub suggest: bool,

    /// Print the commands as {"commands": [...]}
    #[arg(long)]
    pub json: bool,

    /// Print the line-editor integration script for a shell
    #[arg(long, value_enum, value_name = "SHELL")]
    pub init: Option<ShellKind>,

    /// More diagnostics on stderr (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Query words joined back together, if any were given.
    pub fn query_text(&self) -> Option<String> {
        let query = self.query.join(" ");
        let query = query.trim();
        (!query.is_empty()).then(|| query.to_string())
    }
}
