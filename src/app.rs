use crate::cli::{Args, ShellKind, StackArgs};
use crate::display;
use cortex::{
    CommandInterpreter, CommandList, CortexError, Interpretation, InterpretError, Settings, Stack,
    StackCatalog, Stage, SystemContext, ValidationPolicy,
};
use is_terminal::IsTerminal;
use std::io::{self, Read};
use tracing::info;

const BASH_INIT: &str = include_str!("../shell/cortex.bash");
const ZSH_INIT: &str = include_str!("../shell/cortex.zsh");

pub fn init_script(shell: ShellKind) -> &'static str {
    match shell {
        ShellKind::Bash => BASH_INIT,
        ShellKind::Zsh => ZSH_INIT,
    }
}

pub struct Application {
    pub args: Args,
    pub interpreter: CommandInterpreter,
}

impl Application {
    pub fn new(args: Args, settings: &Settings) -> Result<Self, InterpretError> {
        let mut settings = settings.clone();
        if args.reject {
            settings.validation = ValidationPolicy::Reject;
        }

        let config = settings
            .interpreter_config(args.provider, args.model.as_deref())
            .map_err(|e| InterpretError::new(Stage::Setup, e))?;
        let interpreter = CommandInterpreter::new(config)?;

        Ok(Self { args, interpreter })
    }

    /// Interprets `request`, or the command-line query and piped input when it is `None`.
    pub async fn run(&self, request: Option<String>) -> Result<(), InterpretError> {
        let query = match request {
            Some(request) => request,
            None => {
                let piped =
                    read_piped_stdin().map_err(|e| InterpretError::new(Stage::Prompt, e))?;
                compose_query(self.args.query_text(), piped).ok_or_else(|| {
                    InterpretError::new(
                        Stage::Prompt,
                        CortexError::Input("Tell cortex what you want to do".to_string()),
                    )
                })?
            }
        };

        let context = if self.args.no_context {
            None
        } else {
            Some(SystemContext::detect())
        };
        let validate = !self.args.no_validate;
        if !validate {
            info!("Dangerous-command check disabled for this run");
        }

        let result = self
            .interpreter
            .interpret(&query, context.as_ref(), validate)
            .await?;
        self.render(&result)
    }

    fn render(&self, result: &Interpretation) -> Result<(), InterpretError> {
        let validator = self.interpreter.validator();

        if self.args.suggest {
            display::display_dropped(&result.dropped, validator);
            let line = suggestion(&result.commands)
                .map_err(|e| InterpretError::new(Stage::Validate, e))?;
            if let Some(line) = line {
                println!("{}", line);
            }
        } else if self.args.json {
            println!("{}", result.commands.to_json());
            display::display_dropped(&result.dropped, validator);
        } else {
            display::display_commands(&result.commands);
            display::display_dropped(&result.dropped, validator);
            if !result.commands.is_empty() {
                display::success(&format!(
                    "{} command(s) from {} ({}). Nothing was executed.",
                    result.commands.len(),
                    self.interpreter.provider(),
                    self.interpreter.model()
                ));
            }
        }
        Ok(())
    }
}

/// The one line `--suggest` prints: non-blank commands, trimmed and joined with `&&`.
/// A command spanning several lines cannot be placed on the edit line and is refused.
fn suggestion(commands: &CommandList) -> Result<Option<String>, CortexError> {
    let parts: Vec<&str> = commands
        .iter()
        .map(|command| command.trim())
        .filter(|command| !command.is_empty())
        .collect();

    if let Some(multi) = parts.iter().find(|command| command.contains(['\n', '\r'])) {
        let first = multi.lines().next().unwrap_or_default();
        return Err(CortexError::Input(format!(
            "`{} ...` spans several lines and cannot be suggested on one line; run without --suggest to see it",
            first
        )));
    }
    Ok((!parts.is_empty()).then(|| parts.join(" && ")))
}

/// Handles `cortex stack`. Returns the request to interpret, or `None` when listing or
/// previewing is all that was asked for.
pub fn prepare_stack(
    args: &StackArgs,
    catalog: &StackCatalog,
    has_gpu: bool,
    machine_output: bool,
) -> Result<Option<String>, CortexError> {
    if args.list {
        display::display_stacks(catalog.list());
        return Ok(None);
    }

    let id = args
        .id
        .as_deref()
        .ok_or_else(|| CortexError::Input("Name a stack, or pass --list".to_string()))?;
    let stack = resolve_stack(id, catalog, has_gpu)?;

    if args.dry_run {
        display::display_stack(stack);
        display::info("Dry run: no commands were generated");
        return Ok(None);
    }
    if !machine_output {
        display::display_stack(stack);
    }
    Ok(Some(stack.request()))
}

/// The stack to use for `id` on this machine.
fn resolve_stack<'a>(
    id: &str,
    catalog: &'a StackCatalog,
    has_gpu: bool,
) -> Result<&'a Stack, CortexError> {
    let chosen = catalog.suggest(id, has_gpu);
    if chosen != id {
        info!(requested = id, chosen = %chosen, "No NVIDIA GPU detected");
        display::info(&format!("No NVIDIA GPU detected, using '{}' instead of '{}'", chosen, id));
    }
    catalog.find(&chosen).ok_or_else(|| {
        CortexError::Input(format!(
            "Unknown stack '{}'; see `cortex stack --list`",
            id
        ))
    })
}

fn read_piped_stdin() -> Result<Option<String>, CortexError> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok((!buffer.trim().is_empty()).then_some(buffer))
}

/// Merges the command-line request with piped input.
fn compose_query(query: Option<String>, piped: Option<String>) -> Option<String> {
    match (query, piped) {
        (Some(query), Some(piped)) => Some(format!("<pipe>{}</pipe>\n\n{}", piped.trim(), query)),
        (None, Some(piped)) => Some(format!("<pipe>{}</pipe>", piped.trim())),
        (Some(query), None) => Some(query),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piped_input_is_wrapped() {
        assert_eq!(
            compose_query(Some("explain".into()), Some("error: disk full\n".into())).as_deref(),
            Some("<pipe>error: disk full</pipe>\n\nexplain")
        );
        assert_eq!(
            compose_query(None, Some("list".into())).as_deref(),
            Some("<pipe>list</pipe>")
        );
        assert_eq!(
            compose_query(Some("uptime".into()), None).as_deref(),
            Some("uptime")
        );
        assert_eq!(compose_query(None, None), None);
    }

    #[test]
    fn init_scripts_bind_ctrl_g_to_suggest() {
        let bash = init_script(ShellKind::Bash);
        assert!(bash.contains(r#""\C-g""#));
        assert!(bash.contains("cortex --suggest"));

        let zsh = init_script(ShellKind::Zsh);
        assert!(zsh.contains("bindkey '^G'"));
        assert!(zsh.contains("cortex --suggest"));
    }

    fn commands(commands: &[&str]) -> CommandList {
        CommandList::new(commands.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn suggestion_joins_trimmed_commands() {
        let line = suggestion(&commands(&["  sudo apt update ", "", "sudo apt install -y nginx"]))
            .unwrap();
        assert_eq!(
            line.as_deref(),
            Some("sudo apt update && sudo apt install -y nginx")
        );
        assert_eq!(suggestion(&commands(&[])).unwrap(), None);
        assert_eq!(suggestion(&commands(&["  ", ""])).unwrap(), None);
    }

    #[test]
    fn multi_line_commands_are_not_suggested() {
        let err = suggestion(&commands(&[
            "mkdir -p ~/app",
            "cat <<EOF > ~/app/.env\nPORT=8080\nEOF",
        ]))
        .unwrap_err();
        assert!(matches!(err, CortexError::Input(_)));
        let message = err.to_string();
        assert!(message.contains("cat <<EOF > ~/app/.env"));
        assert!(!message.contains('\n'));
    }

    fn stack_args(id: Option<&str>, list: bool, dry_run: bool) -> StackArgs {
        StackArgs {
            id: id.map(str::to_string),
            list,
            dry_run,
        }
    }

    #[test]
    fn stack_request_lists_its_packages() {
        let catalog = StackCatalog::builtin().unwrap();
        let request = prepare_stack(&stack_args(Some("webdev"), false, false), &catalog, false, true)
            .unwrap()
            .unwrap();
        assert!(request.contains("nginx"));
        assert!(request.contains("postgresql"));
    }

    #[test]
    fn ml_stack_without_gpu_uses_cpu_packages() {
        let catalog = StackCatalog::builtin().unwrap();
        let request = prepare_stack(&stack_args(Some("ml"), false, false), &catalog, false, true)
            .unwrap()
            .unwrap();
        assert!(!request.contains("nvidia-cuda-toolkit"));
        assert!(request.contains("scikit-learn"));
    }

    #[test]
    fn dry_run_and_list_need_no_model() {
        let catalog = StackCatalog::builtin().unwrap();
        assert_eq!(
            prepare_stack(&stack_args(Some("webdev"), false, true), &catalog, false, false).unwrap(),
            None
        );
        assert_eq!(
            prepare_stack(&stack_args(None, true, false), &catalog, false, false).unwrap(),
            None
        );
    }

    #[test]
    fn unknown_stack_is_an_input_error() {
        let catalog = StackCatalog::builtin().unwrap();
        let err = prepare_stack(&stack_args(Some("cobol"), false, false), &catalog, true, true)
            .unwrap_err();
        assert!(matches!(err, CortexError::Input(_)));
        assert!(err.to_string().contains("cobol"));
    }
}
