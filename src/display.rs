use crate::utils::text::{display_width, pad_to, wrap_text};
use console::style;
use cortex::{CommandList, CommandValidator, Confidence, Stack, ValidationOutcome};

const TITLE: &str = "─ commands ";

fn box_width() -> usize {
    let term = console::Term::stdout();
    let terminal_width = term.size().1 as usize;
    std::cmp::min(terminal_width.saturating_sub(4), 100).max(50)
}

/// Unstyled lines of the numbered command box, `width` columns wide.
pub fn command_box(commands: &CommandList, width: usize) -> Vec<String> {
    let inner = width.saturating_sub(4);
    let number_width = commands.len().to_string().len();
    // "<n>. $ "
    let prefix_width = number_width + 4;

    let mut lines = Vec::new();
    lines.push(format!(
        "┌{}{}┐",
        TITLE,
        "─".repeat(width.saturating_sub(2 + display_width(TITLE)))
    ));

    let visible = commands
        .iter()
        .map(|command| command.trim())
        .filter(|command| !command.is_empty());
    for (index, command) in visible.enumerate() {
        let wrapped = wrap_text(command, inner.saturating_sub(prefix_width));
        for (i, part) in wrapped.iter().enumerate() {
            let prefix = if i == 0 {
                format!("{:>number_width$}. $ ", index + 1)
            } else {
                " ".repeat(prefix_width)
            };
            lines.push(format!("│ {} │", pad_to(&(prefix + part), inner)));
        }
    }

    lines.push(format!("└{}┘", "─".repeat(width.saturating_sub(2))));
    lines
}

/// Prints the surviving commands in a numbered box.
pub fn display_commands(commands: &CommandList) {
    if commands.iter().all(|command| command.trim().is_empty()) {
        info("No commands are needed for this request");
        return;
    }

    println!();
    for line in command_box(commands, box_width()) {
        if line.starts_with('│') {
            println!("{}", style(line).bold().white());
        } else {
            println!("{}", style(line).dim().green());
        }
    }

    if commands.confidence() == Confidence::Fallback {
        warning("The model did not answer in the expected format; review these commands carefully");
    }
}

/// One warning per command the validator removed.
pub fn display_dropped(dropped: &[ValidationOutcome], validator: &CommandValidator) {
    for outcome in dropped {
        let rule = outcome.rule.as_deref().unwrap_or("unknown");
        let reason = validator.describe(rule).unwrap_or(rule);
        warning(&format!(
            "Dropped `{}` ({}: {})",
            outcome.command, rule, reason
        ));
    }
}

/// Unstyled rows for `cortex stack --list`: id, hardware and name in aligned columns.
pub fn stack_table(stacks: &[Stack]) -> Vec<String> {
    let id_width = stacks
        .iter()
        .map(|stack| display_width(&stack.id))
        .chain(std::iter::once(display_width("ID")))
        .max()
        .unwrap_or(0);
    let hardware_width = stacks
        .iter()
        .map(|stack| display_width(&stack.hardware))
        .chain(std::iter::once(display_width("HARDWARE")))
        .max()
        .unwrap_or(0);

    std::iter::once(("ID", "HARDWARE", "NAME"))
        .chain(
            stacks
                .iter()
                .map(|s| (s.id.as_str(), s.hardware.as_str(), s.name.as_str())),
        )
        .map(|(id, hardware, name)| {
            format!(
                "{}  {}  {}",
                pad_to(id, id_width),
                pad_to(hardware, hardware_width),
                name
            )
        })
        .collect()
}

pub fn display_stacks(stacks: &[Stack]) {
    if stacks.is_empty() {
        info("No stacks are defined");
        return;
    }
    for (i, row) in stack_table(stacks).into_iter().enumerate() {
        if i == 0 {
            println!("{}", style(row).bold());
        } else {
            println!("{}", row);
        }
    }
}

pub fn display_stack(stack: &Stack) {
    println!();
    println!("{} {}", style("📦").bold(), stack.describe().trim_end());
}

pub fn success(message: &str) {
    println!("{} {}", style("✓").bold().green(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").bold().red(), style(message).red());
}

pub fn warning(message: &str) {
    eprintln!("{} {}", style("⚠").bold().yellow(), style(message).yellow());
}

pub fn info(message: &str) {
    eprintln!("{} {}", style("ℹ").bold().blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(commands: &[&str]) -> CommandList {
        CommandList::new(commands.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn every_line_has_the_box_width() {
        let lines = command_box(&list(&["sudo apt update", "sudo apt install -y nginx"]), 50);
        assert!(lines.iter().all(|line| display_width(line) == 50));
        assert!(lines.first().is_some_and(|l| l.starts_with("┌─ commands")));
        assert!(lines.last().is_some_and(|l| l.starts_with('└')));
    }

    #[test]
    fn commands_are_numbered_in_order() {
        let lines = command_box(&list(&["sudo apt update", "sudo systemctl start nginx"]), 60);
        assert!(lines[1].contains("1. $ sudo apt update"));
        assert!(lines[2].contains("2. $ sudo systemctl start nginx"));
    }

    #[test]
    fn blank_commands_are_not_shown() {
        let lines = command_box(&list(&["  echo a  ", "", "   ", "ls"]), 50);
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("1. $ echo a "));
        assert!(lines[2].contains("2. $ ls"));
    }

    #[test]
    fn long_commands_wrap_inside_the_box() {
        let long = "docker run --rm -it -v /srv/data:/data -p 8080:80 --name web nginx:latest";
        let lines = command_box(&list(&[long]), 50);
        assert!(lines.len() > 3);
        assert!(lines.iter().all(|line| display_width(line) == 50));
        assert!(lines[2].starts_with("│      "));
    }

    #[test]
    fn stack_table_aligns_columns() {
        let stacks = cortex::StackCatalog::from_json(
            r#"{"stacks": [
                {"id": "ml", "name": "Machine Learning", "hardware": "gpu"},
                {"id": "webdev", "name": "Web Development"}
            ]}"#,
        )
        .unwrap();
        let rows = stack_table(stacks.list());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], "ID      HARDWARE  NAME");
        assert_eq!(rows[1], "ml      gpu       Machine Learning");
        assert_eq!(rows[2], "webdev  any       Web Development");
    }
}
