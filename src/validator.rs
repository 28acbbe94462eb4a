//! Safety gate for generated commands.
//!
//! Every command is matched, case-insensitively and including its arguments, against a set of
//! destructive patterns. Under [`ValidationPolicy::Drop`] matching commands are removed and
//! the rest keep their order; under [`ValidationPolicy::Reject`] the first match fails the
//! whole call.

use crate::core::error::CortexError;
use crate::parser::CommandList;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::warn;

/// Top-level paths whose recursive removal or re-permissioning wrecks a system.
const SYSTEM_DIRS: &str =
    r"bin|boot|dev|etc|home|lib|lib32|lib64|opt|proc|root|sbin|srv|sys|usr|var";

/// Raw disk devices (not partitions of pseudo devices like /dev/null).
const BLOCK_DEVICE: &str =
    r"/dev/(?:sd[a-z]|hd[a-z]|vd[a-z]|xvd[a-z]|nvme\d+n\d+|mmcblk\d+|disk\d+|md\d+|dm-\d+|mapper/)";

/// Target terminator: whitespace, command separator or end of string.
const END: &str = r"(?:\s|;|&|\||$)";

/// Any run of arguments, staying inside one simple command.
const ARGS: &str = r"(?:[^;&|\n]*\s)?";
const RECURSIVE_FLAG: &str = r"(?:-[a-z]*r[a-z]*|--recursive)";

/// A whole-tree target, optionally quoted: `/`, `//`, `/.`, `/*`, `~`, `~/*`, `$HOME` or a
/// top-level system directory.
fn tree_target() -> String {
    r#"["']?(?:/+(?:\.{1,2}/*)*\*?|/+(?:DIRS)/*\*?|~/?\*?|\$home/?\*?|\$\{home\}/?\*?)["']?"#
        .replace("DIRS", SYSTEM_DIRS)
}

static BUILTIN_RULES: LazyLock<Vec<DangerRule>> = LazyLock::new(|| {
    let target = tree_target();
    let rm_root = format!(
        r"\brm\s{args}{rec}\s{args}{target}{end}|\brm\s{args}{target}\s{args}{rec}{end}",
        args = ARGS,
        rec = RECURSIVE_FLAG,
        target = target,
        end = END,
    );
    let perm_root = format!(
        r"\bch(?:mod|own|grp)\s{args}{rec}\s{args}{target}{end}",
        args = ARGS,
        rec = RECURSIVE_FLAG,
        target = target,
        end = END,
    );

    [
        (
            "rm-recursive-root",
            "recursive removal of the root filesystem or a top-level system path",
            rm_root,
        ),
        (
            "filesystem-format",
            "creates or wipes a filesystem",
            r"\b(?:mkfs(?:\.[a-z0-9]+)?|mke2fs|mkswap|wipefs)\b".to_string(),
        ),
        (
            "dd-block-device",
            "dd writing directly to a disk device",
            format!(r#"\bdd\b[^;&|]*\bof=\s*["']?{}"#, BLOCK_DEVICE),
        ),
        (
            "redirect-block-device",
            "shell redirect into a disk device",
            format!(r#">\s*["']?{}"#, BLOCK_DEVICE),
        ),
        (
            "fork-bomb",
            "shell function that pipes into and backgrounds itself",
            r"\(\)\s*\{[^}]*\|[^}]*&[^}]*\}".to_string(),
        ),
        (
            "unbounded-self-spawn",
            "process replication with no bound",
            r"\bfork\s+while\s+fork\b|\$0\s*\|\s*\$0\s*&|\bwhile\s+(?:true|:|1)\s*;\s*do\b[^;]*&\s*;?\s*done\b"
                .to_string(),
        ),
        (
            "recursive-permission-root",
            "recursive chmod/chown of the root filesystem or a system path",
            perm_root,
        ),
    ]
    .into_iter()
    .map(|(id, description, pattern)| {
        DangerRule::new(id, description, &pattern).expect("built-in danger pattern compiles")
    })
    .collect()
});

/// Identifiers of the built-in rules, in evaluation order.
pub fn builtin_rule_ids() -> Vec<&'static str> {
    BUILTIN_RULES.iter().map(DangerRule::id).collect()
}

/// What to do with a command that matches a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Remove the command and keep the rest
    #[default]
    Drop,
    /// Fail the whole call with a validation error
    Reject,
}

#[derive(Debug, Clone)]
pub struct DangerRule {
    id: String,
    description: String,
    pattern: Regex,
}

impl DangerRule {
    pub fn new(id: &str, description: &str, pattern: &str) -> Result<Self, CortexError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                CortexError::Configuration(format!("Invalid pattern for rule {}: {}", id, e))
            })?;
        Ok(Self {
            id: id.to_string(),
            description: description.to_string(),
            pattern,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn matches(&self, command: &str) -> bool {
        self.pattern.is_match(command)
    }
}

/// Verdict for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub command: String,
    pub allowed: bool,
    /// Id of the first matching rule when disallowed
    pub rule: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandValidator {
    rules: Vec<DangerRule>,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandValidator {
    /// Validator with the built-in rule set.
    pub fn new() -> Self {
        Self {
            rules: BUILTIN_RULES.clone(),
        }
    }

    /// Built-in rules followed by `extra` `(id, pattern)` pairs.
    pub fn with_extra_rules<'a, I>(extra: I) -> Result<Self, CortexError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut validator = Self::new();
        for (id, pattern) in extra {
            if id.trim().is_empty() {
                return Err(CortexError::Configuration(
                    "Danger rule id must not be empty".to_string(),
                ));
            }
            validator
                .rules
                .push(DangerRule::new(id, "user-defined pattern", pattern)?);
        }
        Ok(validator)
    }

    pub fn rules(&self) -> &[DangerRule] {
        &self.rules
    }

    pub fn describe(&self, rule_id: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.id == rule_id)
            .map(DangerRule::description)
    }

    pub fn check(&self, command: &str) -> ValidationOutcome {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.matches(command))
            .map(|rule| rule.id.clone());
        ValidationOutcome {
            command: command.to_string(),
            allowed: rule.is_none(),
            rule,
        }
    }

    /// One outcome per command, in list order.
    pub fn assess(&self, commands: &CommandList) -> Vec<ValidationOutcome> {
        commands.iter().map(|command| self.check(command)).collect()
    }

    /// Applies `policy` to `commands`. Returns the surviving commands, still in order, and the
    /// outcomes of every dropped command.
    pub fn apply(
        &self,
        commands: CommandList,
        policy: ValidationPolicy,
    ) -> Result<(CommandList, Vec<ValidationOutcome>), CortexError> {
        let outcomes = self.assess(&commands);

        if policy == ValidationPolicy::Reject {
            if let Some(blocked) = outcomes.iter().find(|o| !o.allowed) {
                return Err(CortexError::Validation {
                    command: blocked.command.clone(),
                    rule: blocked.rule.clone().unwrap_or_default(),
                });
            }
        }

        let mut kept = Vec::with_capacity(outcomes.len());
        let mut dropped = Vec::new();
        for outcome in outcomes {
            if outcome.allowed {
                kept.push(outcome.command);
            } else {
                warn!(
                    command = %outcome.command,
                    rule = outcome.rule.as_deref().unwrap_or_default(),
                    "Dropping dangerous command"
                );
                dropped.push(outcome);
            }
        }

        Ok((commands.with_commands(kept), dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_for(command: &str) -> Option<String> {
        CommandValidator::new().check(command).rule
    }

    fn list(commands: &[&str]) -> CommandList {
        CommandList::new(commands.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn builtin_ids_are_unique_and_ordered() {
        let ids = builtin_rule_ids();
        assert_eq!(
            ids,
            [
                "rm-recursive-root",
                "filesystem-format",
                "dd-block-device",
                "redirect-block-device",
                "fork-bomb",
                "unbounded-self-spawn",
                "recursive-permission-root",
            ]
        );
        let validator = CommandValidator::new();
        let in_validator: Vec<&str> = validator.rules().iter().map(DangerRule::id).collect();
        assert_eq!(in_validator, ids);
    }

    #[test]
    fn recursive_root_removal_is_caught() {
        for command in [
            "rm -rf /",
            "sudo rm -rf /",
            "rm -fr /*",
            "rm -r -f /",
            "rm -f -r /",
            "RM -RF /",
            "rm --recursive --force /",
            "rm -rf --no-preserve-root /",
            "rm -rf ~",
            "rm -rf $HOME",
            "rm -rf /etc",
            "rm -rf /usr/",
            "ls; rm -rf / ; echo done",
            "/bin/rm -Rf /var",
            "rm -rf /tmp/x /",
            "rm -rf \"/\"",
            "rm -rf '/'",
            "rm -rf //",
            "rm -rf /.",
            "rm -rf ~/*",
            "rm -rf '/etc'",
            "rm -rf /tmp/a /home",
            "rm / -rf",
        ] {
            assert_eq!(
                rule_for(command).as_deref(),
                Some("rm-recursive-root"),
                "{}",
                command
            );
        }
    }

    #[test]
    fn scoped_removals_are_allowed() {
        for command in [
            "rm -rf ./build",
            "rm -rf /tmp/cortex-cache",
            "rm -rf /var/lib/apt/lists/*",
            "rm -rf ~/Downloads/old",
            "rm -f /etc/nginx/sites-enabled/default",
            "sudo apt-get remove --purge nginx",
            "docker rm -f web",
            "rm -rf \"./my dir\"",
            "rm -rf '/tmp/a b'",
            "rm -rf ~/.cache/pip",
            "rm -f / ; ls -r",
        ] {
            assert_eq!(rule_for(command), None, "{}", command);
        }
    }

    #[test]
    fn formatting_and_disk_writes_are_caught() {
        assert_eq!(
            rule_for("sudo mkfs.ext4 /dev/sdb1").as_deref(),
            Some("filesystem-format")
        );
        assert_eq!(
            rule_for("MKFS -t xfs /dev/sdc").as_deref(),
            Some("filesystem-format")
        );
        assert_eq!(
            rule_for("wipefs -a /dev/sda").as_deref(),
            Some("filesystem-format")
        );
        assert_eq!(
            rule_for("sudo dd if=/dev/zero of=/dev/sda bs=1M").as_deref(),
            Some("dd-block-device")
        );
        assert_eq!(
            rule_for("dd if=ubuntu.iso of=/dev/nvme0n1 status=progress").as_deref(),
            Some("dd-block-device")
        );
        assert_eq!(
            rule_for("cat image.bin > /dev/sda").as_deref(),
            Some("redirect-block-device")
        );
        assert_eq!(rule_for("dd if=/dev/zero of=/tmp/swap bs=1M count=10"), None);
        assert_eq!(rule_for("dd if=/dev/sda of=\"/tmp/disk.img\""), None);
        assert_eq!(rule_for("echo hi > /dev/null"), None);
    }

    #[test]
    fn quoted_device_paths_are_caught() {
        for (command, rule) in [
            ("dd if=/dev/zero of=\"/dev/sda\"", "dd-block-device"),
            ("dd if=/dev/zero of='/dev/nvme0n1' bs=4M", "dd-block-device"),
            ("cat image.bin > \"/dev/sdb\"", "redirect-block-device"),
            ("cat image.bin >'/dev/mmcblk0'", "redirect-block-device"),
        ] {
            assert_eq!(rule_for(command).as_deref(), Some(rule), "{}", command);
        }
    }

    #[test]
    fn fork_bombs_and_self_spawn_are_caught() {
        assert_eq!(rule_for(":(){ :|:& };:").as_deref(), Some("fork-bomb"));
        assert_eq!(
            rule_for("bomb() { bomb | bomb & }; bomb").as_deref(),
            Some("fork-bomb")
        );
        assert_eq!(
            rule_for("perl -e 'fork while fork'").as_deref(),
            Some("unbounded-self-spawn")
        );
        assert_eq!(
            rule_for("while true; do ./spawn.sh & done").as_deref(),
            Some("unbounded-self-spawn")
        );
        assert_eq!(rule_for("while true; do date; sleep 5; done"), None);
    }

    #[test]
    fn recursive_permission_changes_on_root_are_caught() {
        assert_eq!(
            rule_for("sudo chmod -R 777 /").as_deref(),
            Some("recursive-permission-root")
        );
        assert_eq!(
            rule_for("chown -R nobody:nogroup /etc").as_deref(),
            Some("recursive-permission-root")
        );
        assert_eq!(
            rule_for("chmod -R 755 \"/\"").as_deref(),
            Some("recursive-permission-root")
        );
        assert_eq!(rule_for("sudo chown -R www-data:www-data /var/www/html"), None);
    }

    #[test]
    fn drop_policy_removes_matches_and_keeps_order() {
        let (kept, dropped) = CommandValidator::new()
            .apply(
                list(&["sudo apt update", "rm -rf /", "mkfs.ext4 /dev/sdb", "uptime"]),
                ValidationPolicy::Drop,
            )
            .unwrap();
        assert_eq!(kept.into_vec(), vec!["sudo apt update", "uptime"]);
        let dropped: Vec<&str> = dropped.iter().map(|o| o.command.as_str()).collect();
        assert_eq!(dropped, vec!["rm -rf /", "mkfs.ext4 /dev/sdb"]);
    }

    #[test]
    fn drop_policy_can_empty_the_list() {
        let (kept, _) = CommandValidator::new()
            .apply(list(&["rm -rf /"]), ValidationPolicy::Drop)
            .unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn reject_policy_names_command_and_rule() {
        let err = CommandValidator::new()
            .apply(list(&["ls", "rm -rf /"]), ValidationPolicy::Reject)
            .unwrap_err();
        match err {
            CortexError::Validation { command, rule } => {
                assert_eq!(command, "rm -rf /");
                assert_eq!(rule, "rm-recursive-root");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn reject_policy_passes_clean_lists_through() {
        let (kept, dropped) = CommandValidator::new()
            .apply(list(&["ls", "pwd"]), ValidationPolicy::Reject)
            .unwrap();
        assert_eq!(kept.into_vec(), vec!["ls", "pwd"]);
        assert!(dropped.is_empty());
    }

    #[test]
    fn assess_reports_every_command() {
        let outcomes = CommandValidator::new().assess(&list(&["ls", ":(){ :|:& };:"]));
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].allowed);
        assert_eq!(outcomes[0].rule, None);
        assert!(!outcomes[1].allowed);
        assert_eq!(outcomes[1].rule.as_deref(), Some("fork-bomb"));
    }

    #[test]
    fn extra_rules_extend_the_builtins() {
        let validator =
            CommandValidator::with_extra_rules([("no-shutdown", r"\bshutdown\b")]).unwrap();
        assert_eq!(
            validator.check("sudo SHUTDOWN -h now").rule.as_deref(),
            Some("no-shutdown")
        );
        assert_eq!(
            validator.check("rm -rf /").rule.as_deref(),
            Some("rm-recursive-root")
        );
    }

    #[test]
    fn rules_can_be_described_by_id() {
        let validator = CommandValidator::new();
        assert!(
            validator
                .describe("fork-bomb")
                .is_some_and(|d| d.contains("backgrounds itself"))
        );
        assert_eq!(validator.describe("no-such-rule"), None);
    }

    #[test]
    fn invalid_extra_rule_is_configuration_error() {
        let err = CommandValidator::with_extra_rules([("broken", "(unclosed")]).unwrap_err();
        assert!(matches!(err, CortexError::Configuration(_)));
    }
}
