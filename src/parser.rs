//! Extracts the ordered command list from a model's raw answer.
//!
//! The expected answer is `{"commands": ["...", ...]}`, possibly wrapped in a markdown fence
//! or surrounded by chatter. When enabled, plain-text answers go through a lenient line
//! extractor whose results are tagged [`Confidence::Fallback`]; the two strategies are never
//! mixed within one answer.

use crate::core::error::CortexError;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("valid fence pattern")
});

static COMMAND_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:sudo\s+)?[a-z0-9_./][a-z0-9_./+-]*(?:\s|$)").expect("valid command pattern")
});

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]\s+|\d+[.)]\s+)").expect("valid list marker pattern"));

/// How a command list was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Decoded from the `{"commands": [...]}` contract
    Structured,
    /// Scraped from plain text; treat with extra suspicion
    Fallback,
}

/// Ordered sequence of shell commands. Order is significant and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandList {
    commands: Vec<String>,
    #[serde(skip)]
    confidence: Confidence,
}

impl CommandList {
    pub fn new(commands: Vec<String>) -> Self {
        Self {
            commands,
            confidence: Confidence::Structured,
        }
    }

    pub(crate) fn fallback(commands: Vec<String>) -> Self {
        Self {
            commands,
            confidence: Confidence::Fallback,
        }
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.commands.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.commands
    }

    pub fn into_vec(self) -> Vec<String> {
        self.commands
    }

    /// Keeps the confidence tag, replaces the commands.
    pub(crate) fn with_commands(self, commands: Vec<String>) -> Self {
        Self {
            commands,
            confidence: self.confidence,
        }
    }

    /// Single shell line, e.g. for the line-editor integration.
    pub fn join(&self, separator: &str) -> String {
        self.commands.join(separator)
    }

    /// Serializes back to the `{"commands": [...]}` contract.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "commands": self.commands }).to_string()
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

impl IntoIterator for CommandList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    lenient: bool,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self { lenient: true }
    }
}

impl ResponseParser {
    pub fn new(lenient: bool) -> Self {
        Self { lenient }
    }

    pub fn parse(&self, raw: &str) -> Result<CommandList, CortexError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CortexError::Parse("Response is empty".to_string()));
        }

        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return commands_from_value(value);
        }

        let fenced = FENCED_BLOCK
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim());
        let candidate = fenced.unwrap_or(trimmed);

        if let Some(value) = embedded_object(candidate) {
            return commands_from_value(value);
        }

        if looks_like_json(candidate) {
            return Err(CortexError::Parse(format!(
                "Response looks like JSON but could not be decoded: {}",
                preview(trimmed)
            )));
        }

        if !self.lenient {
            return Err(CortexError::Parse(format!(
                "Response is not a JSON object: {}",
                preview(trimmed)
            )));
        }

        let commands = match fenced {
            Some(block) => block.lines().filter_map(clean_line).collect::<Vec<_>>(),
            None => trimmed
                .lines()
                .filter_map(clean_line)
                .filter(|line| looks_like_command(line))
                .collect(),
        };

        if commands.is_empty() {
            return Err(CortexError::Parse(format!(
                "No commands found in response: {}",
                preview(trimmed)
            )));
        }
        Ok(CommandList::fallback(commands))
    }
}

/// Enforces the `{"commands": [strings]}` contract.
fn commands_from_value(value: Value) -> Result<CommandList, CortexError> {
    let Value::Object(mut object) = value else {
        return Err(CortexError::Parse(
            "Expected a JSON object with a \"commands\" key".to_string(),
        ));
    };
    let commands = object
        .remove("commands")
        .ok_or_else(|| CortexError::Parse("Missing \"commands\" key".to_string()))?;
    let Value::Array(items) = commands else {
        return Err(CortexError::Parse(
            "\"commands\" must be an array".to_string(),
        ));
    };

    // Strings are kept exactly as sent, blanks included.
    let commands = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(command) => Ok(command),
            _ => Err(CortexError::Parse(format!(
                "commands[{}] is not a string",
                index
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CommandList::new(commands))
}

/// The first `{` to the last `}` of `text`, if that slice is a JSON object carrying a
/// `commands` key. Braces inside shell syntax (`find -exec rm {} \;`) do not count.
fn embedded_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(|value| value.get("commands").is_some())
}

fn looks_like_json(text: &str) -> bool {
    text.starts_with('{') || text.contains("\"commands\"")
}

fn clean_line(line: &str) -> Option<String> {
    let line = line.trim();
    let line = line.strip_prefix("$ ").unwrap_or(line);
    let line = LIST_MARKER.replace(line, "");
    let line = line.trim().trim_matches('`').trim();
    if line.is_empty() || line.starts_with('#') {
        None
    } else {
        Some(line.to_string())
    }
}

fn looks_like_command(line: &str) -> bool {
    if line.ends_with(':') || (line.ends_with('.') && !line.ends_with(" .")) {
        return false;
    }
    COMMAND_LINE.is_match(line)
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 120;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
