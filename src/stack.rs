//! Pre-built package stacks, e.g. `cortex stack webdev`.
//!
//! A stack is a named package list. It is never installed directly: its [`Stack::request`] goes
//! through the interpreter like any other request, so the generated commands are screened by
//! the same validator.

use crate::core::error::CortexError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const BUILTIN_STACKS: &str = include_str!("../stacks/stacks.json");

/// Suffix of the variant used when a stack's hardware is missing.
const CPU_SUFFIX: &str = "-cpu";

fn any_hardware() -> String {
    "any".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// `any`, `cpu` or `gpu`
    #[serde(default = "any_hardware")]
    pub hardware: String,
}

impl Stack {
    pub fn needs_gpu(&self) -> bool {
        self.hardware.eq_ignore_ascii_case("gpu")
    }

    /// Plain-language request handed to the interpreter.
    pub fn request(&self) -> String {
        format!(
            "Install the {} stack with these packages: {}",
            self.name,
            self.packages.join(", ")
        )
    }

    /// Multi-line summary: name, description, numbered packages, tags and hardware.
    pub fn describe(&self) -> String {
        let mut out = format!("Stack: {}\n", self.name);
        if !self.description.is_empty() {
            let _ = writeln!(out, "Description: {}", self.description);
        }
        out.push_str("\nPackages included:\n");
        for (index, package) in self.packages.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", index + 1, package);
        }
        if !self.tags.is_empty() {
            let _ = writeln!(out, "\nTags: {}", self.tags.join(", "));
        }
        let _ = writeln!(out, "Hardware: {}", self.hardware);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackCatalog {
    stacks: Vec<Stack>,
}

impl StackCatalog {
    /// The catalog shipped with cortex.
    pub fn builtin() -> Result<Self, CortexError> {
        Self::from_json(BUILTIN_STACKS)
    }

    pub fn path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cortex")
            .join("stacks.json")
    }

    /// `~/.cortex/stacks.json` when present, the built-in catalog otherwise.
    pub fn load() -> Result<Self, CortexError> {
        let path = Self::path();
        if path.exists() {
            return Self::load_from(&path);
        }
        Self::builtin()
    }

    pub fn load_from(path: &Path) -> Result<Self, CortexError> {
        debug!(path = %path.display(), "Loading stacks");
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
            .map_err(|e| CortexError::Settings(format!("{}: {}", path.display(), e)))
    }

    /// Parses `{"stacks": [...]}`. Ids must be present and unique.
    pub fn from_json(json: &str) -> Result<Self, CortexError> {
        let catalog: StackCatalog = serde_json::from_str(json)?;

        let mut seen = HashSet::new();
        for stack in &catalog.stacks {
            if stack.id.trim().is_empty() {
                return Err(CortexError::Settings("Stack id must not be empty".to_string()));
            }
            if !seen.insert(stack.id.as_str()) {
                return Err(CortexError::Settings(format!(
                    "Duplicate stack id: {}",
                    stack.id
                )));
            }
        }
        Ok(catalog)
    }

    pub fn list(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn find(&self, id: &str) -> Option<&Stack> {
        self.stacks.iter().find(|stack| stack.id == id)
    }

    /// Packages of `id`; empty for an unknown stack.
    pub fn packages(&self, id: &str) -> &[String] {
        self.find(id)
            .map(|stack| stack.packages.as_slice())
            .unwrap_or_default()
    }

    /// The variant of `id` that suits this machine: a GPU stack falls back to its `-cpu`
    /// sibling when there is no GPU and the sibling exists. Anything else is returned as is.
    pub fn suggest(&self, id: &str, has_gpu: bool) -> String {
        match self.find(id) {
            Some(stack) if stack.needs_gpu() && !has_gpu => {
                let cpu = format!("{}{}", id, CPU_SUFFIX);
                if self.find(&cpu).is_some() {
                    cpu
                } else {
                    id.to_string()
                }
            }
            _ => id.to_string(),
        }
    }

    pub fn describe(&self, id: &str) -> String {
        match self.find(id) {
            Some(stack) => stack.describe(),
            None => format!("Stack '{}' not found", id),
        }
    }
}
