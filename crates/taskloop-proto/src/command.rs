//! Commands written to the agent's stdin.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Execution options attached to a prompt.
///
/// An open JSON object: the well-known keys are `cwd`, `exit_on_complete`
/// and `permission_mode`, but workflows may pass anything the agent accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptOptions(Map<String, Value>);

impl PromptOptions {
    pub const CWD: &'static str = "cwd";
    pub const EXIT_ON_COMPLETE: &'static str = "exit_on_complete";
    pub const PERMISSION_MODE: &'static str = "permission_mode";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `self` layered over `defaults`: keys present in `self` win.
    pub fn merged_over(&self, defaults: &PromptOptions) -> PromptOptions {
        let mut merged = defaults.0.clone();
        for (key, value) in &self.0 {
            merged.insert(key.clone(), value.clone());
        }
        PromptOptions(merged)
    }
}

/// A command for the agent process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentCommand {
    /// Start a run with the given prompt.
    Prompt {
        prompt: String,
        options: PromptOptions,
    },
    /// Ask the agent to exit.
    Shutdown,
}

impl AgentCommand {
    /// Encodes the command as one newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
