use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exit code reserved for Docker commands killed by the wall-clock timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// A validated Docker invocation bound for the gateway.
///
/// `args` are already-split argv tokens (no shell involved); the canonical
/// subcommand key is derived from them at validation time.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub args: Vec<String>,
    /// Workspace-relative working directory, if any.
    pub cwd: Option<String>,
    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new(args: Vec<String>, cwd: Option<String>, timeout: Duration) -> Self {
        Self { args, cwd, timeout }
    }
}

/// Raw result of running the Docker binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Schema definition for a tool's parameters, sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}
