//! The string-first `docker_cli` tool surface.
//!
//! Returns raw stdout on success, `"Error (exit N): <stderr>"` on failure,
//! and `"Error: <message>"` on pre-flight rejection, so the model always
//! sees a single string either way.

use crate::allowlist;
use crate::gateway::DockerGateway;
use crate::shaper::OutputShaper;
use dockhand_core::error::DockhandError;
use dockhand_core::tool_registry::Tool;
use dockhand_core::types::CommandRequest;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub struct DockerCliTool {
    gateway: Arc<DockerGateway>,
    shaper: OutputShaper,
}

#[derive(Deserialize)]
struct DockerCliArgs {
    command: String,
    #[serde(default)]
    args: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

impl DockerCliTool {
    pub fn new(gateway: Arc<DockerGateway>, shaper: OutputShaper) -> Self {
        Self { gateway, shaper }
    }

    async fn run(&self, args: DockerCliArgs) -> String {
        let mut tokens = match shlex::split(&args.command) {
            Some(tokens) => tokens,
            None => return "Error: Unbalanced quotes in command".to_string(),
        };
        if let Some(extra) = args.args.as_deref() {
            match shlex::split(extra) {
                Some(extra_tokens) => tokens.extend(extra_tokens),
                None => return "Error: Unbalanced quotes in args".to_string(),
            }
        }

        // Models sometimes prefix the binary name; drop it.
        if tokens.first().map(String::as_str) == Some("docker") {
            tokens.remove(0);
        }
        if tokens.is_empty() {
            return "Error: Docker command is required".to_string();
        }

        let timeout = args
            .timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.gateway.default_timeout());
        let request = CommandRequest::new(tokens.clone(), args.cwd, timeout);

        match self.gateway.execute(&request).await {
            Ok(result) if result.is_success() => {
                let key = allowlist::extract_command_key(&tokens).unwrap_or_default();
                if allowlist::needs_output_shaping(&key) {
                    self.shaper.response_text(&result.stdout)
                } else {
                    result.stdout
                }
            }
            Ok(result) => {
                let stderr = result.stderr.trim();
                let stderr = if stderr.is_empty() { "Command failed" } else { stderr };
                format!("Error (exit {}): {}", result.exit_code, stderr)
            }
            Err(e) => format!("Error: {}", e),
        }
    }
}

#[async_trait]
impl Tool for DockerCliTool {
    fn name(&self) -> &str {
        "docker_cli"
    }

    fn description(&self) -> &str {
        "Execute whitelisted Docker CLI commands. Returns raw stdout on success, an error \
         string on failure. Supported commands: ps, images, logs, stats, inspect, start, \
         stop, restart, run, pull, build, tag, network ls/create/inspect/connect/disconnect, \
         volume ls/create/inspect, info, version, compose ps/logs/up/down."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Docker subcommand, for example: ps, run, build, compose up"
                },
                "args": {
                    "type": "string",
                    "description": "Optional arguments for the command"
                },
                "cwd": {
                    "type": "string",
                    "description": "Optional working directory (for build, compose commands)"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Command timeout in seconds"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, DockhandError> {
        let args: DockerCliArgs =
            serde_json::from_value(args).map_err(|e| DockhandError::ToolExecution {
                tool_name: "docker_cli".into(),
                message: format!("Invalid arguments: {}", e),
            })?;
        Ok(self.run(args).await)
    }
}
