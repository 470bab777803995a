//! Command gateway: validates and executes Docker subcommands.
//!
//! Arguments are passed to the Docker binary as argv, never through a
//! shell. Every invocation is checked against the allow-list before a
//! process is spawned, `cwd` is resolved under the workspace root, and the
//! child runs under a wall clock; on expiry it is killed and the bytes
//! captured so far come back with exit code 124.

use crate::allowlist;
use dockhand_core::config::GatewayConfig;
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::types::{CommandRequest, CommandResult, TIMEOUT_EXIT_CODE};
use dockhand_core::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

pub struct DockerGateway {
    binary: String,
    default_timeout: Duration,
    workspace: Workspace,
}

impl DockerGateway {
    pub fn new(config: &GatewayConfig, workspace: Workspace) -> Self {
        Self {
            binary: config.docker_binary.clone(),
            default_timeout: Duration::from_secs(config.timeout_secs),
            workspace,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Validate and execute one Docker invocation.
    pub async fn execute(&self, request: &CommandRequest) -> Result<CommandResult> {
        let key = allowlist::validate(&request.args)?;

        let cwd: Option<PathBuf> = match &request.cwd {
            Some(path) => Some(self.workspace.resolve(path)?),
            None => None,
        };

        debug!(
            "docker {} (key={}, timeout={}s)",
            request.args.join(" "),
            key,
            request.timeout.as_secs()
        );
        self.run(&request.args, cwd.as_deref(), request.timeout).await
    }

    /// Spawn the binary and capture output under the wall clock.
    async fn run(
        &self,
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandResult> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| DockhandError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        // Drain the pipes concurrently so a chatty child never blocks on a
        // full pipe while we wait on it.
        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                Ok(CommandResult {
                    exit_code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                // Kill the child; the closing pipes release the readers with
                // whatever was captured so far.
                let _ = child.start_kill();
                let _ = child.wait().await;
                let stdout = stdout_task.await.unwrap_or_default();
                Ok(CommandResult {
                    exit_code: TIMEOUT_EXIT_CODE,
                    stdout,
                    stderr: format!("Docker command timed out after {}s", timeout.as_secs()),
                })
            }
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}
