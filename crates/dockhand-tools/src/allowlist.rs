//! Canonical Docker subcommand keys and the gateway allow-list.
//!
//! Membership of the canonical key in [`SAFE_DOCKER_COMMANDS`] is the sole
//! authorization check; destructive subcommands (`rm`, `rmi`, `prune`,
//! `system prune`, `network rm`, `volume rm`) are deliberately absent and
//! only reachable through the human-approval flow outside this crate.

use dockhand_core::error::{DockhandError, Result};

/// Subcommands the gateway will forward to the Docker binary.
pub const SAFE_DOCKER_COMMANDS: &[&str] = &[
    "ps",
    "images",
    "logs",
    "stats",
    "inspect",
    "start",
    "stop",
    "restart",
    "network ls",
    "network inspect",
    "volume ls",
    "volume inspect",
    "info",
    "version",
    "compose ps",
    "compose logs",
    "run",
    "pull",
    "build",
    "tag",
    "network create",
    "volume create",
    "network connect",
    "network disconnect",
    "exec",
    "compose up",
    "compose down",
];

/// Read-style subcommands whose stdout may be large and is passed through
/// the output shaper.
pub const TRUNCATE_OUTPUT_COMMANDS: &[&str] = &[
    "logs",
    "inspect",
    "stats",
    "ps",
    "images",
    "compose logs",
    "compose ps",
];

/// Tokens that would only appear if the model tried to smuggle shell
/// semantics; argv never goes through a shell.
const UNSAFE_MARKERS: &[&str] = &[";", "&&", "||", "|", "`", "$("];

/// Compute the canonical subcommand key from argv tokens.
///
/// `compose` skips its global flag pairs and single-token flags before the
/// positional subcommand; `network`, `volume`, and `system` require a
/// second token.
pub fn extract_command_key(args: &[String]) -> Result<String> {
    let first = args.first().ok_or(DockhandError::EmptyCommand)?;

    if first == "compose" {
        let mut idx = 1;
        while idx < args.len() {
            let token = args[idx].as_str();
            if matches!(token, "-f" | "--file" | "-p" | "--project-name" | "--profile") {
                idx += 2;
                continue;
            }
            if token.starts_with('-') {
                idx += 1;
                continue;
            }
            return Ok(format!("compose {token}"));
        }
        return Err(DockhandError::ComposeSubcommandRequired);
    }

    if first == "network" || first == "volume" || first == "system" {
        let second = args
            .get(1)
            .ok_or_else(|| DockhandError::SubcommandRequired(first.clone()))?;
        return Ok(format!("{first} {second}"));
    }

    Ok(first.clone())
}

/// Validate argv tokens: shape, unsafe tokens, then allow-list membership.
/// Returns the canonical key on success.
pub fn validate(args: &[String]) -> Result<String> {
    if args.is_empty() {
        return Err(DockhandError::EmptyCommand);
    }

    for token in args {
        if UNSAFE_MARKERS.iter().any(|marker| token.contains(marker)) {
            return Err(DockhandError::UnsafeTokens);
        }
    }

    let key = extract_command_key(args)?;
    if !SAFE_DOCKER_COMMANDS.contains(&key.as_str()) {
        return Err(DockhandError::CommandNotAllowed(key));
    }
    Ok(key)
}

/// Whether stdout for this canonical key goes through the output shaper.
pub fn needs_output_shaping(key: &str) -> bool {
    TRUNCATE_OUTPUT_COMMANDS.contains(&key)
}
