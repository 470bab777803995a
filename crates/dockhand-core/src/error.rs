use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockhandError {
    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Docker command is required")]
    EmptyCommand,

    #[error("Shell control operators are not allowed")]
    UnsafeTokens,

    #[error("Command not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("Docker compose subcommand is required")]
    ComposeSubcommandRequired,

    #[error("'docker {0}' subcommand is required")]
    SubcommandRequired(String),

    #[error("Path must stay inside workspace root: {0}")]
    PathEscape(String),

    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DockhandError>;
