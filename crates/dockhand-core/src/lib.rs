pub mod config;
pub mod error;
pub mod redact;
pub mod tool_registry;
pub mod types;
pub mod workspace;

pub use config::AppConfig;
pub use error::{DockhandError, Result};
pub use redact::CredentialRedactor;
pub use tool_registry::{Tool, ToolRegistry};
pub use workspace::Workspace;
