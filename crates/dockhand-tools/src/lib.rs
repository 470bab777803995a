pub mod allowlist;
pub mod bridge;
pub mod code_exec;
pub mod docker_cli;
pub mod gateway;
pub mod shaper;
pub mod typed_tools;

use dockhand_core::config::AppConfig;
use dockhand_core::tool_registry::ToolRegistry;
use dockhand_core::workspace::Workspace;
use std::sync::Arc;

pub use bridge::{ToolBridge, ToolInvoker};
pub use code_exec::CodeExecutor;
pub use docker_cli::DockerCliTool;
pub use gateway::DockerGateway;
pub use shaper::OutputShaper;

/// Register all built-in tools into the registry.
pub fn register_all(registry: &mut ToolRegistry, config: &AppConfig) -> dockhand_core::Result<()> {
    let workspace = Workspace::new(&config.workspace.root)?;
    let gateway = Arc::new(DockerGateway::new(&config.gateway, workspace));
    let shaper = OutputShaper::new(config.shaper);

    registry.register(Arc::new(DockerCliTool::new(gateway.clone(), shaper)));
    registry.register(Arc::new(typed_tools::ListContainersTool::new(
        gateway.clone(),
        shaper,
    )));
    registry.register(Arc::new(typed_tools::ListImagesTool::new(
        gateway.clone(),
        shaper,
    )));
    registry.register(Arc::new(typed_tools::ComposePsTool::new(
        gateway.clone(),
        shaper,
    )));
    registry.register(Arc::new(typed_tools::ComposeUpTool::new(gateway, shaper)));
    Ok(())
}
