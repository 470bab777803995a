//! Converts registered tools into plain synchronous callables for the
//! programmatic executor, plus an API reference the agent prompt can embed.

use dockhand_core::tool_registry::Tool;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A tool as the interpreter sandbox sees it: keyword arguments in, one
/// string out. Errors come back as error strings, never as panics.
pub trait ToolInvoker: Send + Sync {
    fn invoke(&self, kwargs: Map<String, Value>) -> String;
}

/// Adapts an async [`Tool`] onto the executor's blocking thread.
struct ToolAdapter {
    tool: Arc<dyn Tool>,
    runtime: tokio::runtime::Handle,
}

impl ToolInvoker for ToolAdapter {
    fn invoke(&self, kwargs: Map<String, Value>) -> String {
        let result = self.runtime.block_on(self.tool.execute(Value::Object(kwargs)));
        match result {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
        }
    }
}

/// Registers tools and hands out their sandbox-facing callables.
pub struct ToolBridge {
    invokers: Vec<(String, Arc<dyn ToolInvoker>)>,
    signatures: HashMap<String, String>,
    descriptions: HashMap<String, String>,
}

impl ToolBridge {
    pub fn new() -> Self {
        Self {
            invokers: Vec::new(),
            signatures: HashMap::new(),
            descriptions: HashMap::new(),
        }
    }

    /// Register an async tool; calls run on `runtime` from the executor's
    /// blocking thread.
    pub fn register_tool(&mut self, tool: Arc<dyn Tool>, runtime: tokio::runtime::Handle) {
        let name = tool.name().to_string();
        let signature = signature_from_schema(&name, &tool.parameters_schema());
        let description = tool.description().to_string();
        let adapter = Arc::new(ToolAdapter {
            tool,
            runtime,
        });
        self.register_invoker(name, signature, description, adapter);
    }

    /// Register a plain invoker directly (fake tools in tests, future
    /// synchronous tools).
    pub fn register_invoker(
        &mut self,
        name: impl Into<String>,
        signature: impl Into<String>,
        description: impl Into<String>,
        invoker: Arc<dyn ToolInvoker>,
    ) {
        let name = name.into();
        tracing::debug!("Bridged tool: {}", name);
        self.invokers.retain(|(existing, _)| existing != &name);
        self.signatures.insert(name.clone(), signature.into());
        self.descriptions.insert(name.clone(), description.into());
        self.invokers.push((name, invoker));
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.invokers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Name/invoker pairs, in registration order.
    pub fn invokers(&self) -> &[(String, Arc<dyn ToolInvoker>)] {
        &self.invokers
    }

    /// Human-readable API reference for all bridged tools.
    pub fn api_reference(&self) -> String {
        let mut lines = Vec::new();
        for (name, _) in &self.invokers {
            if let Some(signature) = self.signatures.get(name) {
                lines.push(format!("  {}", signature));
            }
            if let Some(description) = self.descriptions.get(name) {
                if !description.is_empty() {
                    for line in description.lines() {
                        lines.push(format!("    {}", line.trim()));
                    }
                }
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

impl Default for ToolBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `name(param: type, ...) -> string` signature from a JSON schema.
fn signature_from_schema(name: &str, schema: &Value) -> String {
    let mut params = Vec::new();
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (param, spec) in properties {
            let type_name = spec
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("any");
            params.push(format!("{param}: {type_name}"));
        }
    }
    format!("{name}({}) -> string", params.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dockhand_core::error::DockhandError;
    use serde_json::json;

    struct FakeDockerTool;

    #[async_trait]
    impl Tool for FakeDockerTool {
        fn name(&self) -> &str {
            "docker_cli"
        }

        fn description(&self) -> &str {
            "Execute Docker CLI commands"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "args": {"type": "string"}
                },
                "required": ["command"]
            })
        }

        async fn execute(&self, args: Value) -> Result<String, DockhandError> {
            let command = args["command"].as_str().unwrap_or_default();
            let extra = args["args"].as_str().unwrap_or_default();
            Ok(format!("OK: {command} {extra}"))
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bridged_tool_invokes_synchronously() {
        let mut bridge = ToolBridge::new();
        bridge.register_tool(Arc::new(FakeDockerTool), tokio::runtime::Handle::current());

        let (name, invoker) = &bridge.invokers()[0];
        assert_eq!(name, "docker_cli");

        let mut kwargs = Map::new();
        kwargs.insert("command".into(), json!("ps"));
        kwargs.insert("args".into(), json!("-a"));

        let invoker = invoker.clone();
        let out = tokio::task::spawn_blocking(move || invoker.invoke(kwargs))
            .await
            .unwrap();
        assert_eq!(out, "OK: ps -a");
    }

    #[tokio::test]
    async fn test_api_reference_contains_signature() {
        let mut bridge = ToolBridge::new();
        bridge.register_tool(Arc::new(FakeDockerTool), tokio::runtime::Handle::current());

        let reference = bridge.api_reference();
        assert!(reference.contains("docker_cli("));
        assert!(reference.contains("command: string"));
        assert!(reference.contains("Execute Docker CLI commands"));
    }

    #[tokio::test]
    async fn test_reregistration_replaces() {
        struct Stub(&'static str);
        impl ToolInvoker for Stub {
            fn invoke(&self, _kwargs: Map<String, Value>) -> String {
                self.0.to_string()
            }
        }

        let mut bridge = ToolBridge::new();
        bridge.register_invoker("t", "t() -> string", "", Arc::new(Stub("one")));
        bridge.register_invoker("t", "t() -> string", "", Arc::new(Stub("two")));
        assert_eq!(bridge.tool_names(), vec!["t"]);
        assert_eq!(bridge.invokers()[0].1.invoke(Map::new()), "two");
    }
}
