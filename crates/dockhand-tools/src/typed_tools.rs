//! Typed Docker tools with structured JSON envelopes.
//!
//! Unlike the string-first `docker_cli` surface, these return
//! `{"success": ..., ...}` envelopes with parsed payloads. Output is parsed
//! BEFORE the response budget is applied, so the structure survives
//! truncation.

use crate::gateway::DockerGateway;
use crate::shaper::OutputShaper;
use dockhand_core::error::DockhandError;
use dockhand_core::tool_registry::Tool;
use dockhand_core::types::CommandRequest;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Parse a services argument as either a JSON array or a comma-separated
/// list.
pub fn parse_services(raw: &str) -> Vec<String> {
    if let Ok(Value::Array(items)) = serde_json::from_str(raw) {
        return items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse docker `--format {{json .}}` output: one JSON value per line, or a
/// single JSON array.
fn parse_json_output(stdout: &str) -> Option<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Some(Value::Array(Vec::new()));
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(match value {
            Value::Array(_) => value,
            other => Value::Array(vec![other]),
        });
    }
    let items: Vec<Value> = trimmed
        .lines()
        .filter_map(|line| serde_json::from_str(line.trim()).ok())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(Value::Array(items))
    }
}

fn envelope_fields(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert(key.to_string(), value);
    }
    map
}

// ── list_containers ────────────────────────────────────────────────────

pub struct ListContainersTool {
    gateway: Arc<DockerGateway>,
    shaper: OutputShaper,
}

impl ListContainersTool {
    pub fn new(gateway: Arc<DockerGateway>, shaper: OutputShaper) -> Self {
        Self { gateway, shaper }
    }
}

#[async_trait]
impl Tool for ListContainersTool {
    fn name(&self) -> &str {
        "list_containers"
    }

    fn description(&self) -> &str {
        "List Docker containers as structured JSON. Returns one entry per container \
         with image, status, names, and ports."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "all": {
                    "type": "boolean",
                    "description": "Include stopped containers. Default: false"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, DockhandError> {
        #[derive(Deserialize)]
        struct Args {
            #[serde(default)]
            all: bool,
        }
        let args: Args = serde_json::from_value(args).map_err(|e| DockhandError::ToolExecution {
            tool_name: "list_containers".into(),
            message: format!("Invalid arguments: {}", e),
        })?;

        let mut argv = vec!["ps".to_string()];
        if args.all {
            argv.push("-a".to_string());
        }
        argv.push("--format".to_string());
        argv.push("{{json .}}".to_string());

        let request = CommandRequest::new(argv, None, self.gateway.default_timeout());
        let result = match self.gateway.execute(&request).await {
            Ok(result) => result,
            Err(e) => return Ok(self.shaper.error(&e.to_string(), Map::new())),
        };
        if !result.is_success() {
            return Ok(self.shaper.error(result.stderr.trim(), Map::new()));
        }

        let containers = parse_json_output(&result.stdout).unwrap_or(Value::Array(Vec::new()));
        let count = containers.as_array().map(Vec::len).unwrap_or(0);
        Ok(self.shaper.ok(envelope_fields(vec![
            ("count", json!(count)),
            ("containers", containers),
        ])))
    }
}

// ── list_images ────────────────────────────────────────────────────────

pub struct ListImagesTool {
    gateway: Arc<DockerGateway>,
    shaper: OutputShaper,
}

impl ListImagesTool {
    pub fn new(gateway: Arc<DockerGateway>, shaper: OutputShaper) -> Self {
        Self { gateway, shaper }
    }
}

#[async_trait]
impl Tool for ListImagesTool {
    fn name(&self) -> &str {
        "list_images"
    }

    fn description(&self) -> &str {
        "List local Docker images as structured JSON with repository, tag, and size."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _args: Value) -> Result<String, DockhandError> {
        let argv = vec![
            "images".to_string(),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ];
        let request = CommandRequest::new(argv, None, self.gateway.default_timeout());
        let result = match self.gateway.execute(&request).await {
            Ok(result) => result,
            Err(e) => return Ok(self.shaper.error(&e.to_string(), Map::new())),
        };
        if !result.is_success() {
            return Ok(self.shaper.error(result.stderr.trim(), Map::new()));
        }

        let images = parse_json_output(&result.stdout).unwrap_or(Value::Array(Vec::new()));
        let count = images.as_array().map(Vec::len).unwrap_or(0);
        Ok(self.shaper.ok(envelope_fields(vec![
            ("count", json!(count)),
            ("images", images),
        ])))
    }
}

// ── compose_ps ─────────────────────────────────────────────────────────

pub struct ComposePsTool {
    gateway: Arc<DockerGateway>,
    shaper: OutputShaper,
}

impl ComposePsTool {
    pub fn new(gateway: Arc<DockerGateway>, shaper: OutputShaper) -> Self {
        Self { gateway, shaper }
    }
}

#[async_trait]
impl Tool for ComposePsTool {
    fn name(&self) -> &str {
        "compose_ps"
    }

    fn description(&self) -> &str {
        "Show compose service status for a project. The compose file path is \
         resolved inside the workspace root."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Workspace-relative path to the compose file"
                },
                "cwd": {
                    "type": "string",
                    "description": "Optional workspace-relative working directory"
                },
                "format_json": {
                    "type": "boolean",
                    "description": "Parse service entries into structured JSON. Default: true"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, DockhandError> {
        #[derive(Deserialize)]
        struct Args {
            file_path: String,
            #[serde(default)]
            cwd: Option<String>,
            #[serde(default = "default_true")]
            format_json: bool,
        }
        fn default_true() -> bool {
            true
        }

        let args: Args = serde_json::from_value(args).map_err(|e| DockhandError::ToolExecution {
            tool_name: "compose_ps".into(),
            message: format!("Invalid arguments: {}", e),
        })?;

        let file = match self.gateway.workspace().resolve(&args.file_path) {
            Ok(path) => path,
            Err(e) => return Ok(self.shaper.error(&e.to_string(), Map::new())),
        };

        let mut argv = vec![
            "compose".to_string(),
            "-f".to_string(),
            file.to_string_lossy().into_owned(),
            "ps".to_string(),
        ];
        if args.format_json {
            argv.push("--format".to_string());
            argv.push("json".to_string());
        }

        let request = CommandRequest::new(argv, args.cwd, self.gateway.default_timeout());
        let result = match self.gateway.execute(&request).await {
            Ok(result) => result,
            Err(e) => return Ok(self.shaper.error(&e.to_string(), Map::new())),
        };
        if !result.is_success() {
            return Ok(self.shaper.error(result.stderr.trim(), Map::new()));
        }

        // Parse before the response budget is applied so structure survives
        // truncation.
        let parsed = if args.format_json {
            parse_json_output(&result.stdout)
        } else {
            None
        };
        Ok(self.shaper.ok(envelope_fields(vec![
            ("parsed", parsed.unwrap_or(Value::Null)),
            ("output", json!(result.stdout)),
        ])))
    }
}

// ── compose_up ─────────────────────────────────────────────────────────

pub struct ComposeUpTool {
    gateway: Arc<DockerGateway>,
    shaper: OutputShaper,
}

impl ComposeUpTool {
    pub fn new(gateway: Arc<DockerGateway>, shaper: OutputShaper) -> Self {
        Self { gateway, shaper }
    }
}

#[async_trait]
impl Tool for ComposeUpTool {
    fn name(&self) -> &str {
        "compose_up"
    }

    fn description(&self) -> &str {
        "Start compose services. Accepts an optional service list as a JSON array \
         or comma-separated names; always runs detached."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Workspace-relative path to the compose file"
                },
                "services": {
                    "type": "string",
                    "description": "Optional services, JSON array or comma-separated"
                },
                "build": {
                    "type": "boolean",
                    "description": "Build images before starting. Default: false"
                },
                "cwd": {
                    "type": "string",
                    "description": "Optional workspace-relative working directory"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, DockhandError> {
        #[derive(Deserialize)]
        struct Args {
            file_path: String,
            #[serde(default)]
            services: Option<String>,
            #[serde(default)]
            build: bool,
            #[serde(default)]
            cwd: Option<String>,
        }

        let args: Args = serde_json::from_value(args).map_err(|e| DockhandError::ToolExecution {
            tool_name: "compose_up".into(),
            message: format!("Invalid arguments: {}", e),
        })?;

        let file = match self.gateway.workspace().resolve(&args.file_path) {
            Ok(path) => path,
            Err(e) => return Ok(self.shaper.error(&e.to_string(), Map::new())),
        };

        let mut argv = vec![
            "compose".to_string(),
            "-f".to_string(),
            file.to_string_lossy().into_owned(),
            "up".to_string(),
            "-d".to_string(),
        ];
        if args.build {
            argv.push("--build".to_string());
        }
        let services = args.services.as_deref().map(parse_services).unwrap_or_default();
        argv.extend(services.iter().cloned());

        let request = CommandRequest::new(argv, args.cwd, self.gateway.default_timeout());
        let result = match self.gateway.execute(&request).await {
            Ok(result) => result,
            Err(e) => return Ok(self.shaper.error(&e.to_string(), Map::new())),
        };
        if !result.is_success() {
            return Ok(self.shaper.error(result.stderr.trim(), Map::new()));
        }

        Ok(self.shaper.ok(envelope_fields(vec![
            ("services", json!(services)),
            // Compose reports progress on stderr even on success.
            ("output", json!(format!("{}{}", result.stdout, result.stderr))),
        ])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_core::config::{GatewayConfig, ShaperConfig};
    use dockhand_core::workspace::Workspace;
    use std::os::unix::fs::PermissionsExt;

    fn fake_docker(dir: &tempfile::TempDir, script_body: &str) -> Arc<DockerGateway> {
        let script = dir.path().join("fake-docker");
        std::fs::write(&script, format!("#!/bin/bash\n{script_body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let workspace = Workspace::new(dir.path().join("ws")).unwrap();
        Arc::new(DockerGateway::new(
            &GatewayConfig {
                docker_binary: script.to_string_lossy().into_owned(),
                timeout_secs: 30,
            },
            workspace,
        ))
    }

    #[test]
    fn test_parse_services_json() {
        assert_eq!(parse_services(r#"["api", "db"]"#), vec!["api", "db"]);
    }

    #[test]
    fn test_parse_services_csv() {
        assert_eq!(parse_services("api, db ,worker"), vec!["api", "db", "worker"]);
    }

    #[test]
    fn test_parse_json_output_lines() {
        let stdout = "{\"Names\":\"web\"}\n{\"Names\":\"db\"}\n";
        let parsed = parse_json_output(stdout).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["Names"], "web");
    }

    #[test]
    fn test_parse_json_output_array() {
        let parsed = parse_json_output(r#"[{"Name": "api"}]"#).unwrap();
        assert_eq!(parsed[0]["Name"], "api");
    }

    #[test]
    fn test_parse_json_output_empty() {
        assert_eq!(parse_json_output("  \n"), Some(json!([])));
        assert_eq!(parse_json_output("plain text"), None);
    }

    #[tokio::test]
    async fn test_list_containers_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = fake_docker(
            &dir,
            r#"echo '{"Names":"web","Image":"nginx"}'; echo '{"Names":"db","Image":"postgres"}'"#,
        );
        let tool = ListContainersTool::new(gateway, OutputShaper::new(ShaperConfig::default()));

        let out = tool.execute(json!({"all": true})).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["count"], 2);
        assert_eq!(parsed["containers"][0]["Names"], "web");
    }

    #[tokio::test]
    async fn test_list_images_failure_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = fake_docker(&dir, "echo 'daemon not running' >&2; exit 1");
        let tool = ListImagesTool::new(gateway, OutputShaper::new(ShaperConfig::default()));

        let out = tool.execute(json!({})).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["success"], false);
        assert!(parsed["error"].as_str().unwrap().contains("daemon not running"));
    }

    #[tokio::test]
    async fn test_compose_ps_parses_before_output_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let detail = "x".repeat(2500);
        let gateway = fake_docker(
            &dir,
            &format!(r#"echo '[{{"Name": "api", "Detail": "{detail}"}}]'"#),
        );
        let tool = ComposePsTool::new(gateway, OutputShaper::new(ShaperConfig::default()));

        let out = tool
            .execute(json!({"file_path": "/docker-compose.yml"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["parsed"][0]["Name"], "api");
    }

    #[tokio::test]
    async fn test_compose_ps_rejects_escaping_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = fake_docker(&dir, "echo ok");
        let tool = ComposePsTool::new(gateway, OutputShaper::new(ShaperConfig::default()));

        let out = tool
            .execute(json!({"file_path": "../../outside/docker-compose.yml"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["success"], false);
        assert!(parsed["error"]
            .as_str()
            .unwrap()
            .contains("workspace root"));
    }

    #[tokio::test]
    async fn test_compose_up_passes_services() {
        let dir = tempfile::tempdir().unwrap();
        // The fake prints its argv so the test can see what was passed.
        let gateway = fake_docker(&dir, r#"echo "$@""#);
        let tool = ComposeUpTool::new(gateway, OutputShaper::new(ShaperConfig::default()));

        let out = tool
            .execute(json!({
                "file_path": "/docker-compose.yml",
                "services": "api, db",
                "build": true
            }))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["services"], json!(["api", "db"]));
        let echoed = parsed["output"].as_str().unwrap();
        assert!(echoed.contains("up -d --build api db"));
        assert!(echoed.contains("docker-compose.yml"));
    }
}
