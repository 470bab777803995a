//! Structured records for trajectory collection.
//!
//! Pure data trees: records never point back at the recorder that produced
//! them, and every field survives a serialize/deserialize round trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Expanded args for the `docker_cli` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerCliArgs {
    /// Docker subcommand (ps, run, build, compose up, etc.).
    pub command: String,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Reconstructed full docker command string.
    pub full_command: String,
}

/// Single tool invocation record with timing and result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    /// Raw input string as received from the runtime.
    pub input_raw: String,
    #[serde(default)]
    pub input_parsed: Map<String, Value>,
    /// Expanded args, only for the `docker_cli` tool.
    #[serde(default)]
    pub docker_cli_args: Option<DockerCliArgs>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Unix timestamp of tool start.
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    /// Execution time in seconds.
    #[serde(default)]
    pub latency: Option<f64>,
    pub run_id: String,
    /// Ordinal position in the trajectory (0-indexed).
    pub sequence: usize,
}

/// Single LLM invocation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMCallRecord {
    #[serde(default = "default_model")]
    pub model: String,
    pub start_time: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub latency: Option<f64>,
    #[serde(default)]
    pub token_usage: HashMap<String, u64>,
    pub run_id: String,
}

/// Aggregated metrics for a trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryMetrics {
    pub total_tool_calls: usize,
    pub successful_tool_calls: usize,
    pub failed_tool_calls: usize,
    /// Sum of all tool latencies.
    pub total_latency: f64,
    pub avg_latency: f64,
    pub total_llm_calls: usize,
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub loop_detected: bool,
    /// Unique docker subcommands, in first-seen order.
    pub docker_commands_used: Vec<String>,
}

/// Complete trajectory for a single agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    /// User input / task description.
    pub task: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub llm_calls: Vec<LLMCallRecord>,
    #[serde(default)]
    pub metrics: TrajectoryMetrics,
    /// Set by the recorder on the first tool start of the turn.
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_docker_cli_args_fields() {
        let args = DockerCliArgs {
            command: "compose up".into(),
            args: Some("-d --build".into()),
            cwd: Some("/workspace".into()),
            timeout: Some(60),
            full_command: "docker compose up -d --build".into(),
        };
        assert_eq!(args.command, "compose up");
        assert_eq!(args.cwd.as_deref(), Some("/workspace"));
    }

    #[test]
    fn test_metrics_defaults() {
        let m = TrajectoryMetrics::default();
        assert_eq!(m.total_tool_calls, 0);
        assert!(m.docker_commands_used.is_empty());
        assert!(!m.loop_detected);
    }

    #[test]
    fn test_record_roundtrip_preserves_fields() {
        let mut input_parsed = Map::new();
        input_parsed.insert("command".into(), json!("ps"));
        input_parsed.insert("args".into(), json!("-a"));

        let record = TrajectoryRecord {
            task: "run nginx on port 8080".into(),
            thread_id: Some("test-thread".into()),
            tool_calls: vec![ToolCallRecord {
                tool: "docker_cli".into(),
                input_raw: r#"{"command":"ps","args":"-a"}"#.into(),
                input_parsed,
                docker_cli_args: Some(DockerCliArgs {
                    command: "ps".into(),
                    args: Some("-a".into()),
                    cwd: None,
                    timeout: Some(30),
                    full_command: "docker ps -a".into(),
                }),
                output: Some("CONTAINER ID   IMAGE".into()),
                success: true,
                error: None,
                start_time: 1000.0,
                end_time: Some(1000.5),
                latency: Some(0.5),
                run_id: "abc-123".into(),
                sequence: 0,
            }],
            llm_calls: vec![LLMCallRecord {
                model: "gpt-4o-mini".into(),
                start_time: 999.0,
                end_time: Some(999.8),
                latency: Some(0.8),
                token_usage: HashMap::from([("total_tokens".to_string(), 150u64)]),
                run_id: "llm-1".into(),
            }],
            metrics: TrajectoryMetrics {
                total_tool_calls: 1,
                successful_tool_calls: 1,
                docker_commands_used: vec!["ps".into()],
                ..TrajectoryMetrics::default()
            },
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            success: true,
            error: None,
        };

        let serialized = serde_json::to_string(&record).unwrap();
        let parsed: TrajectoryRecord = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let raw = json!({
            "tool": "docker_cli",
            "input_raw": "{}",
            "start_time": 0.0,
            "run_id": "r",
            "sequence": 0
        });
        let record: ToolCallRecord = serde_json::from_value(raw).unwrap();
        assert!(record.success);
        assert!(record.docker_cli_args.is_none());
        assert!(record.input_parsed.is_empty());
    }
}
