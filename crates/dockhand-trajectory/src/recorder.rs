//! Trajectory recorder for agent turns.
//!
//! Observes tool and LLM lifecycle events delivered by the agent runtime,
//! pairs starts with ends by run id, classifies success, flags loop
//! patterns, and emits one finalized [`TrajectoryRecord`] per turn with
//! credentials redacted. Loop detection is a signal only: the recorder
//! never decides turn success, the caller does.

use crate::literal;
use crate::models::{
    DockerCliArgs, LLMCallRecord, ToolCallRecord, TrajectoryMetrics, TrajectoryRecord,
};
use chrono::{DateTime, Utc};
use dockhand_core::config::TrajectoryConfig;
use dockhand_core::redact::CredentialRedactor;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const MAX_STORED_OUTPUT_CHARS: usize = 4000;
const MAX_STORED_ERROR_CHARS: usize = 500;

pub struct TrajectoryRecorder {
    state: Mutex<RecorderState>,
    max_repeated_calls: usize,
    redact: bool,
    redactor: CredentialRedactor,
}

#[derive(Default)]
struct RecorderState {
    tool_calls: Vec<ToolCallRecord>,
    llm_calls: Vec<LLMCallRecord>,
    pending_tools: HashMap<String, PendingTool>,
    pending_llms: HashMap<String, PendingLlm>,
    sequence_counter: usize,
    loop_detected: bool,
    consecutive_empty: usize,
    same_tool_streak: Option<(String, usize)>,
    started_at: Option<DateTime<Utc>>,
}

struct PendingTool {
    tool: String,
    input_raw: String,
    input_parsed: Map<String, Value>,
    docker_cli_args: Option<DockerCliArgs>,
    start_time: f64,
    sequence: usize,
}

struct PendingLlm {
    model: String,
    start_time: f64,
}

impl TrajectoryRecorder {
    pub fn new(config: TrajectoryConfig) -> Self {
        Self {
            state: Mutex::new(RecorderState::default()),
            max_repeated_calls: config.max_repeated_calls,
            redact: config.redact,
            redactor: CredentialRedactor::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── tool lifecycle ──────────────────────────────────────────────

    pub fn on_tool_start(&self, tool_name: &str, input_raw: &str, run_id: &str) {
        let parsed = parse_tool_input(input_raw);
        let docker_cli_args = if tool_name == "docker_cli" {
            expand_docker_cli(&parsed)
        } else {
            None
        };

        let mut state = self.lock();
        if state.started_at.is_none() {
            state.started_at = Some(Utc::now());
        }
        let sequence = state.sequence_counter;
        state.sequence_counter += 1;
        state.pending_tools.insert(
            run_id.to_string(),
            PendingTool {
                tool: tool_name.to_string(),
                input_raw: input_raw.to_string(),
                input_parsed: parsed,
                docker_cli_args,
                start_time: now_unix(),
                sequence,
            },
        );
        debug!("tool_start seq={} tool={}", sequence, tool_name);
    }

    pub fn on_tool_end(&self, output: &str, run_id: &str) {
        let mut state = self.lock();
        let Some(pending) = state.pending_tools.remove(run_id) else {
            warn!("orphaned tool_end run_id={}", run_id);
            return;
        };

        let end_time = now_unix();
        let latency = end_time - pending.start_time;
        let is_error = is_error_output(output);
        let is_empty = is_empty_output(output);
        let success = !(is_error || is_empty);

        let record = ToolCallRecord {
            tool: pending.tool.clone(),
            input_raw: pending.input_raw,
            input_parsed: pending.input_parsed,
            docker_cli_args: pending.docker_cli_args,
            output: if output.is_empty() {
                None
            } else {
                Some(head_chars(output, MAX_STORED_OUTPUT_CHARS))
            },
            success,
            error: is_error.then(|| head_chars(output, MAX_STORED_ERROR_CHARS)),
            start_time: pending.start_time,
            end_time: Some(end_time),
            latency: Some(latency),
            run_id: run_id.to_string(),
            sequence: pending.sequence,
        };
        debug!(
            "tool_end seq={} tool={} success={} latency={:.2}s",
            record.sequence, record.tool, success, latency
        );
        state.tool_calls.push(record);

        self.update_loop_detection(&mut state, &pending.tool, is_empty);
    }

    pub fn on_tool_error(&self, error: &str, run_id: &str) {
        let mut state = self.lock();
        let Some(pending) = state.pending_tools.remove(run_id) else {
            warn!("orphaned tool_error run_id={}", run_id);
            return;
        };

        let end_time = now_unix();
        let record = ToolCallRecord {
            tool: pending.tool.clone(),
            input_raw: pending.input_raw,
            input_parsed: pending.input_parsed,
            docker_cli_args: pending.docker_cli_args,
            output: None,
            success: false,
            error: Some(head_chars(error, MAX_STORED_ERROR_CHARS)),
            start_time: pending.start_time,
            end_time: Some(end_time),
            latency: Some(end_time - pending.start_time),
            run_id: run_id.to_string(),
            sequence: pending.sequence,
        };
        debug!(
            "tool_error seq={} tool={} error={}",
            record.sequence, record.tool, error
        );
        state.tool_calls.push(record);
    }

    // ── LLM lifecycle ───────────────────────────────────────────────

    pub fn on_llm_start(&self, model: &str, run_id: &str) {
        let mut state = self.lock();
        state.pending_llms.insert(
            run_id.to_string(),
            PendingLlm {
                model: model.to_string(),
                start_time: now_unix(),
            },
        );
    }

    pub fn on_llm_end(&self, token_usage: &HashMap<String, u64>, run_id: &str) {
        let mut state = self.lock();
        let Some(pending) = state.pending_llms.remove(run_id) else {
            return;
        };

        let end_time = now_unix();
        state.llm_calls.push(LLMCallRecord {
            model: pending.model,
            start_time: pending.start_time,
            end_time: Some(end_time),
            latency: Some(end_time - pending.start_time),
            token_usage: token_usage.clone(),
            run_id: run_id.to_string(),
        });
    }

    // ── snapshots ───────────────────────────────────────────────────

    pub fn loop_detected(&self) -> bool {
        self.lock().loop_detected
    }

    pub fn tool_calls(&self) -> Vec<ToolCallRecord> {
        self.lock().tool_calls.clone()
    }

    pub fn llm_calls(&self) -> Vec<LLMCallRecord> {
        self.lock().llm_calls.clone()
    }

    // ── finalization ────────────────────────────────────────────────

    /// Build the finalized record for this turn.
    ///
    /// `loop_detected` lands in the metrics but never overrides the
    /// caller-provided `success`. Internal state is NOT cleared; call
    /// [`clear`](Self::clear) before the next turn.
    pub fn finalize(
        &self,
        task: &str,
        thread_id: Option<&str>,
        success: bool,
        error: Option<&str>,
    ) -> TrajectoryRecord {
        let completed_at = Utc::now();
        let state = self.lock();
        let started_at = state.started_at.unwrap_or(completed_at);
        let metrics = compute_metrics(&state);

        let (task, tool_calls) = if self.redact {
            (
                self.redactor.redact(task).into_owned(),
                state
                    .tool_calls
                    .iter()
                    .map(|tc| self.redact_tool_call(tc))
                    .collect(),
            )
        } else {
            (task.to_string(), state.tool_calls.clone())
        };

        TrajectoryRecord {
            task,
            thread_id: thread_id.map(str::to_string),
            tool_calls,
            llm_calls: state.llm_calls.clone(),
            metrics,
            started_at,
            completed_at: Some(completed_at),
            success,
            error: error.map(str::to_string),
        }
    }

    /// Reset all state for reuse across turns.
    pub fn clear(&self) {
        *self.lock() = RecorderState::default();
    }

    // ── internal helpers ────────────────────────────────────────────

    /// Track loop patterns. Sets the flag but never aborts the turn.
    fn update_loop_detection(&self, state: &mut RecorderState, tool_name: &str, is_empty: bool) {
        if is_empty {
            state.consecutive_empty += 1;
        } else {
            state.consecutive_empty = 0;
        }

        match &mut state.same_tool_streak {
            Some((tool, count)) if tool == tool_name => *count += 1,
            other => *other = Some((tool_name.to_string(), 1)),
        }

        if state.consecutive_empty >= self.max_repeated_calls {
            state.loop_detected = true;
            warn!(
                "loop detected: {} consecutive empty results from {}",
                state.consecutive_empty, tool_name
            );
        }

        if let Some((_, count)) = &state.same_tool_streak {
            if *count >= self.max_repeated_calls + 1 {
                state.loop_detected = true;
                warn!("loop detected: {} called {} times consecutively", tool_name, count);
            }
        }

        // Identical (tool, input) across the whole window.
        let window = self.max_repeated_calls;
        if window > 0 && state.tool_calls.len() >= window {
            let recent = &state.tool_calls[state.tool_calls.len() - window..];
            let tool = &recent[0].tool;
            let input = canonical_input_prefix(&recent[0].input_parsed);
            if recent
                .iter()
                .all(|r| &r.tool == tool && canonical_input_prefix(&r.input_parsed) == input)
            {
                state.loop_detected = true;
                warn!(
                    "loop detected: identical calls to {} repeated {} times",
                    tool_name, window
                );
            }
        }
    }

    fn redact_tool_call(&self, tc: &ToolCallRecord) -> ToolCallRecord {
        let input_parsed = match self
            .redactor
            .redact_value(&Value::Object(tc.input_parsed.clone()))
        {
            Value::Object(map) => map,
            _ => tc.input_parsed.clone(),
        };

        let docker_cli_args = tc.docker_cli_args.as_ref().map(|args| DockerCliArgs {
            command: args.command.clone(),
            args: args
                .args
                .as_deref()
                .map(|a| self.redactor.redact(a).into_owned()),
            cwd: args.cwd.clone(),
            timeout: args.timeout,
            full_command: self.redactor.redact(&args.full_command).into_owned(),
        });

        ToolCallRecord {
            tool: tc.tool.clone(),
            input_raw: self.redactor.redact(&tc.input_raw).into_owned(),
            input_parsed,
            docker_cli_args,
            output: tc
                .output
                .as_deref()
                .map(|o| self.redactor.redact(o).into_owned()),
            success: tc.success,
            error: tc
                .error
                .as_deref()
                .map(|e| self.redactor.redact(e).into_owned()),
            start_time: tc.start_time,
            end_time: tc.end_time,
            latency: tc.latency,
            run_id: tc.run_id.clone(),
            sequence: tc.sequence,
        }
    }
}

impl Default for TrajectoryRecorder {
    fn default() -> Self {
        Self::new(TrajectoryConfig::default())
    }
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn head_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Parse a tool input string: JSON first, then Python-literal repr, then a
/// raw wrapper.
pub fn parse_tool_input(input: &str) -> Map<String, Value> {
    if input.is_empty() {
        return Map::new();
    }
    if let Ok(value) = serde_json::from_str::<Value>(input) {
        return into_mapping(value);
    }
    if let Some(value) = literal::parse(input) {
        return into_mapping(value);
    }
    let mut map = Map::new();
    map.insert("raw".into(), Value::String(input.to_string()));
    map
}

fn into_mapping(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    }
}

/// Expand parsed `docker_cli` args into a structured [`DockerCliArgs`].
fn expand_docker_cli(parsed: &Map<String, Value>) -> Option<DockerCliArgs> {
    let command = stringify(parsed.get("command")?)?;

    let args = parsed.get("args").and_then(stringify).filter(|s| !s.is_empty());
    let cwd = parsed.get("cwd").and_then(stringify).filter(|s| !s.is_empty());
    let timeout = parsed.get("timeout").and_then(Value::as_u64);

    let full_command = match &args {
        Some(args) => format!("docker {command} {args}"),
        None => format!("docker {command}"),
    };

    Some(DockerCliArgs {
        command,
        args,
        cwd,
        timeout,
        full_command,
    })
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Error-first, empty-second: an output that is both counts as a failure.
fn is_error_output(output: &str) -> bool {
    if output.is_empty() {
        return false;
    }
    let text = output.to_lowercase();
    [
        "error:",
        "error (exit",
        "failed",
        "timeout",
        "\"success\": false",
        "'success': false",
    ]
    .iter()
    .any(|pattern| text.contains(pattern))
}

fn is_empty_output(output: &str) -> bool {
    let text = output.trim();
    text.is_empty() || matches!(text, "none" | "null" | "[]" | "{}")
}

/// Stable serialization prefix (sorted keys, first 200 chars) for the
/// identical-call window check.
fn canonical_input_prefix(map: &Map<String, Value>) -> String {
    let sorted: BTreeMap<&String, &Value> = map.iter().collect();
    let serialized = serde_json::to_string(&sorted).unwrap_or_default();
    head_chars(&serialized, 200)
}

fn compute_metrics(state: &RecorderState) -> TrajectoryMetrics {
    let completed: Vec<&ToolCallRecord> = state
        .tool_calls
        .iter()
        .filter(|tc| tc.end_time.is_some())
        .collect();
    let latencies: Vec<f64> = completed.iter().filter_map(|tc| tc.latency).collect();
    let successful = completed.iter().filter(|tc| tc.success).count();
    let total_latency: f64 = latencies.iter().sum();

    let mut total_tokens = 0;
    let mut prompt_tokens = 0;
    let mut completion_tokens = 0;
    for llm in &state.llm_calls {
        total_tokens += llm.token_usage.get("total_tokens").copied().unwrap_or(0);
        prompt_tokens += llm.token_usage.get("prompt_tokens").copied().unwrap_or(0);
        completion_tokens += llm
            .token_usage
            .get("completion_tokens")
            .copied()
            .unwrap_or(0);
    }

    // Unique docker subcommands, first-seen order.
    let mut docker_commands: Vec<String> = Vec::new();
    for tc in &state.tool_calls {
        if let Some(args) = &tc.docker_cli_args {
            if !docker_commands.contains(&args.command) {
                docker_commands.push(args.command.clone());
            }
        }
    }

    TrajectoryMetrics {
        total_tool_calls: completed.len(),
        successful_tool_calls: successful,
        failed_tool_calls: completed.len() - successful,
        total_latency,
        avg_latency: if latencies.is_empty() {
            0.0
        } else {
            total_latency / latencies.len() as f64
        },
        total_llm_calls: state.llm_calls.len(),
        total_tokens,
        prompt_tokens,
        completion_tokens,
        loop_detected: state.loop_detected,
        docker_commands_used: docker_commands,
    }
}
