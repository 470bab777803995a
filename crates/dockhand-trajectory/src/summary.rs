//! One-line trajectory summaries for the external sink.
//!
//! Format: `task -> cmd1 -> cmd2 -> ... -> outcome`, with loop and token
//! markers appended, capped at 800 chars.

use crate::models::TrajectoryRecord;
use serde_json::Value;

const MAX_SUMMARY_CHARS: usize = 800;

pub fn summarize_trajectory(record: &TrajectoryRecord) -> String {
    let mut parts: Vec<String> = vec![record.task.clone()];

    for tc in &record.tool_calls {
        if let Some(args) = &tc.docker_cli_args {
            parts.push(args.full_command.clone());
        } else if !tc.input_parsed.is_empty() {
            let preview = tc
                .input_parsed
                .iter()
                .take(3)
                .map(|(key, value)| format!("{key}={}", preview_value(value)))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("{}({})", tc.tool, preview));
        } else {
            parts.push(tc.tool.clone());
        }
    }

    let m = &record.metrics;
    if m.total_tool_calls > 0 {
        let rate = m.successful_tool_calls as f64 / m.total_tool_calls as f64;
        if rate >= 1.0 {
            parts.push("success".into());
        } else if rate >= 0.5 {
            parts.push(format!(
                "partial ({}/{})",
                m.successful_tool_calls, m.total_tool_calls
            ));
        } else {
            parts.push(format!(
                "failed ({}/{})",
                m.successful_tool_calls, m.total_tool_calls
            ));
        }
    } else {
        parts.push("no tools executed".into());
    }

    if m.loop_detected {
        parts.push("LOOP_DETECTED".into());
    }
    if m.total_tokens > 0 {
        parts.push(format!("tokens={}", m.total_tokens));
    }

    let summary = parts.join(" -> ");
    if summary.chars().count() > MAX_SUMMARY_CHARS {
        let head: String = summary.chars().take(MAX_SUMMARY_CHARS - 3).collect();
        format!("{head}...")
    } else {
        summary
    }
}

fn preview_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        other => other.to_string(),
    };
    text.chars().take(40).collect()
}
