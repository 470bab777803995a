//! Output shaping to keep tool responses inside the model's budget.
//!
//! Strings keep their head and tail around a labelled elision (log
//! diagnostics often live at both ends); lists and maps are cut at an item
//! budget with a sentinel recording how much was dropped. JSON envelopes get
//! both passes: inner truncation preserves structure, then the serialized
//! whole is held to a hard response budget.

use dockhand_core::config::ShaperConfig;
use serde_json::{json, Map, Value};

/// Truncate a string to `max_chars` code points, keeping the first and last
/// halves around an elision label. Strings within budget pass unchanged.
pub fn truncate_text(value: &str, max_chars: usize) -> String {
    let len = value.chars().count();
    if len <= max_chars {
        return value.to_string();
    }
    let half = max_chars / 2;
    let omitted = len - max_chars;
    let head: String = value.chars().take(half).collect();
    let tail: String = if half > 0 {
        value.chars().skip(len - half).collect()
    } else {
        String::new()
    };
    format!("{head}\n... [TRUNCATED {omitted} chars of logs] ...\n{tail}")
}

#[derive(Debug, Clone, Copy)]
pub struct OutputShaper {
    budgets: ShaperConfig,
}

impl OutputShaper {
    pub fn new(budgets: ShaperConfig) -> Self {
        Self { budgets }
    }

    pub fn budgets(&self) -> &ShaperConfig {
        &self.budgets
    }

    /// Apply the whole-response string budget.
    pub fn response_text(&self, value: &str) -> String {
        truncate_text(value, self.budgets.max_response_chars)
    }

    /// Recursively truncate strings, lists, and maps inside a JSON tree.
    pub fn truncate_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(truncate_text(s, self.budgets.max_string_chars)),
            Value::Array(items) => {
                let mut out: Vec<Value> = items
                    .iter()
                    .take(self.budgets.max_list_items)
                    .map(|item| self.truncate_value(item))
                    .collect();
                if items.len() > self.budgets.max_list_items {
                    out.push(json!({
                        "_truncated_items": items.len() - self.budgets.max_list_items
                    }));
                }
                Value::Array(out)
            }
            Value::Object(map) => {
                let mut out = Map::new();
                for (idx, (key, item)) in map.iter().enumerate() {
                    if idx >= self.budgets.max_dict_items {
                        out.insert(
                            "_truncated_keys".into(),
                            json!(map.len() - self.budgets.max_dict_items),
                        );
                        break;
                    }
                    out.insert(key.clone(), self.truncate_value(item));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    /// Serialize a JSON envelope: inner truncation first, then the hard
    /// response budget over the serialization.
    pub fn shape_json(&self, data: &Value) -> String {
        let truncated = self.truncate_value(data);
        let serialized =
            serde_json::to_string_pretty(&truncated).unwrap_or_else(|_| truncated.to_string());
        truncate_text(&serialized, self.budgets.max_response_chars)
    }

    /// `{"success": true, ...}` envelope.
    pub fn ok(&self, data: Map<String, Value>) -> String {
        let mut envelope = Map::new();
        envelope.insert("success".into(), Value::Bool(true));
        envelope.extend(data);
        self.shape_json(&Value::Object(envelope))
    }

    /// `{"success": false, "error": ..., ...}` envelope.
    pub fn error(&self, message: &str, data: Map<String, Value>) -> String {
        let mut envelope = Map::new();
        envelope.insert("success".into(), Value::Bool(false));
        envelope.insert("error".into(), Value::String(message.to_string()));
        envelope.extend(data);
        self.shape_json(&Value::Object(envelope))
    }
}

impl Default for OutputShaper {
    fn default() -> Self {
        Self::new(ShaperConfig::default())
    }
}
