//! Programmatic executor: runs model-authored scripts against injected
//! tools inside a restricted interpreter.
//!
//! The engine exposes only its standard package (primitives, iteration,
//! string/array/map methods) plus the bridged tool functions; there is no
//! file, network, process, or environment access, and `eval` is disabled.
//! Imports go through a resolver that serves only the allow-listed modules.
//! A progress-callback deadline terminates runaway scripts in-process; an
//! outer clock covers scripts blocked inside a native call, where the
//! worker thread cannot be killed and is abandoned with its buffer.

use crate::bridge::{ToolBridge, ToolInvoker};
use crate::shaper::truncate_text;
use dockhand_core::config::ExecutorConfig;
use rhai::{Dynamic, Engine, EvalAltResult, Module, ModuleResolver, Position, Shared};
use serde_json::{Map as JsonMap, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Modules a script may import.
pub const ALLOWED_MODULES: &[&str] = &["json", "re", "time", "text"];

const NO_OUTPUT_MESSAGE: &str = "[No output — use print() to see results]";

pub struct CodeExecutor {
    tools: Vec<(String, Arc<dyn ToolInvoker>)>,
    timeout: Duration,
    max_output_chars: usize,
}

impl CodeExecutor {
    pub fn new(bridge: &ToolBridge, config: &ExecutorConfig) -> Self {
        Self {
            tools: bridge.invokers().to_vec(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_chars: config.max_output_chars,
        }
    }

    /// Run a script and return everything it printed.
    ///
    /// Engine errors come back inline with an `[ERROR]` prefix (the model
    /// authored the failing code, so the full diagnostic is wanted);
    /// deadline expiry appends a `[TIMEOUT]` line.
    pub async fn execute(&self, code: &str) -> String {
        let buffer = Arc::new(Mutex::new(String::new()));

        let code = code.to_string();
        let tools = self.tools.clone();
        let timeout = self.timeout;
        let worker_buffer = buffer.clone();
        let worker =
            tokio::task::spawn_blocking(move || run_sandboxed(&code, &tools, timeout, worker_buffer));

        let grace = timeout + Duration::from_secs(2);
        if tokio::time::timeout(grace, worker).await.is_err() {
            append(
                &buffer,
                &format!(
                    "\n[TIMEOUT] Code execution exceeded {}s limit\n",
                    timeout.as_secs()
                ),
            );
        }

        let captured = buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if captured.is_empty() {
            return NO_OUTPUT_MESSAGE.to_string();
        }
        truncate_text(&captured, self.max_output_chars)
    }
}

fn run_sandboxed(
    code: &str,
    tools: &[(String, Arc<dyn ToolInvoker>)],
    timeout: Duration,
    buffer: Arc<Mutex<String>>,
) {
    let mut engine = Engine::new();
    engine.disable_symbol("eval");
    engine.set_module_resolver(SandboxResolver::new());

    let print_buffer = buffer.clone();
    engine.on_print(move |text| {
        append(&print_buffer, text);
        append(&print_buffer, "\n");
    });
    let debug_buffer = buffer.clone();
    engine.on_debug(move |text, _source, _pos| {
        append(&debug_buffer, text);
        append(&debug_buffer, "\n");
    });

    let deadline = Instant::now() + timeout;
    engine.on_progress(move |_ops| {
        if Instant::now() >= deadline {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });

    for (name, invoker) in tools {
        let invoker = invoker.clone();
        engine.register_fn(name.as_str(), move |kwargs: rhai::Map| -> String {
            invoker.invoke(map_to_kwargs(kwargs))
        });
    }

    if let Err(err) = engine.run(code) {
        match *err {
            EvalAltResult::ErrorTerminated(..) => append(
                &buffer,
                &format!(
                    "\n[TIMEOUT] Code execution exceeded {}s limit\n",
                    timeout.as_secs()
                ),
            ),
            other => append(&buffer, &format!("\n[ERROR] {other}\n")),
        }
    }
}

fn append(buffer: &Arc<Mutex<String>>, text: &str) {
    buffer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_str(text);
}

fn map_to_kwargs(map: rhai::Map) -> JsonMap<String, Value> {
    let mut kwargs = JsonMap::new();
    for (key, value) in map {
        let json = rhai::serde::from_dynamic::<Value>(&value).unwrap_or(Value::Null);
        kwargs.insert(key.to_string(), json);
    }
    kwargs
}

fn runtime_error(message: String) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(Dynamic::from(message), Position::NONE).into()
}

/// Serves only the allow-listed modules; anything else is an error the
/// script sees as `Module '<name>' is not allowed`.
#[derive(Debug)]
struct SandboxResolver {
    modules: HashMap<String, Shared<Module>>,
}

impl SandboxResolver {
    fn new() -> Self {
        let mut modules: HashMap<String, Shared<Module>> = HashMap::new();
        modules.insert("json".into(), json_module().into());
        modules.insert("re".into(), re_module().into());
        modules.insert("time".into(), time_module().into());
        modules.insert("text".into(), text_module().into());
        Self { modules }
    }
}

impl ModuleResolver for SandboxResolver {
    fn resolve(
        &self,
        _engine: &Engine,
        _source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        match self.modules.get(path) {
            Some(module) => Ok(module.clone()),
            None => Err(EvalAltResult::ErrorRuntime(
                Dynamic::from(format!(
                    "Module '{path}' is not allowed. Allowed modules: {}",
                    ALLOWED_MODULES.join(", ")
                )),
                pos,
            )
            .into()),
        }
    }
}

fn json_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("dumps", |value: Dynamic| -> Result<String, Box<EvalAltResult>> {
        let json: Value = rhai::serde::from_dynamic(&value)?;
        Ok(json.to_string())
    });
    module.set_native_fn("loads", |text: &str| -> Result<Dynamic, Box<EvalAltResult>> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| runtime_error(format!("invalid JSON: {e}")))?;
        rhai::serde::to_dynamic(value)
    });
    module
}

fn compile(pattern: &str) -> Result<regex::Regex, Box<EvalAltResult>> {
    regex::Regex::new(pattern).map_err(|e| runtime_error(format!("invalid pattern: {e}")))
}

fn re_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn(
        "is_match",
        |pattern: &str, text: &str| -> Result<bool, Box<EvalAltResult>> {
            Ok(compile(pattern)?.is_match(text))
        },
    );
    module.set_native_fn(
        "find",
        |pattern: &str, text: &str| -> Result<String, Box<EvalAltResult>> {
            Ok(compile(pattern)?
                .find(text)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default())
        },
    );
    module.set_native_fn(
        "find_all",
        |pattern: &str, text: &str| -> Result<rhai::Array, Box<EvalAltResult>> {
            Ok(compile(pattern)?
                .find_iter(text)
                .map(|m| Dynamic::from(m.as_str().to_string()))
                .collect())
        },
    );
    module.set_native_fn(
        "replace",
        |pattern: &str, text: &str, replacement: &str| -> Result<String, Box<EvalAltResult>> {
            Ok(compile(pattern)?.replace_all(text, replacement).into_owned())
        },
    );
    module
}

fn time_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("now", || -> Result<f64, Box<EvalAltResult>> {
        Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64())
    });
    module
}

fn text_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("dedent", |text: &str| -> Result<String, Box<EvalAltResult>> {
        let indent_of = |line: &str| line.chars().take_while(|c| c.is_whitespace()).count();
        let margin = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(indent_of)
            .min()
            .unwrap_or(0);
        Ok(text
            .lines()
            .map(|line| {
                let strip = indent_of(line).min(margin);
                line.chars().skip(strip).collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n"))
    });
    module.set_native_fn(
        "indent",
        |text: &str, prefix: &str| -> Result<String, Box<EvalAltResult>> {
            Ok(text
                .lines()
                .map(|line| {
                    if line.trim().is_empty() {
                        line.to_string()
                    } else {
                        format!("{prefix}{line}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"))
        },
    );
    module.set_native_fn(
        "fill",
        |text: &str, width: i64| -> Result<String, Box<EvalAltResult>> {
            let width = width.max(1) as usize;
            let mut lines: Vec<String> = Vec::new();
            let mut current = String::new();
            for word in text.split_whitespace() {
                if !current.is_empty() && current.len() + 1 + word.len() > width {
                    lines.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
            if !current.is_empty() {
                lines.push(current);
            }
            Ok(lines.join("\n"))
        },
    );
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor_with(
        tools: Vec<(String, Arc<dyn ToolInvoker>)>,
        timeout_secs: u64,
        max_output_chars: usize,
    ) -> CodeExecutor {
        CodeExecutor {
            tools,
            timeout: Duration::from_secs(timeout_secs),
            max_output_chars,
        }
    }

    fn bare_executor() -> CodeExecutor {
        executor_with(Vec::new(), 5, 8000)
    }

    struct FakeDockerCli;

    impl ToolInvoker for FakeDockerCli {
        fn invoke(&self, kwargs: JsonMap<String, Value>) -> String {
            let command = kwargs
                .get("command")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let args = kwargs.get("args").and_then(Value::as_str).unwrap_or_default();
            format!("OK: {command} {args}")
        }
    }

    #[tokio::test]
    async fn test_basic_print() {
        let out = bare_executor().execute(r#"print("hello world");"#).await;
        assert!(out.contains("hello world"));
    }

    #[tokio::test]
    async fn test_loop_execution() {
        let out = bare_executor()
            .execute("for i in 0..3 { print(`item ${i}`); }")
            .await;
        assert!(out.contains("item 0"));
        assert!(out.contains("item 1"));
        assert!(out.contains("item 2"));
    }

    #[tokio::test]
    async fn test_variable_and_conditional() {
        let code = r#"
let x = 10;
if x > 5 {
    print("big");
} else {
    print("small");
}
"#;
        let out = bare_executor().execute(code).await;
        assert!(out.contains("big"));
    }

    #[tokio::test]
    async fn test_json_import_allowed() {
        let code = r#"
import "json" as json;
print(json::dumps(#{k: 1}));
"#;
        let out = bare_executor().execute(code).await;
        assert!(out.contains(r#"{"k":1}"#), "{out}");
    }

    #[tokio::test]
    async fn test_json_loads_roundtrip() {
        let code = r#"
import "json" as json;
let parsed = json::loads("{\"name\": \"web\"}");
print(parsed.name);
"#;
        let out = bare_executor().execute(code).await;
        assert!(out.contains("web"));
    }

    #[tokio::test]
    async fn test_os_import_blocked() {
        let out = bare_executor()
            .execute(r#"import "os" as os; print(os::getcwd());"#)
            .await;
        assert!(out.contains("[ERROR]"));
        assert!(out.contains("not allowed"));
    }

    #[tokio::test]
    async fn test_eval_disabled() {
        let out = bare_executor().execute(r#"eval("1 + 1")"#).await;
        assert!(out.contains("[ERROR]"));
    }

    #[tokio::test]
    async fn test_re_module() {
        let code = r#"
import "re" as re;
print(re::find("[0-9]+", "port 8080 open"));
print(re::is_match("nginx", "nginx:alpine"));
"#;
        let out = bare_executor().execute(code).await;
        assert!(out.contains("8080"));
        assert!(out.contains("true"));
    }

    #[tokio::test]
    async fn test_tool_injection() {
        let executor = executor_with(
            vec![("docker_cli".to_string(), Arc::new(FakeDockerCli) as Arc<dyn ToolInvoker>)],
            5,
            8000,
        );
        let code = r#"
let result = docker_cli(#{command: "ps", args: "-a"});
print(result);
"#;
        let out = executor.execute(code).await;
        assert!(out.contains("OK: ps -a"), "{out}");
    }

    #[tokio::test]
    async fn test_multi_tool_calls() {
        struct Counting(Mutex<Vec<String>>);
        impl ToolInvoker for Counting {
            fn invoke(&self, kwargs: JsonMap<String, Value>) -> String {
                let command = kwargs
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.0
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(command.clone());
                format!("done: {command}")
            }
        }

        let counting = Arc::new(Counting(Mutex::new(Vec::new())));
        let executor = executor_with(
            vec![("docker_cli".to_string(), counting.clone() as Arc<dyn ToolInvoker>)],
            5,
            8000,
        );
        let code = r#"
for image in ["redis:alpine", "nginx:alpine", "postgres:15"] {
    let result = docker_cli(#{command: "pull", args: image});
    print(result);
}
"#;
        let out = executor.execute(code).await;
        assert!(out.contains("done: pull"));
        assert_eq!(
            counting.0.lock().unwrap_or_else(PoisonError::into_inner).len(),
            3
        );
    }

    #[tokio::test]
    async fn test_no_output_message() {
        let out = bare_executor().execute("let x = 42;").await;
        assert!(out.starts_with("[No output"));
    }

    #[tokio::test]
    async fn test_output_truncation() {
        let executor = executor_with(Vec::new(), 5, 100);
        let code = r#"
let s = "";
for i in 0..500 { s += "A"; }
print(s);
"#;
        let out = executor.execute(code).await;
        assert!(out.contains("TRUNCATED"));
    }

    #[tokio::test]
    async fn test_timeout_protection() {
        let executor = executor_with(Vec::new(), 1, 8000);
        let out = executor.execute("loop { }").await;
        assert!(out.contains("[TIMEOUT] Code execution exceeded 1s limit"), "{out}");
    }

    #[tokio::test]
    async fn test_exception_in_code() {
        let out = bare_executor().execute(r#"throw "test error";"#).await;
        assert!(out.contains("[ERROR]"));
        assert!(out.contains("test error"));
    }

    #[tokio::test]
    async fn test_kwargs_convert_non_string_values() {
        struct EchoTimeout;
        impl ToolInvoker for EchoTimeout {
            fn invoke(&self, kwargs: JsonMap<String, Value>) -> String {
                format!("timeout={}", kwargs.get("timeout").cloned().unwrap_or(json!(null)))
            }
        }

        let executor = executor_with(
            vec![("docker_cli".to_string(), Arc::new(EchoTimeout) as Arc<dyn ToolInvoker>)],
            5,
            8000,
        );
        let out = executor
            .execute(r#"print(docker_cli(#{command: "ps", timeout: 60}));"#)
            .await;
        assert!(out.contains("timeout=60"));
    }
}
