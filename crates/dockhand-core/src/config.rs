use crate::workspace::{DEFAULT_WORKSPACE_ROOT, WORKSPACE_ROOT_ENV_VAR};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Top-level configuration, loaded from TOML with environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub gateway: GatewayConfig,
    pub shaper: ShaperConfig,
    pub executor: ExecutorConfig,
    pub trajectory: TrajectoryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            gateway: GatewayConfig::default(),
            shaper: ShaperConfig::default(),
            executor: ExecutorConfig::default(),
            trajectory: TrajectoryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults plus any environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply the documented environment variables on top of current values.
    pub fn apply_env(&mut self) {
        env_override(WORKSPACE_ROOT_ENV_VAR, &mut self.workspace.root);
        env_override(GatewayConfig::TIMEOUT_ENV_VAR, &mut self.gateway.timeout_secs);
        env_override(
            ShaperConfig::MAX_STRING_CHARS_ENV_VAR,
            &mut self.shaper.max_string_chars,
        );
        env_override(
            ShaperConfig::MAX_LIST_ITEMS_ENV_VAR,
            &mut self.shaper.max_list_items,
        );
        env_override(
            ShaperConfig::MAX_DICT_ITEMS_ENV_VAR,
            &mut self.shaper.max_dict_items,
        );
        env_override(
            ShaperConfig::MAX_RESPONSE_CHARS_ENV_VAR,
            &mut self.shaper.max_response_chars,
        );
        env_override(
            ExecutorConfig::TIMEOUT_ENV_VAR,
            &mut self.executor.timeout_secs,
        );
        env_override(
            ExecutorConfig::MAX_OUTPUT_CHARS_ENV_VAR,
            &mut self.executor.max_output_chars,
        );
        env_override(
            TrajectoryConfig::MAX_REPEATED_CALLS_ENV_VAR,
            &mut self.trajectory.max_repeated_calls,
        );
    }
}

fn env_override<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        if let Ok(value) = raw.parse() {
            *slot = value;
        } else {
            tracing::warn!("ignoring unparseable {}={}", key, raw);
        }
    }
}

/// Workspace root under which every path argument must resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_WORKSPACE_ROOT.into(),
        }
    }
}

/// Command gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Docker binary to invoke.
    pub docker_binary: String,
    /// Per-command wall clock in seconds.
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub const TIMEOUT_ENV_VAR: &'static str = "DOCKER_CLI_TIMEOUT_SECONDS";
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            docker_binary: "docker".into(),
            timeout_secs: 30,
        }
    }
}

/// Output shaper budgets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaperConfig {
    pub max_string_chars: usize,
    pub max_list_items: usize,
    pub max_dict_items: usize,
    /// Applied to the whole serialized response after inner truncation.
    pub max_response_chars: usize,
}

impl ShaperConfig {
    pub const MAX_STRING_CHARS_ENV_VAR: &'static str = "DOCKER_TOOL_MAX_STRING_CHARS";
    pub const MAX_LIST_ITEMS_ENV_VAR: &'static str = "DOCKER_TOOL_MAX_LIST_ITEMS";
    pub const MAX_DICT_ITEMS_ENV_VAR: &'static str = "DOCKER_TOOL_MAX_DICT_ITEMS";
    pub const MAX_RESPONSE_CHARS_ENV_VAR: &'static str = "DOCKER_TOOL_MAX_RESPONSE_CHARS";
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            max_string_chars: 1200,
            max_list_items: 120,
            max_dict_items: 200,
            max_response_chars: 4000,
        }
    }
}

/// Programmatic executor configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wall clock for one script evaluation, in seconds.
    pub timeout_secs: u64,
    /// Budget for the captured output.
    pub max_output_chars: usize,
}

impl ExecutorConfig {
    pub const TIMEOUT_ENV_VAR: &'static str = "CODE_EXEC_TIMEOUT_SECONDS";
    pub const MAX_OUTPUT_CHARS_ENV_VAR: &'static str = "CODE_EXEC_MAX_OUTPUT_CHARS";
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_output_chars: 8000,
        }
    }
}

/// Trajectory recorder configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Window for the loop-detection patterns.
    pub max_repeated_calls: usize,
    /// Credential redaction on finalize. Disable for tests only.
    pub redact: bool,
}

impl TrajectoryConfig {
    pub const MAX_REPEATED_CALLS_ENV_VAR: &'static str = "TRAJECTORY_MAX_REPEATED_CALLS";
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            max_repeated_calls: 5,
            redact: true,
        }
    }
}
