//! Trajectory capture for dockhand agent turns.
//!
//! The recorder observes tool and LLM lifecycle events, detects loop
//! patterns, redacts credentials, and emits one structured record per turn
//! for external sinks to persist.

pub mod literal;
pub mod models;
pub mod recorder;
pub mod summary;

pub use models::{
    DockerCliArgs, LLMCallRecord, ToolCallRecord, TrajectoryMetrics, TrajectoryRecord,
};
pub use recorder::TrajectoryRecorder;
pub use summary::summarize_trajectory;
