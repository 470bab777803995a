//! Process-wide workspace root for filesystem isolation.
//!
//! Every path argument coming from the agent is resolved under this root;
//! resolution reinterprets absolute paths as workspace-relative and rejects
//! anything that would escape. The root is chosen from the environment at
//! startup and is immutable afterwards; reconfiguration requires a process
//! restart.

use crate::error::{DockhandError, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

pub const WORKSPACE_ROOT_ENV_VAR: &str = "DOCKER_WORKSPACE_ROOT";
pub const DEFAULT_WORKSPACE_ROOT: &str = "/tmp/multi-agent-docker-workspace";

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `root`, creating the directory if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Create a workspace from `DOCKER_WORKSPACE_ROOT`, falling back to the
    /// default location.
    pub fn from_env() -> Result<Self> {
        let root = std::env::var(WORKSPACE_ROOT_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_WORKSPACE_ROOT.to_string());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` under the workspace root.
    ///
    /// Leading `/` is treated as the workspace root itself, so `/Dockerfile`
    /// resolves to `<root>/Dockerfile`. `..` components are normalized
    /// lexically; a path whose normalized form leaves the root fails.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                    if !resolved.starts_with(&self.root) {
                        return Err(DockhandError::PathEscape(
                            self.root.display().to_string(),
                        ));
                    }
                }
                Component::Normal(part) => resolved.push(part),
            }
        }
        Ok(resolved)
    }
}

static GLOBAL: OnceLock<Workspace> = OnceLock::new();

/// The process-wide workspace, initialized from the environment on first
/// access.
pub fn global() -> Result<&'static Workspace> {
    if let Some(workspace) = GLOBAL.get() {
        return Ok(workspace);
    }
    let workspace = Workspace::from_env()?;
    Ok(GLOBAL.get_or_init(|| workspace))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_absolute_path_resolves_under_root() {
        let (dir, ws) = temp_workspace();
        let resolved = ws.resolve("/Dockerfile").unwrap();
        assert_eq!(resolved, dir.path().join("Dockerfile"));
    }

    #[test]
    fn test_relative_path_resolves_under_root() {
        let (dir, ws) = temp_workspace();
        let resolved = ws.resolve("app/docker-compose.yml").unwrap();
        assert_eq!(resolved, dir.path().join("app/docker-compose.yml"));
    }

    #[test]
    fn test_escape_rejected() {
        let (_dir, ws) = temp_workspace();
        assert!(ws.resolve("../../outside").is_err());
    }

    #[test]
    fn test_internal_parent_components_are_normalized() {
        let (dir, ws) = temp_workspace();
        let resolved = ws.resolve("app/../config").unwrap();
        assert_eq!(resolved, dir.path().join("config"));
    }

    #[test]
    fn test_root_boundary_accepted() {
        let (dir, ws) = temp_workspace();
        let resolved = ws.resolve("/").unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[test]
    fn test_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deeper/workspace");
        let ws = Workspace::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(ws.root(), nested);
    }
}
