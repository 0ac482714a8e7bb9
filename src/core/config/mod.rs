pub mod loader;
pub mod validation;

pub use loader::{ConfigLoader, ConfigOverrides};
pub use validation::ConfigValidator;

use crate::core::context::ExecutionContext;
use crate::core::error::AppError;
use crate::core::process::{CommandExecutor, ProcessRunner, TokioProcessRunner, DEFAULT_TIMEOUT};
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// File read from the project root.
pub const CONFIG_FILE_NAME: &str = "m42-mcp.toml";

/// Executable used when nothing overrides it, relative to the project root.
pub const DEFAULT_EXECUTABLE: &str = "m42-dev.sh";

/// Contents of `m42-mcp.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Directory commands run in. Relative paths resolve against the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Path to the m42-dev executable. Relative paths resolve against the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m42_path: Option<PathBuf>,

    /// Per-command timeout: a humantime string such as `"90s"` or plain milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout: Option<String>,
}

/// Fully resolved startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub project_root: PathBuf,
    pub working_directory: PathBuf,
    pub m42_path: PathBuf,
    pub default_timeout: Duration,
}

impl ServerConfig {
    /// Defaults for a project rooted at `project_root`.
    pub fn with_project_root<P: Into<PathBuf>>(project_root: P) -> Self {
        let project_root = project_root.into();
        Self {
            working_directory: project_root.clone(),
            m42_path: project_root.join(DEFAULT_EXECUTABLE),
            project_root,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext::new(
            self.project_root.clone(),
            self.working_directory.clone(),
            self.m42_path.clone(),
        )
    }

    pub fn command_executor(&self) -> CommandExecutor {
        self.command_executor_with(Arc::new(TokioProcessRunner))
    }

    pub fn command_executor_with(&self, runner: Arc<dyn ProcessRunner>) -> CommandExecutor {
        CommandExecutor::new(runner, self.default_timeout)
    }
}

/// Parse a timeout given as plain milliseconds or as a humantime duration.
///
/// `0` is accepted and disables the deadline.
pub fn parse_timeout(raw: &str) -> Result<Duration, AppError> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| invalid_timeout(raw, e));
    }
    humantime::parse_duration(trimmed).map_err(|e| invalid_timeout(raw, e))
}

fn invalid_timeout(raw: &str, err: impl std::fmt::Display) -> AppError {
    AppError::new(
        ErrorCategory::ConfigError,
        format!("Invalid timeout value '{}': {}", raw, err),
    )
    .with_code("CFG-002")
}

pub(crate) fn resolve_against(root: &Path, path: PathBuf) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}
