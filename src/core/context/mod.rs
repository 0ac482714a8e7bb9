use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Read-only configuration shared by every tool invocation.
///
/// Built once at startup. Per-call cancellation is layered on with
/// [`ExecutionContext::with_cancellation`], which returns a new value rather
/// than mutating the shared one.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    project_root: PathBuf,
    working_directory: PathBuf,
    m42_path: PathBuf,
    cancellation: Option<CancellationToken>,
}

impl ExecutionContext {
    pub fn new(project_root: PathBuf, working_directory: PathBuf, m42_path: PathBuf) -> Self {
        Self {
            project_root,
            working_directory,
            m42_path,
            cancellation: None,
        }
    }

    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            ..self.clone()
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn m42_path(&self) -> &Path {
        &self.m42_path
    }

    /// Executable path rendered for a command line.
    pub fn m42_command(&self) -> String {
        self.m42_path.display().to_string()
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}
