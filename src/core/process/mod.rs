//! External process execution.
//!
//! [`ProcessRunner`] runs one shell line to completion, deadline or
//! cancellation. [`CommandExecutor`] sits on top of it and folds every outcome
//! into a [`ToolResult`] so tool handlers never see a raised error.

use crate::core::context::ExecutionContext;
use crate::core::error::AppError;
use crate::core::output::SuccessPolicy;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use m42_types::{CommandDescriptor, CommandOutput, ToolResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Applied when a descriptor does not carry its own timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How long a terminated process gets to exit before it is force-killed.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to start command `{command}`: {source}")]
    Start {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("Command cancelled")]
    Cancelled,
    #[error("I/O error while waiting for command: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProcessError> for AppError {
    fn from(err: ProcessError) -> Self {
        let (category, code) = match &err {
            ProcessError::Start { .. } => (ErrorCategory::ProcessStartError, "PROC-001"),
            ProcessError::Timeout { .. } => (ErrorCategory::TimeoutError, "PROC-002"),
            ProcessError::Cancelled => (ErrorCategory::CancelledError, "PROC-003"),
            ProcessError::Io(_) => (ErrorCategory::IoError, "PROC-004"),
        };
        AppError::new(category, err.to_string()).with_code(code)
    }
}

/// A fully resolved invocation: nothing left to default.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub shell_line: String,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    /// `None` means no deadline.
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl ProcessRequest {
    /// Fill in cwd, timeout and cancellation from the context where the descriptor is silent.
    pub fn resolve(
        descriptor: &CommandDescriptor,
        context: &ExecutionContext,
        default_timeout: Duration,
    ) -> Self {
        let timeout_ms = descriptor
            .options
            .timeout_ms
            .unwrap_or(default_timeout.as_millis() as u64);

        Self {
            shell_line: descriptor.shell_line(),
            cwd: descriptor
                .options
                .cwd
                .clone()
                .unwrap_or_else(|| context.working_directory().to_path_buf()),
            env: descriptor.options.env.clone(),
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            cancellation: context.cancellation().cloned(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync + 'static {
    /// Run to completion. A non-zero exit is a normal output, not an error.
    async fn run(&self, request: &ProcessRequest) -> Result<CommandOutput, ProcessError>;
}

/// Runs requests through the platform shell on the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

enum Outcome {
    Completed {
        status: std::io::Result<std::process::ExitStatus>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    Cancelled,
    TimedOut(Duration),
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<CommandOutput, ProcessError> {
        if request.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }

        let mut command = shell_command(&request.shell_line);
        command
            .current_dir(&request.cwd)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ProcessError::Start {
            command: request.shell_line.clone(),
            source,
        })?;
        // Captured now: `Child::id` goes blank once the leader has been reaped,
        // but its process group lives on while any member holds the pipes.
        let pid = child.id();
        debug!(
            command = %request.shell_line,
            cwd = %request.cwd.display(),
            pid,
            "spawned process"
        );

        let mut stdout = drain(child.stdout.take());
        let mut stderr = drain(child.stderr.take());

        let cancelled = async {
            match &request.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let deadline = async {
            match request.timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };
        // Done means the leader exited and both pipes reached EOF.
        let completed = async {
            let status = child.wait().await;
            let (stdout, stderr) = tokio::join!(&mut stdout, &mut stderr);
            Outcome::Completed {
                status,
                stdout: stdout.unwrap_or_default(),
                stderr: stderr.unwrap_or_default(),
            }
        };

        let outcome = tokio::select! {
            biased;
            outcome = completed => outcome,
            _ = cancelled => Outcome::Cancelled,
            limit = deadline => Outcome::TimedOut(limit),
        };

        match outcome {
            Outcome::Completed {
                status,
                stdout,
                stderr,
            } => {
                let status = status?;
                Ok(CommandOutput::new(
                    &String::from_utf8_lossy(&stdout),
                    &String::from_utf8_lossy(&stderr),
                    status.code(),
                ))
            }
            Outcome::Cancelled => {
                warn!(command = %request.shell_line, "command cancelled, terminating");
                terminate(&mut child, pid).await;
                stdout.abort();
                stderr.abort();
                Err(ProcessError::Cancelled)
            }
            Outcome::TimedOut(limit) => {
                let timeout_ms = limit.as_millis() as u64;
                warn!(command = %request.shell_line, timeout_ms, "command timed out, terminating");
                terminate(&mut child, pid).await;
                stdout.abort();
                stderr.abort();
                Err(ProcessError::Timeout { timeout_ms })
            }
        }
    }
}

#[cfg(unix)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(not(unix))]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

fn drain<R>(stream: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buffer).await;
        }
        buffer
    })
}

/// SIGTERM the whole group, wait out the grace period for the leader, then
/// SIGKILL whatever is left in the group.
#[cfg(unix)]
async fn terminate(child: &mut Child, pid: Option<u32>) {
    use nix::sys::signal::Signal;

    if let Some(pid) = pid {
        signal_group(pid, Signal::SIGTERM);
        if tokio::time::timeout(TERMINATION_GRACE, child.wait())
            .await
            .is_err()
        {
            debug!(pid, "process ignored SIGTERM, sending SIGKILL");
        }
        signal_group(pid, Signal::SIGKILL);
    }
    let _ = child.kill().await;
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _pid: Option<u32>) {
    let _ = child.kill().await;
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    let group = nix::unistd::Pid::from_raw(pid as i32);
    match nix::sys::signal::killpg(group, signal) {
        Ok(()) => {}
        Err(nix::errno::Errno::ESRCH) => debug!(pid, ?signal, "process group already gone"),
        Err(err) => warn!(pid, ?signal, error = %err, "failed to signal process group"),
    }
}

/// Shared entry point used by every command-backed tool.
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn ProcessRunner>,
    default_timeout: Duration,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(Arc::new(TokioProcessRunner), DEFAULT_TIMEOUT)
    }
}

impl CommandExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>, default_timeout: Duration) -> Self {
        Self {
            runner,
            default_timeout,
        }
    }

    pub async fn run(
        &self,
        descriptor: &CommandDescriptor,
        context: &ExecutionContext,
    ) -> Result<CommandOutput, ProcessError> {
        let request = ProcessRequest::resolve(descriptor, context, self.default_timeout);
        self.runner.run(&request).await
    }

    /// Run and judge by exit code. Never fails; problems come back as [`ToolResult::Failure`].
    pub async fn execute(
        &self,
        descriptor: &CommandDescriptor,
        context: &ExecutionContext,
    ) -> ToolResult<CommandOutput> {
        self.execute_with(descriptor, context, SuccessPolicy::ExitCode)
            .await
    }

    pub async fn execute_with(
        &self,
        descriptor: &CommandDescriptor,
        context: &ExecutionContext,
        policy: SuccessPolicy,
    ) -> ToolResult<CommandOutput> {
        let started = Instant::now();
        let result = self.run(descriptor, context).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) if policy.judge(&output) => {
                let exit_code = output.exit_code;
                ToolResult::success(output)
                    .with_meta("exitCode", exit_code)
                    .with_meta("durationMs", duration_ms)
            }
            Ok(output) => {
                debug!(
                    command = %descriptor.command,
                    exit_code = output.exit_code,
                    "command reported failure"
                );
                ToolResult::failure(output.stderr)
                    .with_meta("exitCode", output.exit_code)
                    .with_meta("stdout", output.stdout)
                    .with_meta("durationMs", duration_ms)
            }
            Err(err) => {
                warn!(command = %descriptor.command, error = %err, "command did not complete");
                ToolResult::failure(err.to_string()).with_meta("durationMs", duration_ms)
            }
        }
    }
}
