//! Single seam for every external tool (browser, ffmpeg, ffprobe).
//!
//! Commands run with captured output, a hard timeout and cancellation. On
//! timeout or cancel the child gets SIGTERM, then SIGKILL after a grace period.

use std::{
    ffi::OsString,
    path::PathBuf,
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
};
use tracing::{debug, warn};

use crate::cancel::CancelSignal;

pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub timeout: Duration,
    /// Short name used in logs, e.g. "ffmpeg".
    pub label: String,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(60),
            label: label.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments as lossy strings, for logs and fakes.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    /// Last `lines` lines of stderr.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.trim_end().lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error("failed to run tool: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        cmd: &ToolCommand,
        cancel: &CancelSignal,
    ) -> Result<CommandOutput, RunError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    grace: Duration,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_grace(grace: Duration) -> Self {
        Self { grace }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        cmd: &ToolCommand,
        cancel: &CancelSignal,
    ) -> Result<CommandOutput, RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(tool = %cmd.label, args = ?cmd.arg_strings(), "running external tool");
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RunError::NotFound {
                    program: cmd.program.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        // Drain both pipes concurrently so a chatty child never blocks on a full pipe.
        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = tokio::time::sleep(cmd.timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::Exited(status) => status?,
            Outcome::TimedOut => {
                warn!(tool = %cmd.label, timeout = ?cmd.timeout, "tool timed out, terminating");
                terminate(&mut child, self.grace).await;
                return Err(RunError::Timeout {
                    program: cmd.label.clone(),
                    after: cmd.timeout,
                });
            }
            Outcome::Cancelled => {
                debug!(tool = %cmd.label, "cancelling tool");
                terminate(&mut child, self.grace).await;
                return Err(RunError::Cancelled);
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let output = CommandOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            success: status.success(),
        };
        debug!(tool = %cmd.label, code = ?output.code, "tool finished");
        Ok(output)
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
async fn terminate(child: &mut Child, grace: Duration) {
    if request_stop(child) && tokio::time::timeout(grace, child.wait()).await.is_ok() {
        return;
    }
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill child process");
    }
}

#[cfg(unix)]
fn request_stop(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: plain signal delivery to a pid we spawned and have not reaped.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn request_stop(_child: &Child) -> bool {
    false
}
