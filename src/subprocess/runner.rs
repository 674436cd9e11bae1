use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::error::ProcessError;
use super::tree::{kill_process_tree, ProcessTree, SystemProcessTree};
use crate::cancel::CancellationToken;

#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// How many trailing `args` are file paths
    pub file_args: usize,
}

impl ProcessCommand {
    /// Render the command line for logs and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// The process was killed because the run was cancelled
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "exit code 0"),
            ExitStatus::Error(code) => write!(f, "exit code {}", code),
            ExitStatus::Signal(signal) => write!(f, "signal {}", signal_name(*signal)),
        }
    }
}

fn signal_name(signal: i32) -> String {
    match signal {
        1 => "SIGHUP".to_string(),
        2 => "SIGINT".to_string(),
        9 => "SIGKILL".to_string(),
        15 => "SIGTERM".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;

    /// Run a command, killing its process tree if `cancel` fires first.
    ///
    /// A cancelled process still yields `Ok` with `cancelled` set; only a
    /// token that was already cancelled before spawning yields
    /// [`ProcessError::Cancelled`].
    async fn run_cancellable(
        &self,
        command: ProcessCommand,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError>;
}

pub struct TokioProcessRunner {
    tree: Arc<dyn ProcessTree>,
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(Arc::new(SystemProcessTree))
    }
}

impl TokioProcessRunner {
    pub fn new(tree: Arc<dyn ProcessTree>) -> Self {
        Self { tree }
    }

    /// Log command execution details
    fn log_command_start(command: &ProcessCommand) {
        tracing::debug!("Executing subprocess: {}", command.display());

        // Log argument sizes to help debug E2BIG errors
        let args_size: usize = command.args.iter().map(|s| s.len()).sum();
        if args_size > 10000 {
            tracing::debug!(
                "Large arguments detected: {} args ({} files), {} total bytes",
                command.args.len(),
                command.file_args,
                args_size
            );
        }

        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }
    }

    /// Configure the command with working directory and pipes
    fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);

        // Own process group so the whole tree can be signalled together
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd.args(&command.args);

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        cmd
    }

    /// Convert process exit status to our ExitStatus enum
    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    /// Parse signal status on Unix systems
    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    /// Build ProcessOutput from command output
    fn build_output(
        output: std::process::Output,
        duration: Duration,
        cancelled: bool,
    ) -> ProcessOutput {
        ProcessOutput {
            status: Self::parse_exit_status(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration,
            cancelled,
        }
    }

    /// Log the process execution result
    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        let command_str = command.display();

        match &result.status {
            ExitStatus::Success => {
                tracing::debug!(
                    "Subprocess completed successfully in {:?}: {}",
                    result.duration,
                    command_str
                );
                tracing::trace!("Stdout length: {} bytes", result.stdout.len());
                tracing::trace!("Stderr length: {} bytes", result.stderr.len());
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "Subprocess failed with exit code {} in {:?}: {}",
                    code,
                    result.duration,
                    command_str
                );
            }
            ExitStatus::Signal(signal) => {
                tracing::debug!(
                    "Subprocess terminated by signal {} in {:?}: {}",
                    signal,
                    result.duration,
                    command_str
                );
            }
        }
    }

    /// Map spawn error to ProcessError
    fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(command.program.clone())
        } else {
            ProcessError::SpawnFailed {
                command: command.display(),
                source: error,
            }
        }
    }

    fn spawn_configured_process(
        command: &ProcessCommand,
    ) -> Result<tokio::process::Child, ProcessError> {
        Self::configure_command(command)
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, command))
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = std::time::Instant::now();
        Self::log_command_start(&command);

        let child = Self::spawn_configured_process(&command)?;
        let output = child.wait_with_output().await.map_err(ProcessError::Io)?;

        let result = Self::build_output(output, start.elapsed(), false);
        Self::log_result(&result, &command);

        Ok(result)
    }

    async fn run_cancellable(
        &self,
        command: ProcessCommand,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled {
                command: command.display(),
            });
        }

        let start = std::time::Instant::now();
        Self::log_command_start(&command);

        let child = Self::spawn_configured_process(&command)?;
        let pid = child.id();
        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let mut cancelled = false;
        let output = tokio::select! {
            output = &mut wait => output,
            _ = cancel.cancelled() => {
                cancelled = true;
                if let Some(pid) = pid {
                    // Listing processes scans the whole process table
                    let tree = Arc::clone(&self.tree);
                    let kill = tokio::task::spawn_blocking(move || {
                        kill_process_tree(tree.as_ref(), pid)
                    });
                    match kill.await {
                        Ok(killed) => tracing::debug!(
                            "Cancellation requested, signalled {} process(es) for: {}",
                            killed,
                            command.display()
                        ),
                        Err(e) => tracing::warn!("Killing {} failed: {}", command.display(), e),
                    }
                }
                wait.await
            }
        }
        .map_err(ProcessError::Io)?;

        let result = Self::build_output(output, start.elapsed(), cancelled);
        Self::log_result(&result, &command);

        Ok(result)
    }
}
