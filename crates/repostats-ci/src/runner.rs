//! External command execution with timeouts.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::error::PublishError;

/// One command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Short operation name used in errors and logs.
    pub op: &'static str,

    /// Executable followed by its arguments.
    pub command: Vec<String>,

    /// Working directory (inherits the current one when `None`).
    pub cwd: Option<PathBuf>,

    /// Extra environment variables.
    pub env: Vec<(String, String)>,

    /// Timeout in seconds (0 disables the timeout).
    pub timeout_secs: u64,
}

impl CommandSpec {
    pub fn new(op: &'static str, command: Vec<String>, timeout_secs: u64) -> Self {
        CommandSpec {
            op,
            command,
            cwd: None,
            env: Vec::new(),
            timeout_secs,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl CommandOutput {
    /// Whether this command passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Runs a [`CommandSpec`] and captures its output.
pub struct CommandRunner;

impl CommandRunner {
    /// Execute a command and return its output.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`CommandOutput::passed`]. Spawn failures and timeouts are errors.
    pub async fn execute(spec: &CommandSpec) -> Result<CommandOutput, PublishError> {
        let start = Instant::now();

        let (exe, args) = spec.command.split_first().ok_or_else(|| PublishError::Spawn {
            op: spec.op,
            message: "empty command".to_string(),
        })?;

        let mut command = Command::new(exe);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| PublishError::Spawn {
            op: spec.op,
            message: e.to_string(),
        })?;

        let waited = if spec.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(spec.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| PublishError::Timeout {
                op: spec.op,
                secs: spec.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        };
        let output = waited.map_err(|e| PublishError::Spawn {
            op: spec.op,
            message: e.to_string(),
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        debug!(op = spec.op, exit_code, duration_ms, "Command finished");

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
        })
    }
}
