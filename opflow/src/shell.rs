//! Shell-delegated operations.
//!
//! A shell operation renders the pipe arguments onto a command line and hands
//! it to a [`CommandRunner`]. The pipeline never spawns processes itself; the
//! default runner, [`ProcessCommandRunner`], does so with `tokio::process`.

use crate::errors::OperationError;
use crate::operation::Operation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Type name reported for failed shell operations.
pub const SHELL_ERROR_TYPE: &str = "ShellError";

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Process exit code (`-1` if terminated by a signal).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true if the command exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors raised before a command produced an exit code.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The process could not be spawned.
    #[error("Failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The command did not finish in time.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),
}

/// Runs shell commands on behalf of shell operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` to completion and captures its output.
    async fn run(&self, command: &str) -> Result<CommandOutput, ShellError>;
}

/// Runs commands through a system shell (`sh -c` by default).
#[derive(Debug, Clone)]
pub struct ProcessCommandRunner {
    shell: String,
    timeout: Option<Duration>,
}

impl Default for ProcessCommandRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            timeout: None,
        }
    }
}

impl ProcessCommandRunner {
    /// Creates a runner using `sh`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shell executable.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Sets a timeout for each command.
    #[must_use]
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput, ShellError> {
        debug!(shell = %self.shell, command, "Spawning shell command");

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(duration) => timeout(duration, child)
                .await
                .map_err(|_| ShellError::Timeout(duration))??,
            None => child.await?,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!(command, exit_code, "Shell command exited with non-zero status");
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// An operation that delegates its work to a shell command.
pub struct ShellOperation {
    command: String,
    runner: Arc<dyn CommandRunner>,
}

impl ShellOperation {
    /// Creates a new shell operation.
    #[must_use]
    pub fn new(command: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            command: command.into(),
            runner,
        }
    }

    /// Returns the base command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Renders the command line for a set of arguments.
    ///
    /// String arguments are passed verbatim, other values as JSON; each is
    /// single-quoted.
    #[must_use]
    pub fn render(&self, args: &[Value]) -> String {
        let mut line = self.command.clone();
        for arg in args {
            let text = match arg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            line.push(' ');
            line.push_str(&quote(&text));
        }
        line
    }
}

impl std::fmt::Debug for ShellOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellOperation")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Operation for ShellOperation {
    async fn invoke(&self, args: &[Value]) -> Result<Value, OperationError> {
        let line = self.render(args);
        let output = self
            .runner
            .run(&line)
            .await
            .map_err(|e| OperationError::new(e.to_string()).with_type_name(SHELL_ERROR_TYPE))?;

        if output.success() {
            Ok(Value::String(output.stdout.trim_end_matches('\n').to_string()))
        } else {
            Err(OperationError::new(output.stderr.trim())
                .with_type_name(SHELL_ERROR_TYPE)
                .with_exit_code(output.exit_code))
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
