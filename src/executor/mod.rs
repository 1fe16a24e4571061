//! Command Executor - runs one shell command and captures its output
//!
//! The plan-execution loop and the `exec` passthrough both go through the
//! `CommandExecutor` trait; `ShellExecutor` is the real implementation and
//! `ScriptedExecutor` replays canned outputs in tests.

mod mock;
mod shell;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use mock::ScriptedExecutor;
pub use shell::ShellExecutor;

/// Runs shell commands inside a session-owned working directory
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command`, waiting at most `timeout` (or the executor default)
    async fn execute(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, ExecutionError>;

    /// Directory commands currently run in
    fn working_dir(&self) -> PathBuf;

    /// Move the working directory for subsequent commands
    fn change_directory(&self, dir: &Path) -> Result<PathBuf, ExecutionError>;
}

/// Captured result of one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Single text block: exit code, then stdout, then stderr when present
    pub fn render(&self) -> String {
        let mut text = format!("Exit code: {}", self.exit_code);
        if !self.stdout.is_empty() {
            text.push('\n');
            text.push_str(self.stdout.trim_end());
        }
        if !self.stderr.is_empty() {
            text.push_str("\n\nSTDERR:\n");
            text.push_str(self.stderr.trim_end());
        }
        text
    }
}

/// Errors that can occur while running a command
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a directory: {}", path.display())]
    InvalidDirectory { path: PathBuf },

    #[error("Executor unavailable: {0}")]
    Unavailable(String),
}

impl ExecutionError {
    /// Timeouts and spawn failures concern one command; only an unusable
    /// executor ends a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecutionError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_success() {
        assert!(CommandOutput::new("ok", "", 0).success());
        assert!(!CommandOutput::new("", "boom", 2).success());
    }

    #[test]
    fn test_render_stdout_only() {
        let out = CommandOutput::new("a.txt\nb.txt\n", "", 0);
        assert_eq!(out.render(), "Exit code: 0\na.txt\nb.txt");
    }

    #[test]
    fn test_render_with_stderr() {
        let out = CommandOutput::new("", "ls: cannot access 'x'\n", 2);
        let text = out.render();
        assert!(text.starts_with("Exit code: 2"));
        assert!(text.contains("STDERR:\nls: cannot access 'x'"));
    }

    #[test]
    fn test_error_fatality() {
        assert!(!ExecutionError::Timeout { timeout_ms: 5 }.is_fatal());
        assert!(
            !ExecutionError::InvalidDirectory {
                path: PathBuf::from("/nope")
            }
            .is_fatal()
        );
        assert!(ExecutionError::Unavailable("shell missing".to_string()).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ExecutionError::Timeout { timeout_ms: 100 };
        assert_eq!(err.to_string(), "Command timed out after 100ms");
    }
}
